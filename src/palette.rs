//! Palettes, tone curves, themes and the registry that holds them
//!
//! A theme bundles the palettes it exposes as modifiers, the merged reference
//! palette used for classification, the base variation vector and its
//! variation registry. Themes are plain data; the engine is shared.

use std::collections::HashMap;

use crate::color::Rgb;
use crate::error::RemapError;
use crate::remap::Method;
use crate::themes;
use crate::variation::{Variation, VariationVector};

/// Piecewise linear gradient over the luminance domain `0..=255`
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    /// (position in [0, 1], color), sorted by position
    stops: Vec<(f32, Rgb)>,
}

impl ToneCurve {
    pub fn new(mut stops: Vec<(f32, Rgb)>) -> Self {
        for stop in stops.iter_mut() {
            stop.0 = stop.0.clamp(0.0, 1.0);
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { stops }
    }

    /// Evenly spaced stops, first color at 0 and last at 1
    pub fn even(colors: &[Rgb]) -> Self {
        let last = colors.len().saturating_sub(1).max(1) as f32;
        Self::new(
            colors
                .iter()
                .enumerate()
                .map(|(i, c)| (i as f32 / last, *c))
                .collect(),
        )
    }

    /// Color for a luminance value in `0.0..=255.0`
    pub fn eval(&self, luma: f32) -> Rgb {
        let t = (luma / 255.0).clamp(0.0, 1.0);

        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rgb::new(0, 0, 0),
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        for pair in self.stops.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if t <= p1 {
                let span = p1 - p0;
                if span <= f32::EPSILON {
                    return c1;
                }
                return c0.lerp(&c1, (t - p0) / span);
            }
        }

        last.1
    }
}

/// A three-color palette, ordered darkest extreme to lightest extreme
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    /// Modifier name callers select this palette with
    pub modifier: &'static str,
    pub colors: [Rgb; 3],
    pub names: [&'static str; 3],
}

impl Palette {
    pub fn new(modifier: &'static str, entries: [(&'static str, Rgb); 3]) -> Self {
        Self {
            modifier,
            colors: entries.map(|(_, c)| c),
            names: entries.map(|(n, _)| n),
        }
    }
}

/// Reference colors used by the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePalette {
    pub name: &'static str,
    pub entries: Vec<(&'static str, Rgb)>,
}

impl ReferencePalette {
    pub fn colors(&self) -> Vec<Rgb> {
        self.entries.iter().map(|(_, c)| *c).collect()
    }
}

/// One visual theme instantiated as data
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub palettes: Vec<Palette>,
    pub reference: ReferencePalette,
    /// Starting point for numeric variations
    pub base: VariationVector,
    /// Keyed by flag (`++more-white`), modifier flag (`light++classic`) or
    /// background flag (`lightbg++white-bg`)
    pub variations: HashMap<String, Variation>,
}

impl Theme {
    pub fn palette(&self, modifier: &str) -> Option<&Palette> {
        self.palettes.iter().find(|p| p.modifier == modifier)
    }

    /// Flags a caller may pass together with `modifier`, sorted
    pub fn flags_for(&self, modifier: &str) -> Vec<String> {
        let bg_prefix = format!("{}bg", modifier);
        let mut flags: Vec<String> = self
            .variations
            .keys()
            .filter_map(|key| {
                if key.starts_with("++") {
                    Some(key.clone())
                } else if let Some(flag) = key.strip_prefix(&bg_prefix) {
                    Some(flag.to_string())
                } else {
                    key.strip_prefix(modifier)
                        .filter(|flag| flag.starts_with("++"))
                        .map(str::to_string)
                }
            })
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }
}

/// Immutable lookup tables built once at start-up
#[derive(Debug, Clone)]
pub struct Registry {
    themes: Vec<Theme>,
    default_reference: &'static str,
}

impl Registry {
    pub fn new(themes: Vec<Theme>, default_reference: &'static str) -> Self {
        Self {
            themes,
            default_reference,
        }
    }

    /// The "blurple" and "halloween" themes
    pub fn builtin() -> Self {
        Self::new(vec![themes::blurple(), themes::halloween()], "all")
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn methods(&self) -> &'static [Method] {
        &Method::ALL
    }

    /// Find the theme and palette selected by a modifier name
    pub fn palette(&self, modifier: &str) -> Result<(&Theme, &Palette), RemapError> {
        self.themes
            .iter()
            .find_map(|theme| theme.palette(modifier).map(|p| (theme, p)))
            .ok_or_else(|| RemapError::InvalidModifier(modifier.to_string()))
    }

    pub fn method(&self, name: &str) -> Result<Method, RemapError> {
        Method::from_name(name).ok_or_else(|| RemapError::InvalidMethod(name.to_string()))
    }

    /// Reference palette by name
    pub fn reference(&self, name: &str) -> Result<&ReferencePalette, RemapError> {
        self.themes
            .iter()
            .map(|t| &t.reference)
            .find(|r| r.name == name)
            .ok_or_else(|| RemapError::InvalidModifier(name.to_string()))
    }

    pub fn default_reference(&self) -> Result<&ReferencePalette, RemapError> {
        self.reference(self.default_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_even_endpoints() {
        let black = Rgb::new(0, 0, 0);
        let white = Rgb::new(255, 255, 255);
        let curve = ToneCurve::even(&[black, white]);
        assert_eq!(curve.eval(0.0), black);
        assert_eq!(curve.eval(255.0), white);
        assert_eq!(curve.eval(127.5), Rgb::new(128, 128, 128));
        assert_eq!(curve.eval(-10.0), black);
    }

    #[test]
    fn test_curve_middle_stop() {
        let curve = ToneCurve::even(&[
            Rgb::new(0, 0, 0),
            Rgb::new(200, 0, 0),
            Rgb::new(200, 200, 200),
        ]);
        assert_eq!(curve.eval(127.5), Rgb::new(200, 0, 0));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = Registry::builtin();
        let (theme, palette) = registry.palette("light").unwrap();
        assert_eq!(theme.name, "blurple");
        assert_eq!(palette.modifier, "light");

        let (theme, _) = registry.palette("pumpkin").unwrap();
        assert_eq!(theme.name, "halloween");

        assert_eq!(
            registry.palette("neon").unwrap_err(),
            RemapError::InvalidModifier("neon".into())
        );
        assert_eq!(
            registry.method("--sparkle").unwrap_err(),
            RemapError::InvalidMethod("--sparkle".into())
        );
    }

    #[test]
    fn test_reference_palettes() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();
        assert_eq!(all.name, "all");
        assert_eq!(all.entries.len(), 4);
        assert!(registry.reference("halloween").is_ok());
        assert!(matches!(
            registry.reference("neon"),
            Err(RemapError::InvalidModifier(_))
        ));
    }

    #[test]
    fn test_flags_for_strips_prefixes() {
        let registry = Registry::builtin();
        let (theme, _) = registry.palette("light").unwrap();
        let flags = theme.flags_for("light");
        assert!(flags.contains(&"++more-white".to_string()));
        assert!(flags.contains(&"++classic".to_string()));
        assert!(flags.contains(&"++white-bg".to_string()));
        assert!(flags.iter().all(|f| f.starts_with("++")));
    }
}
