//! Variation flags and their resolution
//!
//! A flag list resolves into a breakpoint vector, an optional background
//! color and the (possibly reordered) palette colors.

use crate::color::{Rgb, Rgba};
use crate::error::RemapError;
use crate::palette::{Palette, Theme};
use crate::remap::Method;

/// Delta magnitude at which a breakpoint stops moving additively and
/// collapses onto its neighbour (or onto the bound at either end)
pub const EXTREME: f32 = 100.0;

/// Four non-decreasing breakpoints in [0, 1]
///
/// Bands, left to right: solid c0, blend c0→c1, solid c1, blend c1→c2,
/// solid c2. When the solid c1 band is empty the whole span from the first
/// to the last breakpoint is a single c0→c2 blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariationVector([f32; 4]);

impl VariationVector {
    /// Clamps to [0, 1] and forces the breakpoints to be non-decreasing
    pub fn new(breakpoints: [f32; 4]) -> Self {
        let mut v = breakpoints.map(|b| if b.is_nan() { 0.0 } else { b.clamp(0.0, 1.0) });
        for i in 1..4 {
            v[i] = v[i].max(v[i - 1]);
        }
        Self(v)
    }

    pub fn breakpoints(&self) -> [f32; 4] {
        self.0
    }

    /// Fold a delta into this vector
    ///
    /// Ordinary components add and clamp. `-EXTREME` moves a breakpoint down
    /// onto its left neighbour (0 for the first), `+EXTREME` moves it up onto
    /// its right neighbour (1 for the last).
    pub fn compose(&self, delta: &[f32; 4]) -> Self {
        let mut v = self.0;

        for i in 0..4 {
            if delta[i].abs() < EXTREME {
                v[i] = (v[i] + delta[i]).clamp(0.0, 1.0);
            }
        }
        for i in 0..4 {
            if delta[i] <= -EXTREME {
                v[i] = if i == 0 { 0.0 } else { v[i - 1] };
            }
        }
        for i in (0..4).rev() {
            if delta[i] >= EXTREME {
                v[i] = if i == 3 { 1.0 } else { v[i + 1] };
            }
        }

        Self::new(v)
    }

    /// Color at normalized luminance `x` in [0, 1]
    pub fn sample(&self, colors: &[Rgb; 3], x: f32) -> Rgb {
        let [b0, b1, b2, b3] = self.0;
        let [c0, c1, c2] = colors;

        if x < b0 {
            return *c0;
        }

        // A breakpoint at 1.0 swallows the band to its right entirely
        let before_b3 = x < b3 || b3 >= 1.0;

        if b1 == b2 && b2 < 1.0 {
            if !before_b3 {
                return *c2;
            }
            let t = if b3 > b0 { (x - b0) / (b3 - b0) } else { 1.0 };
            return c0.lerp(c2, t);
        }

        if x < b1 {
            return c0.lerp(c1, (x - b0) / (b1 - b0));
        }
        if x < b2 || b2 >= 1.0 {
            return *c1;
        }
        if before_b3 {
            let t = if b3 > b2 { (x - b2) / (b3 - b2) } else { 1.0 };
            return c1.lerp(c2, t);
        }

        *c2
    }
}

/// Palette color list transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorTransform {
    /// Reverse the order
    Invert,
    /// Cyclic shift by one to the left
    Rotate,
    /// Swap one slot for a fixed color
    Replace { index: usize, color: Rgb },
}

impl ColorTransform {
    pub fn apply(&self, colors: &mut [Rgb; 3]) {
        match *self {
            ColorTransform::Invert => colors.reverse(),
            ColorTransform::Rotate => colors.rotate_left(1),
            ColorTransform::Replace { index, color } => {
                if let Some(slot) = colors.get_mut(index) {
                    *slot = color;
                }
            }
        }
    }
}

/// A named entry of a theme's variation registry
#[derive(Debug, Clone, PartialEq)]
pub enum Variation {
    /// Additive breakpoint delta
    Shift([f32; 4]),
    /// Applied immediately to the working color list
    Colors(ColorTransform),
    /// Solid background to flatten onto
    Background(Rgba),
}

/// Everything a flag list resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub vector: VariationVector,
    pub background: Option<Rgba>,
    pub colors: [Rgb; 3],
}

/// Find a flag: as-is, then prefixed by the modifier, then as the
/// modifier's background flag
fn lookup<'a>(theme: &'a Theme, modifier: &str, flag: &str) -> Option<&'a Variation> {
    theme
        .variations
        .get(flag)
        .or_else(|| theme.variations.get(&format!("{}{}", modifier, flag)))
        .or_else(|| theme.variations.get(&format!("{}bg{}", modifier, flag)))
}

/// Resolve a flag list against a theme and palette
///
/// Flags are de-duplicated and applied in lexicographic order, so the input
/// order never matters. Numeric deltas are skipped for
/// [`Method::DirectCurve`], which does not use the vector.
pub fn resolve<S: AsRef<str>>(
    theme: &Theme,
    palette: &Palette,
    method: Method,
    flags: &[S],
) -> Result<Resolved, RemapError> {
    let mut sorted: Vec<&str> = flags.iter().map(|f| f.as_ref()).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut resolved = Resolved {
        vector: theme.base,
        background: None,
        colors: palette.colors,
    };

    for flag in sorted {
        let variation = lookup(theme, palette.modifier, flag)
            .ok_or_else(|| RemapError::InvalidVariation(flag.to_string()))?;

        tracing::debug!("Variation {} -> {:?}", flag, variation);

        match variation {
            Variation::Shift(delta) => {
                if method != Method::DirectCurve {
                    resolved.vector = resolved.vector.compose(delta);
                }
            }
            Variation::Colors(transform) => transform.apply(&mut resolved.colors),
            Variation::Background(color) => resolved.background = Some(*color),
        }
    }

    Ok(resolved)
}
