//! Built-in themes
//!
//! Both themes run through the same engine; only the data differs.

use std::collections::HashMap;

use crate::color::{Rgb, Rgba};
use crate::palette::{Palette, ReferencePalette, Theme};
use crate::variation::{ColorTransform, Variation, VariationVector};

/// Extreme delta: collapse onto the neighbouring breakpoint or the bound
const X: f32 = crate::variation::EXTREME;

pub const WHITE: Rgb = Rgb::new(255, 255, 255);
pub const BLURPLE: Rgb = Rgb::new(88, 101, 242);
pub const DARK_BLURPLE: Rgb = Rgb::new(69, 79, 191);
pub const NOT_QUITE_BLACK: Rgb = Rgb::new(35, 39, 42);
pub const CLASSIC_BLURPLE: Rgb = Rgb::new(114, 137, 218);

pub const GHOST: Rgb = Rgb::new(244, 238, 224);
pub const PUMPKIN: Rgb = Rgb::new(255, 117, 24);
pub const DEEP_PURPLE: Rgb = Rgb::new(76, 31, 110);
pub const MIDNIGHT: Rgb = Rgb::new(18, 16, 22);
pub const CANDY_CORN: Rgb = Rgb::new(255, 196, 36);

/// Band adjustments shared by both themes, named after the palette slot
/// they widen or shrink: (dark, middle, light)
fn band_shifts(dark: &str, middle: &str, light: &str) -> Vec<(String, Variation)> {
    let step = 0.05;
    vec![
        (format!("++more-{light}"), Variation::Shift([0.0, 0.0, -step, -step])),
        (format!("++less-{light}"), Variation::Shift([0.0, 0.0, step, step])),
        (format!("++no-{light}"), Variation::Shift([0.0, 0.0, X, X])),
        (format!("++more-{middle}"), Variation::Shift([0.0, -step, step, 0.0])),
        (format!("++less-{middle}"), Variation::Shift([0.0, step, -step, 0.0])),
        (format!("++no-{middle}"), Variation::Shift([0.0, X, 0.0, 0.0])),
        (format!("++more-{dark}"), Variation::Shift([step, step, 0.0, 0.0])),
        (format!("++less-{dark}"), Variation::Shift([-step, -step, 0.0, 0.0])),
        (format!("++no-{dark}"), Variation::Shift([-X, -X, 0.0, 0.0])),
        ("++invert".to_string(), Variation::Colors(ColorTransform::Invert)),
        ("++shift".to_string(), Variation::Colors(ColorTransform::Rotate)),
    ]
}

fn backgrounds(modifiers: &[&str], colors: &[(&str, Rgb)]) -> Vec<(String, Variation)> {
    modifiers
        .iter()
        .flat_map(|m| {
            colors.iter().map(move |(name, c)| {
                (
                    format!("{m}bg++{name}-bg"),
                    Variation::Background(Rgba::new(c.r, c.g, c.b, 255)),
                )
            })
        })
        .collect()
}

/// Discord's blurple event theme
pub fn blurple() -> Theme {
    let light = Palette::new(
        "light",
        [
            ("Dark Blurple", DARK_BLURPLE),
            ("Blurple", BLURPLE),
            ("White", WHITE),
        ],
    );
    let dark = Palette::new(
        "dark",
        [
            ("Not Quite Black", NOT_QUITE_BLACK),
            ("Dark Blurple", DARK_BLURPLE),
            ("Blurple", BLURPLE),
        ],
    );

    let mut variations: HashMap<String, Variation> =
        band_shifts("dark-blurple", "blurple", "white").into_iter().collect();
    variations.insert(
        "light++classic".into(),
        Variation::Colors(ColorTransform::Replace {
            index: 1,
            color: CLASSIC_BLURPLE,
        }),
    );
    variations.insert(
        "dark++classic".into(),
        Variation::Colors(ColorTransform::Replace {
            index: 2,
            color: CLASSIC_BLURPLE,
        }),
    );
    variations.extend(backgrounds(
        &["light", "dark"],
        &[
            ("white", WHITE),
            ("blurple", BLURPLE),
            ("dark-blurple", DARK_BLURPLE),
            ("black", NOT_QUITE_BLACK),
        ],
    ));

    Theme {
        name: "blurple",
        palettes: vec![light, dark],
        reference: ReferencePalette {
            name: "all",
            entries: vec![
                ("Not Quite Black", NOT_QUITE_BLACK),
                ("Dark Blurple", DARK_BLURPLE),
                ("Blurple", BLURPLE),
                ("White", WHITE),
            ],
        },
        base: VariationVector::new([0.15, 0.3, 0.7, 0.85]),
        variations,
    }
}

/// Halloween event theme
pub fn halloween() -> Theme {
    let pumpkin = Palette::new(
        "pumpkin",
        [
            ("Deep Purple", DEEP_PURPLE),
            ("Pumpkin", PUMPKIN),
            ("Ghost", GHOST),
        ],
    );
    let midnight = Palette::new(
        "midnight",
        [
            ("Midnight", MIDNIGHT),
            ("Deep Purple", DEEP_PURPLE),
            ("Pumpkin", PUMPKIN),
        ],
    );

    let mut variations: HashMap<String, Variation> =
        band_shifts("dark", "middle", "light").into_iter().collect();
    variations.insert(
        "pumpkin++candy".into(),
        Variation::Colors(ColorTransform::Replace {
            index: 1,
            color: CANDY_CORN,
        }),
    );
    variations.extend(backgrounds(
        &["pumpkin", "midnight"],
        &[
            ("black", MIDNIGHT),
            ("purple", DEEP_PURPLE),
            ("orange", PUMPKIN),
            ("white", GHOST),
        ],
    ));

    Theme {
        name: "halloween",
        palettes: vec![pumpkin, midnight],
        reference: ReferencePalette {
            name: "halloween",
            entries: vec![
                ("Midnight", MIDNIGHT),
                ("Deep Purple", DEEP_PURPLE),
                ("Pumpkin", PUMPKIN),
                ("Ghost", GHOST),
            ],
        },
        base: VariationVector::new([0.14, 0.42, 0.7, 0.85]),
        variations,
    }
}
