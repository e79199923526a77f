//! Pipeline entry points
//!
//! - Validate modifier, method and flags before touching pixels
//! - Decode PNG / JPEG / GIF
//! - Recolor (per frame with a shared range for animations)
//! - Encode as PNG (still) or GIF (animated)

use png::{BitDepth, ColorType, Encoder};
use std::io::Cursor;

use crate::animation::Source;
use crate::classify::{self, Classification};
use crate::error::RemapError;
use crate::palette::Registry;
use crate::remap::{LumaRange, Recipe};
use crate::variation;

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Gif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
        }
    }
}

/// An encoded conversion result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// `{modifier}.png` or `{modifier}.gif`
    pub file_name: String,
}

/// Recolor an image with a modifier, method and variation flags
///
/// Configuration errors are reported before the image is decoded. A
/// background flag only takes effect when `replace_background` is set.
pub fn convert_image<S: AsRef<str>>(
    registry: &Registry,
    image_data: &[u8],
    modifier: &str,
    method: &str,
    flags: &[S],
    replace_background: bool,
) -> Result<ConvertedImage, RemapError> {
    if image_data.is_empty() {
        return Err(RemapError::InvalidImage("empty input".into()));
    }

    let (theme, palette) = registry.palette(modifier)?;
    let method = registry.method(method)?;
    let resolved = variation::resolve(theme, palette, method, flags)?;
    let recipe = Recipe::new(method, resolved, replace_background);

    let (bytes, format) = match Source::decode(image_data)? {
        Source::Still(img) => {
            let range = LumaRange::of(&image::imageops::grayscale_alpha(&img)).unwrap_or_default();
            let out = recipe.apply(&img, range);
            let (width, height) = out.dimensions();
            (encode_png(out.as_raw(), width, height)?, OutputFormat::Png)
        }
        Source::Animated(animation) => (animation.recolor(&recipe)?, OutputFormat::Gif),
    };

    tracing::info!(
        "Converted image: theme={}, modifier={}, method={}, flags={}, {} bytes {}",
        theme.name,
        modifier,
        method.name(),
        flags.len(),
        bytes.len(),
        format.extension()
    );

    Ok(ConvertedImage {
        bytes,
        format,
        file_name: format!("{}.{}", modifier, format.extension()),
    })
}

/// Score an image against the default ("all") reference palette
pub fn check_image(registry: &Registry, image_data: &[u8]) -> Result<Classification, RemapError> {
    let reference = registry.default_reference()?;
    classify_with(reference, image_data)
}

/// Score an image against a named reference palette
pub fn check_image_with(
    registry: &Registry,
    image_data: &[u8],
    palette: &str,
) -> Result<Classification, RemapError> {
    if image_data.is_empty() {
        return Err(RemapError::InvalidImage("empty input".into()));
    }
    let reference = registry.reference(palette)?;
    classify_with(reference, image_data)
}

fn classify_with(
    reference: &crate::palette::ReferencePalette,
    image_data: &[u8],
) -> Result<Classification, RemapError> {
    let frames = Source::decode(image_data)?.into_frames();
    Ok(classify::classify(&frames, reference))
}

/// Encode RGBA pixel data as PNG
fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RemapError> {
    let mut output = Vec::new();

    {
        let mut encoder = Encoder::new(Cursor::new(&mut output), width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| RemapError::Encode(format!("PNG header error: {}", e)))?;

        writer
            .write_image_data(rgba)
            .map_err(|e| RemapError::Encode(format!("PNG write error: {}", e)))?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::tests::{animated_gif, DELAYS_MS};
    use crate::animation::{Animation, Looping};
    use crate::classify::RESIDUAL_NAME;
    use crate::themes::{BLURPLE, DARK_BLURPLE, WHITE};
    use image::{ImageFormat, Rgba, RgbaImage};

    const NO_FLAGS: &[&str] = &[];

    fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(img.clone())
                .to_rgb8()
                .write_to(&mut out, format)
                .unwrap(),
            _ => img.write_to(&mut out, format).unwrap(),
        }
        out.into_inner()
    }

    /// Horizontal gray ramp with a transparent corner
    fn sample_image() -> RgbaImage {
        RgbaImage::from_fn(40, 24, |x, y| {
            let v = (x * 6) as u8;
            let a = if x < 4 && y < 4 { 0 } else { 255 };
            Rgba([v, v / 2 + 60, 255 - v, a])
        })
    }

    #[test]
    fn test_still_formats_keep_dimensions() {
        let registry = Registry::builtin();
        let img = sample_image();

        for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Gif] {
            for method in ["--filter", "--remap", "--edge-detect"] {
                let out = convert_image(
                    &registry,
                    &encode(&img, format),
                    "light",
                    method,
                    NO_FLAGS,
                    false,
                )
                .unwrap();
                assert_eq!(out.format, OutputFormat::Png);
                assert_eq!(out.file_name, "light.png");

                let decoded = image::load_from_memory(&out.bytes).unwrap();
                assert_eq!((decoded.width(), decoded.height()), (40, 24), "{:?} {}", format, method);
            }
        }
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let registry = Registry::builtin();
        let png = encode(&sample_image(), ImageFormat::Png);

        let a = convert_image(
            &registry,
            &png,
            "dark",
            "--edge-detect",
            &["++more-blurple", "++invert", "++classic", "++less-white"],
            false,
        )
        .unwrap();
        let b = convert_image(
            &registry,
            &png,
            "dark",
            "--edge-detect",
            &["++less-white", "++classic", "++more-blurple", "++invert"],
            false,
        )
        .unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_filter_applies_color_flags() {
        let registry = Registry::builtin();
        let png = encode(&sample_image(), ImageFormat::Png);

        let plain = convert_image(&registry, &png, "light", "--filter", NO_FLAGS, false).unwrap();
        for flag in ["++invert", "++shift", "++classic"] {
            let flagged = convert_image(&registry, &png, "light", "--filter", &[flag], false).unwrap();
            assert_ne!(plain.bytes, flagged.bytes, "{}", flag);
        }
    }

    #[test]
    fn test_background_flag_gated_by_replace_background() {
        let registry = Registry::builtin();
        let png = encode(&sample_image(), ImageFormat::Png);

        let flat = convert_image(&registry, &png, "light", "--remap", &["++white-bg"], true).unwrap();
        let flat = image::load_from_memory(&flat.bytes).unwrap().to_rgba8();
        assert!(flat.pixels().all(|p| p[3] == 255));

        let kept = convert_image(&registry, &png, "light", "--remap", &["++white-bg"], false).unwrap();
        let kept = image::load_from_memory(&kept.bytes).unwrap().to_rgba8();
        assert_eq!(kept.get_pixel(0, 0)[3], 0);
        assert_eq!(kept.get_pixel(39, 23)[3], 255);
    }

    #[test]
    fn test_flat_image_converts() {
        let registry = Registry::builtin();
        let png = encode(&RgbaImage::from_pixel(6, 6, Rgba([0, 0, 0, 255])), ImageFormat::Png);
        let out = convert_image(&registry, &png, "light", "--remap", NO_FLAGS, false).unwrap();
        let out = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
        // Absolute normalization puts black at the dark end
        assert!(out.pixels().all(|p| p.0 == DARK_BLURPLE.with_alpha(255).to_array()));
    }

    #[test]
    fn test_config_errors() {
        let registry = Registry::builtin();
        let png = encode(&sample_image(), ImageFormat::Png);

        assert_eq!(
            convert_image(&registry, &png, "neon", "--remap", NO_FLAGS, false).unwrap_err(),
            RemapError::InvalidModifier("neon".into())
        );
        assert_eq!(
            convert_image(&registry, &png, "light", "--sparkle", NO_FLAGS, false).unwrap_err(),
            RemapError::InvalidMethod("--sparkle".into())
        );
        assert_eq!(
            convert_image(&registry, &png, "light", "--remap", &["++doesnotexist"], false)
                .unwrap_err(),
            RemapError::InvalidVariation("++doesnotexist".into())
        );
        assert_eq!(
            check_image_with(&registry, &png, "neon").unwrap_err(),
            RemapError::InvalidModifier("neon".into())
        );
    }

    #[test]
    fn test_config_checked_before_decoding() {
        let registry = Registry::builtin();
        assert!(matches!(
            convert_image(&registry, b"garbage", "neon", "--remap", NO_FLAGS, false),
            Err(RemapError::InvalidModifier(_))
        ));
        assert!(matches!(
            convert_image(&registry, b"garbage", "light", "--remap", NO_FLAGS, false),
            Err(RemapError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        let registry = Registry::builtin();
        assert!(matches!(
            convert_image(&registry, &[], "light", "--remap", NO_FLAGS, false),
            Err(RemapError::InvalidImage(_))
        ));
        assert!(matches!(check_image(&registry, &[]), Err(RemapError::InvalidImage(_))));
    }

    #[test]
    fn test_animated_gif_round_trip() {
        let registry = Registry::builtin();
        let gif = animated_gif(Looping::Infinite);

        let out = convert_image(&registry, &gif, "pumpkin", "--edge-detect", NO_FLAGS, false).unwrap();
        assert_eq!(out.format, OutputFormat::Gif);
        assert_eq!(out.file_name, "pumpkin.gif");

        let decoded = Animation::decode(&out.bytes).unwrap();
        assert_eq!(decoded.frames.len(), DELAYS_MS.len());
        assert_eq!(decoded.looping, Looping::Infinite);
        for (frame, ms) in decoded.frames.iter().zip(DELAYS_MS) {
            let (n, d) = frame.delay().numer_denom_ms();
            assert_eq!(n as f64 / d as f64, ms as f64);
        }
    }

    #[test]
    fn test_check_canonical_colors() {
        let registry = Registry::builtin();
        for (name, color) in [("Dark Blurple", DARK_BLURPLE), ("Blurple", BLURPLE), ("White", WHITE)] {
            let png = encode(
                &RgbaImage::from_pixel(30, 30, Rgba(color.with_alpha(255).to_array())),
                ImageFormat::Png,
            );
            let result = check_image(&registry, &png).unwrap();
            assert!(result.passed, "{}", name);
            assert!(result.ratio(name).unwrap() >= 99.0, "{}", name);
            assert_eq!(result.colors.len(), 5);
            assert_eq!(result.colors.last().unwrap().name, RESIDUAL_NAME);
        }
    }

    #[test]
    fn test_check_animated_averages_frames() {
        let registry = Registry::builtin();
        let result = check_image(&registry, &animated_gif(Looping::Infinite)).unwrap();
        // Gray ramps are not palette colors
        assert!(!result.passed);
        let total: f64 = result.colors.iter().map(|c| c.ratio).sum();
        assert!((total - 100.0).abs() < 0.1);
    }
}
