//! Palette coverage scoring
//!
//! Every visible pixel is attributed to the reference color it resembles
//! most, or to the residual bucket when nothing is close enough. The
//! residual share decides whether the image passes.

use image::RgbaImage;
use serde::Serialize;
use utoipa::ToSchema;

use crate::color::Rgb;
use crate::palette::ReferencePalette;

/// Name of the catch-all bucket, always reported last
pub const RESIDUAL_NAME: &str = "Non-Palette";

/// Minimum similarity for a pixel to count toward a reference color
const MATCH_THRESHOLD: f32 = 0.93;

/// Maximum residual percentage that still passes
const PASS_THRESHOLD: f64 = 10.0;

/// Downsampling factor applied to both axes before scoring
const DOWNSAMPLE: u32 = 3;

/// Share of one bucket
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColorShare {
    pub name: String,
    /// Percentage in [0, 100], two decimals
    pub ratio: f64,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Classification {
    pub passed: bool,
    pub colors: Vec<ColorShare>,
}

impl Classification {
    pub fn ratio(&self, name: &str) -> Option<f64> {
        self.colors.iter().find(|c| c.name == name).map(|c| c.ratio)
    }
}

/// Reference colors plus their blends toward circular neighbours
struct Matcher {
    /// Per reference index: the color and its two neighbour blends
    candidates: Vec<[Rgb; 3]>,
}

impl Matcher {
    fn new(colors: &[Rgb]) -> Self {
        let n = colors.len();
        let ratio = 1.0 / n.max(1) as f32;

        let candidates = (0..n)
            .map(|i| {
                let c = colors[i];
                let prev = colors[(i + n - 1) % n];
                let next = colors[(i + 1) % n];
                [c, c.lerp(&prev, ratio), c.lerp(&next, ratio)]
            })
            .collect();

        Self { candidates }
    }

    /// Bucket index for a pixel; `candidates.len()` is the residual bucket
    fn bucket(&self, pixel: &Rgb) -> usize {
        let mut best_index = self.candidates.len();
        let mut best = f32::MIN;

        for (i, group) in self.candidates.iter().enumerate() {
            let s = group
                .iter()
                .map(|c| pixel.similarity(c))
                .fold(f32::MIN, f32::max);
            if s > best {
                best = s;
                best_index = i;
            }
        }

        if best > MATCH_THRESHOLD {
            best_index
        } else {
            self.candidates.len()
        }
    }
}

/// Raw (unrounded) percentages for one frame, residual last
///
/// Returns `None` when the frame has no visible pixel.
fn frame_percentages(frame: &RgbaImage, matcher: &Matcher) -> Option<Vec<f64>> {
    if frame.width() == 0 || frame.height() == 0 {
        return None;
    }
    let small = downsample(frame);

    let mut counts = vec![0usize; matcher.candidates.len() + 1];
    let mut total = 0usize;

    for px in small.pixels() {
        if px[3] == 0 {
            continue;
        }
        total += 1;
        counts[matcher.bucket(&Rgb::new(px[0], px[1], px[2]))] += 1;
    }

    if total == 0 {
        return None;
    }

    Some(
        counts
            .into_iter()
            .map(|c| c as f64 * 100.0 / total as f64)
            .collect(),
    )
}

/// Nearest-neighbour reduction to a third of each axis, sampling the
/// centre of every 3x3 block
fn downsample(frame: &RgbaImage) -> RgbaImage {
    let (width, height) = frame.dimensions();
    RgbaImage::from_fn(
        (width / DOWNSAMPLE).max(1),
        (height / DOWNSAMPLE).max(1),
        |x, y| {
            let sx = (x * DOWNSAMPLE + DOWNSAMPLE / 2).min(width - 1);
            let sy = (y * DOWNSAMPLE + DOWNSAMPLE / 2).min(height - 1);
            *frame.get_pixel(sx, sy)
        },
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Score frames against a reference palette
///
/// Animated input is scored per frame and averaged. Frames without any
/// visible pixel are left out of the average; if no frame has one, every
/// bucket reads zero and the image does not pass.
pub fn classify(frames: &[RgbaImage], reference: &ReferencePalette) -> Classification {
    let matcher = Matcher::new(&reference.colors());
    let buckets = matcher.candidates.len() + 1;

    let scored: Vec<Vec<f64>> = frames
        .iter()
        .filter_map(|f| frame_percentages(f, &matcher))
        .collect();

    let mut sums = vec![0.0f64; buckets];
    for frame in &scored {
        for (sum, v) in sums.iter_mut().zip(frame) {
            *sum += v;
        }
    }
    let averaged: Vec<f64> = sums
        .into_iter()
        .map(|s| {
            if scored.is_empty() {
                0.0
            } else {
                round2(s / scored.len() as f64)
            }
        })
        .collect();

    let residual = averaged[buckets - 1];
    let passed = !scored.is_empty() && residual <= PASS_THRESHOLD;

    let colors = reference
        .entries
        .iter()
        .map(|(name, _)| name.to_string())
        .chain(std::iter::once(RESIDUAL_NAME.to_string()))
        .zip(averaged)
        .map(|(name, ratio)| ColorShare { name, ratio })
        .collect();

    tracing::debug!(
        "Classified {} frame(s) against {}: residual {:.2}%, passed {}",
        frames.len(),
        reference.name,
        residual,
        passed
    );

    Classification { passed, colors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Registry;
    use crate::themes::{BLURPLE, DARK_BLURPLE, NOT_QUITE_BLACK, WHITE};
    use image::Rgba;

    fn solid(color: Rgb, alpha: u8) -> RgbaImage {
        RgbaImage::from_pixel(30, 30, Rgba(color.with_alpha(alpha).to_array()))
    }

    #[test]
    fn test_canonical_colors_pass() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();

        for (name, color) in [
            ("Dark Blurple", DARK_BLURPLE),
            ("Blurple", BLURPLE),
            ("White", WHITE),
            ("Not Quite Black", NOT_QUITE_BLACK),
        ] {
            let result = classify(&[solid(color, 255)], all);
            assert!(result.passed, "{}", name);
            assert!(result.ratio(name).unwrap() >= 99.0, "{}", name);
            assert_eq!(result.colors.last().unwrap().name, RESIDUAL_NAME);
        }
    }

    #[test]
    fn test_foreign_color_fails() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();
        let result = classify(&[solid(Rgb::new(0, 200, 0), 255)], all);
        assert!(!result.passed);
        assert_eq!(result.ratio(RESIDUAL_NAME), Some(100.0));
    }

    #[test]
    fn test_transparent_pixels_leave_denominator() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();

        // Left two thirds transparent green, right third white
        let img = RgbaImage::from_fn(30, 30, |x, _| {
            if x < 20 {
                Rgba([0, 200, 0, 0])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let result = classify(&[img], all);
        assert!(result.passed);
        assert_eq!(result.ratio("White"), Some(100.0));
    }

    #[test]
    fn test_fully_transparent_does_not_pass() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();
        let result = classify(&[solid(WHITE, 0)], all);
        assert!(!result.passed);
        assert!(result.colors.iter().all(|c| c.ratio == 0.0));
    }

    #[test]
    fn test_frames_are_averaged() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();
        let result = classify(&[solid(WHITE, 255), solid(BLURPLE, 255)], all);
        assert_eq!(result.ratio("White"), Some(50.0));
        assert_eq!(result.ratio("Blurple"), Some(50.0));
        assert!(result.passed);
    }

    #[test]
    fn test_ratios_rounded_to_two_decimals() {
        let registry = Registry::builtin();
        let all = registry.default_reference().unwrap();
        // 3x1 after downsampling: one white, two blurple
        let img = RgbaImage::from_fn(9, 3, |x, _| {
            if x < 3 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba(BLURPLE.with_alpha(255).to_array())
            }
        });
        let result = classify(&[img], all);
        assert_eq!(result.ratio("White"), Some(33.33));
        assert_eq!(result.ratio("Blurple"), Some(66.67));
    }

    #[test]
    fn test_neighbour_blends_widen_match() {
        let matcher = Matcher::new(&[DARK_BLURPLE, BLURPLE, WHITE]);
        // Halfway-ish toward blurple from dark blurple still counts as dark blurple
        let near = DARK_BLURPLE.lerp(&BLURPLE, 1.0 / 3.0);
        assert_eq!(matcher.bucket(&near), 0);
        assert_eq!(matcher.bucket(&Rgb::new(0, 255, 0)), 3);
    }
}
