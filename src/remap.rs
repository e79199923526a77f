//! Luminance-driven recoloring
//!
//! - Reduce each frame to luminance + alpha
//! - Build a 256-entry lookup table for the chosen method
//! - Map every pixel through the table (edges restyled for EdgeStylize)
//! - Optionally flatten onto a solid background

use image::{GrayAlphaImage, RgbaImage};

use crate::color::{Rgb, Rgba};
use crate::edge;
use crate::palette::ToneCurve;
use crate::variation::Resolved;

/// Recoloring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Tone curve per luminance bucket; breakpoint shifts are ignored
    DirectCurve,
    /// Three-color banded blend driven by the variation vector
    PiecewiseBlend,
    /// PiecewiseBlend with Sobel edges colored by nearest palette color
    EdgeStylize,
}

impl Method {
    pub const ALL: [Method; 3] = [
        Method::DirectCurve,
        Method::PiecewiseBlend,
        Method::EdgeStylize,
    ];

    /// Name callers select the method with
    pub fn name(&self) -> &'static str {
        match self {
            Method::DirectCurve => "--filter",
            Method::PiecewiseBlend => "--remap",
            Method::EdgeStylize => "--edge-detect",
        }
    }

    pub fn from_name(name: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Observed luminance extrema of an image or animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LumaRange {
    pub min: u8,
    pub max: u8,
}

impl LumaRange {
    /// Extrema over visible pixels, `None` when every pixel is transparent
    pub fn of(luma: &GrayAlphaImage) -> Option<Self> {
        luma.as_raw()
            .chunks_exact(2)
            .filter(|p| p[1] > 0)
            .fold(None, |range: Option<LumaRange>, p| {
                let l = p[0];
                Some(match range {
                    Some(r) => LumaRange {
                        min: r.min.min(l),
                        max: r.max.max(l),
                    },
                    None => LumaRange { min: l, max: l },
                })
            })
    }

    /// Range covering both inputs
    pub fn union(self, other: LumaRange) -> LumaRange {
        LumaRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.max <= self.min
    }

    /// Position of `luma` in [0, 1]
    ///
    /// A flat range has no span to normalize by, so luminance is taken
    /// as-is over the full 0..255 domain.
    pub fn normalize(&self, luma: u8) -> f32 {
        if self.is_flat() {
            return luma as f32 / 255.0;
        }
        ((luma as f32 - self.min as f32) / (self.max - self.min) as f32).clamp(0.0, 1.0)
    }
}

impl Default for LumaRange {
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

/// Everything needed to recolor frames of one image
#[derive(Debug, Clone)]
pub struct Recipe {
    pub method: Method,
    pub resolved: Resolved,
    /// Tone curve through the resolved colors, read by [`Method::DirectCurve`]
    pub curve: ToneCurve,
    /// Background to flatten onto, already gated by the caller's choice
    pub background: Option<Rgba>,
}

impl Recipe {
    pub fn new(method: Method, resolved: Resolved, replace_background: bool) -> Self {
        let background = if replace_background {
            resolved.background
        } else {
            None
        };
        Self {
            method,
            curve: ToneCurve::even(&resolved.colors),
            resolved,
            background,
        }
    }

    /// Color per luminance bucket; `None` marks buckets dropped as transparent
    pub fn lookup_table(&self, range: LumaRange) -> [Option<Rgb>; 256] {
        let mut lut = [None; 256];

        for (l, slot) in lut.iter_mut().enumerate() {
            let l = l as u8;
            if l < range.min {
                continue;
            }
            *slot = Some(match self.method {
                Method::DirectCurve => {
                    let x = if range.min == 255 {
                        l as f32
                    } else {
                        (l - range.min) as f32 * 255.0 / (255 - range.min) as f32
                    };
                    self.curve.eval(x)
                }
                Method::PiecewiseBlend | Method::EdgeStylize => self
                    .resolved
                    .vector
                    .sample(&self.resolved.colors, range.normalize(l)),
            });
        }

        lut
    }

    /// Recolor one frame using the shared luminance range
    pub fn apply(&self, frame: &RgbaImage, range: LumaRange) -> RgbaImage {
        let luma = image::imageops::grayscale_alpha(frame);
        let lut = self.lookup_table(range);

        let (width, height) = frame.dimensions();
        let mut out = RgbaImage::new(width, height);

        for (dst, src) in out.chunks_exact_mut(4).zip(luma.as_raw().chunks_exact(2)) {
            let rgba = match lut[src[0] as usize] {
                Some(c) => c.with_alpha(src[1]),
                None => Rgba::TRANSPARENT,
            };
            dst.copy_from_slice(&rgba.to_array());
        }

        if self.method == Method::EdgeStylize {
            edge::stylize(&mut out, frame, &self.resolved.colors);
        }

        if let Some(bg) = self.background {
            flatten(&mut out, bg.rgb());
        }

        out
    }
}

/// Alpha-composite onto an opaque background color
pub fn flatten(img: &mut RgbaImage, background: Rgb) {
    for px in img.chunks_exact_mut(4) {
        let a = px[3] as f32 / 255.0;
        let src = Rgb::new(px[0], px[1], px[2]);
        let mixed = background.lerp(&src, a);
        px.copy_from_slice(&mixed.with_alpha(255).to_array());
    }
}
