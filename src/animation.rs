//! Input decoding and multi-frame (GIF) handling
//!
//! Animated input is recolored in two passes: the luminance range is taken
//! over every frame first, so all frames share one lookup table and the
//! output does not flicker.

use std::io::Cursor;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame, ImageDecoder, ImageFormat, Limits, RgbaImage};

use crate::error::RemapError;
use crate::remap::{LumaRange, Recipe};

/// Upper bound on decoded RGBA data for one animation, all frames together
pub const MAX_DECODED_BYTES: u64 = 256 * 1024 * 1024;

/// GIF loop count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Looping {
    Infinite,
    /// Number of extra plays; 0 plays once
    Finite(u16),
}

impl From<gif::Repeat> for Looping {
    fn from(r: gif::Repeat) -> Self {
        match r {
            gif::Repeat::Infinite => Looping::Infinite,
            gif::Repeat::Finite(n) => Looping::Finite(n),
        }
    }
}

impl From<Looping> for Repeat {
    fn from(l: Looping) -> Self {
        match l {
            Looping::Infinite => Repeat::Infinite,
            Looping::Finite(n) => Repeat::Finite(n),
        }
    }
}

/// A decoded multi-frame image
pub struct Animation {
    /// Fully composited frames with their display delays
    pub frames: Vec<Frame>,
    pub looping: Looping,
}

/// A decoded input image
pub enum Source {
    Still(RgbaImage),
    Animated(Animation),
}

impl Source {
    /// Decode PNG, JPEG or GIF bytes
    ///
    /// A GIF with a single frame is treated as a still image.
    pub fn decode(bytes: &[u8]) -> Result<Source, RemapError> {
        if bytes.is_empty() {
            return Err(RemapError::InvalidImage("empty input".into()));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| RemapError::InvalidImage(format!("Unknown image format: {}", e)))?;

        if format == ImageFormat::Gif {
            let mut animation = Animation::decode(bytes)?;
            return match animation.frames.len() {
                0 => Err(RemapError::InvalidImage("GIF has no frames".into())),
                1 => Ok(Source::Still(animation.frames.remove(0).into_buffer())),
                _ => Ok(Source::Animated(animation)),
            };
        }

        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| RemapError::InvalidImage(format!("Failed to decode image: {}", e)))?;

        Ok(Source::Still(img.to_rgba8()))
    }

    /// All frames as plain buffers
    pub fn into_frames(self) -> Vec<RgbaImage> {
        match self {
            Source::Still(img) => vec![img],
            Source::Animated(animation) => animation
                .frames
                .into_iter()
                .map(Frame::into_buffer)
                .collect(),
        }
    }
}

impl Animation {
    /// Decode every frame of a GIF
    ///
    /// Frames are composited onto the full logical screen, so the decoded
    /// size is checked against [`MAX_DECODED_BYTES`] before any pixel data
    /// is allocated.
    pub fn decode(bytes: &[u8]) -> Result<Animation, RemapError> {
        let info = GifInfo::scan(bytes)?;
        let needed = info.decoded_bytes();
        if needed > MAX_DECODED_BYTES {
            return Err(RemapError::InvalidImage(format!(
                "GIF of {} frames on a {}x{} screen needs {} bytes decoded (limit {})",
                info.frames, info.width, info.height, needed, MAX_DECODED_BYTES
            )));
        }

        let mut decoder = GifDecoder::new(Cursor::new(bytes))
            .map_err(|e| RemapError::InvalidImage(format!("Failed to decode GIF: {}", e)))?;
        decoder
            .set_limits(Limits::default())
            .map_err(|e| RemapError::InvalidImage(format!("GIF exceeds decoding limits: {}", e)))?;

        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| RemapError::InvalidImage(format!("Failed to decode GIF frame: {}", e)))?;

        Ok(Animation {
            frames,
            looping: info.looping,
        })
    }

    /// Luminance range over every frame
    pub fn luma_range(&self) -> LumaRange {
        self.frames
            .iter()
            .filter_map(|f| LumaRange::of(&image::imageops::grayscale_alpha(f.buffer())))
            .reduce(LumaRange::union)
            .unwrap_or_default()
    }

    /// Recolor every frame with the shared range and encode as GIF
    pub fn recolor(self, recipe: &Recipe) -> Result<Vec<u8>, RemapError> {
        let (width, height) = match self.frames.first() {
            Some(f) => f.buffer().dimensions(),
            None => return Err(RemapError::InvalidAnimation("no frames".into())),
        };
        if let Some(bad) = self
            .frames
            .iter()
            .find(|f| f.buffer().dimensions() != (width, height))
        {
            let (w, h) = bad.buffer().dimensions();
            return Err(RemapError::InvalidAnimation(format!(
                "frame size {}x{} differs from {}x{}",
                w, h, width, height
            )));
        }

        let range = self.luma_range();
        tracing::debug!(
            "Recoloring {} frames with shared luma range {}..{}",
            self.frames.len(),
            range.min,
            range.max
        );

        let frames: Vec<Frame> = self
            .frames
            .iter()
            .map(|f| Frame::from_parts(recipe.apply(f.buffer(), range), 0, 0, f.delay()))
            .collect();

        encode_gif(frames, self.looping)
    }
}

/// GIF container metadata, read without decompressing frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GifInfo {
    width: u16,
    height: u16,
    frames: usize,
    looping: Looping,
}

impl GifInfo {
    fn scan(bytes: &[u8]) -> Result<GifInfo, RemapError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        options.skip_frame_decoding(true);

        let mut decoder = options
            .read_info(Cursor::new(bytes))
            .map_err(|e| RemapError::InvalidImage(format!("Failed to read GIF header: {}", e)))?;

        // The loop extension may sit anywhere before the trailer
        let mut frames = 0;
        while decoder
            .read_next_frame()
            .map_err(|e| RemapError::InvalidImage(format!("Failed to read GIF frame: {}", e)))?
            .is_some()
        {
            frames += 1;
        }

        Ok(GifInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames,
            looping: decoder.repeat().into(),
        })
    }

    /// RGBA bytes for every frame composited onto the logical screen
    fn decoded_bytes(&self) -> u64 {
        self.frames as u64 * u64::from(self.width) * u64::from(self.height) * 4
    }
}

/// Encode frames as GIF, keeping delays and loop count
pub fn encode_gif(frames: Vec<Frame>, looping: Looping) -> Result<Vec<u8>, RemapError> {
    let mut output = Vec::new();

    {
        let mut encoder = GifEncoder::new(&mut output);
        encoder
            .set_repeat(looping.into())
            .map_err(|e| RemapError::InvalidAnimation(format!("GIF loop error: {}", e)))?;
        encoder
            .encode_frames(frames)
            .map_err(|e| RemapError::InvalidAnimation(format!("GIF write error: {}", e)))?;
    }

    Ok(output)
}
