//! Color value types and the channel-wise similarity metric

/// RGB color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn with_alpha(self, a: u8) -> Rgba {
        Rgba::new(self.r, self.g, self.b, a)
    }

    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Similarity in [0, 1]: mean over channels of `(255 - |a - b|) / 255`.
    ///
    /// Identical colors score 1.0, black against white scores 0.0.
    #[inline]
    pub fn similarity(&self, other: &Rgb) -> f32 {
        let dr = 255 - (self.r as i16 - other.r as i16).abs();
        let dg = 255 - (self.g as i16 - other.g as i16).abs();
        let db = 255 - (self.b as i16 - other.b as i16).abs();
        (dr + dg + db) as f32 / (3.0 * 255.0)
    }

    /// Linear interpolation toward `other`, `t` clamped to [0, 1]
    #[inline]
    pub fn lerp(&self, other: &Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }

    /// Index of the most similar color in `colors` (first wins on ties)
    pub fn nearest(&self, colors: &[Rgb]) -> usize {
        let mut best_index = 0;
        let mut best = f32::MIN;

        for (i, c) in colors.iter().enumerate() {
            let s = self.similarity(c);
            if s > best {
                best = s;
                best_index = i;
            }
        }

        best_index
    }
}

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_bounds() {
        let white = Rgb::new(255, 255, 255);
        let black = Rgb::new(0, 0, 0);
        assert_eq!(white.similarity(&white), 1.0);
        assert_eq!(black.similarity(&white), 0.0);
        assert_eq!(white.similarity(&black), 0.0);
    }

    #[test]
    fn test_similarity_is_channel_average() {
        // One channel fully off, two identical
        let a = Rgb::new(0, 10, 10);
        let b = Rgb::new(255, 10, 10);
        assert!((a.similarity(&b) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Rgb::new(0, 100, 200);
        let b = Rgb::new(200, 100, 0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Rgb::new(100, 100, 100));
        assert_eq!(a.lerp(&b, 7.0), b);
    }

    #[test]
    fn test_hex() {
        assert_eq!(Rgb::new(88, 101, 242).hex(), "#5865f2");
    }

    #[test]
    fn test_nearest() {
        let colors = [
            Rgb::new(0, 0, 0),
            Rgb::new(88, 101, 242),
            Rgb::new(255, 255, 255),
        ];
        assert_eq!(Rgb::new(10, 10, 10).nearest(&colors), 0);
        assert_eq!(Rgb::new(90, 100, 240).nearest(&colors), 1);
        assert_eq!(Rgb::new(250, 250, 250).nearest(&colors), 2);
    }
}
