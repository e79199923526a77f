//! Sobel edge detection and edge restyling

use image::RgbaImage;

use crate::color::Rgb;

/// Edge strength (0..255 scale) a pixel must exceed to be restyled
pub const EDGE_THRESHOLD: f32 = 10.0;

/// Raw gradient magnitude mapped to 255 (empirical; hard edges saturate)
const EDGE_SCALE: f32 = 1024.0;

/// Sobel gradient magnitude of `R + G + B`, scaled to 0..255, row-major
///
/// Borders replicate the outermost pixels.
pub fn gradient_magnitude(img: &RgbaImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);

    let intensity: Vec<f32> = img
        .chunks_exact(4)
        .map(|p| (p[0] as u16 + p[1] as u16 + p[2] as u16) as f32)
        .collect();

    let mut magnitude = vec![0.0f32; w * h];

    for y in 0..h {
        let above = &intensity[y.saturating_sub(1) * w..][..w];
        let row = &intensity[y * w..][..w];
        let below = &intensity[(y + 1).min(h - 1) * w..][..w];

        for x in 0..w {
            let l = x.saturating_sub(1);
            let r = (x + 1).min(w - 1);

            //      -1 0 1          -1 -2 -1
            // Gx = -2 0 2     Gy =  0  0  0
            //      -1 0 1           1  2  1
            let gx = (above[r] + 2.0 * row[r] + below[r]) - (above[l] + 2.0 * row[l] + below[l]);
            let gy = (below[l] + 2.0 * below[x] + below[r]) - (above[l] + 2.0 * above[x] + above[r]);

            magnitude[y * w + x] = ((gx * gx + gy * gy).sqrt() * 255.0 / EDGE_SCALE).min(255.0);
        }
    }

    magnitude
}

/// Blend edge pixels of `base` toward the palette color nearest to the
/// matching `source` pixel
///
/// Strength ramps linearly from the threshold (nothing) to the strongest
/// edge in the image (full palette color). Alpha is left untouched.
pub fn stylize(base: &mut RgbaImage, source: &RgbaImage, colors: &[Rgb; 3]) {
    let edges = gradient_magnitude(source);
    let peak = edges.iter().copied().fold(0.0f32, f32::max);
    if peak <= EDGE_THRESHOLD {
        return;
    }
    let span = peak - EDGE_THRESHOLD;

    let mut restyled = 0usize;
    for ((dst, src), &e) in base
        .chunks_exact_mut(4)
        .zip(source.chunks_exact(4))
        .zip(edges.iter())
    {
        if e <= EDGE_THRESHOLD {
            continue;
        }
        let t = (e - EDGE_THRESHOLD) / span;
        let ink = colors[Rgb::new(src[0], src[1], src[2]).nearest(colors)];
        let mixed = Rgb::new(dst[0], dst[1], dst[2]).lerp(&ink, t);
        dst[..3].copy_from_slice(&[mixed.r, mixed.g, mixed.b]);
        restyled += 1;
    }

    tracing::debug!("Edge stylize: {} pixels restyled, peak {:.1}", restyled, peak);
}
