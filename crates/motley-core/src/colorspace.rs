//! RGB → HSV conversion in the 8-bit OpenCV convention.
//!
//! Hue is stored in `[0, 180)` so a full color circle fits in a `u8`.
//! The color model's wrap-aware hue difference depends on this range:
//! red sits at the 0/180 seam, and [`HUE_RANGE`] is the modulus used for
//! the circular difference.

use image::{Rgb, RgbImage};

/// Modulus of the circular hue axis (OpenCV 8-bit convention: degrees / 2).
pub const HUE_RANGE: f64 = 180.0;

/// Convert one RGB pixel to HSV with H in `[0, 180)`, S and V in `[0, 255]`.
pub fn rgb_pixel_to_hsv(p: Rgb<u8>) -> Rgb<u8> {
    let r = p[0] as f64 / 255.0;
    let g = p[1] as f64 / 255.0;
    let b = p[2] as f64 / 255.0;

    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta / v } else { 0.0 };

    let h_deg = if delta <= 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    let h = (h_deg / 2.0).round();
    // 360° maps onto 0, never 180
    let h = if h >= HUE_RANGE { 0.0 } else { h };

    Rgb([h as u8, (s * 255.0).round() as u8, (v * 255.0).round() as u8])
}

/// Convert a whole RGB frame into an HSV-encoded buffer of the same size.
///
/// Returns a new buffer; the input frame is never mutated.
pub fn rgb_to_hsv(frame: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(frame.width(), frame.height());
    for (src, dst) in frame.pixels().zip(out.pixels_mut()) {
        *dst = rgb_pixel_to_hsv(*src);
    }
    out
}
