//! Binary mask cleanup: Gaussian smoothing, fixed thresholding and
//! disc-kernel morphology.
//!
//! The likelihood map coming out of the color model is noisy at the pixel
//! level; `blur → threshold → open → close` turns it into solid part regions.
//! Morphology uses a disc structuring element of radius `k` (kernel size
//! `2k+1`), so opening with radius ≥ 1 removes specks smaller than the disc
//! and closing fills holes smaller than it.

use image::{GrayImage, Luma};

/// Foreground value of a binary mask.
pub const FG: u8 = 255;

/// Gaussian sigma for a given odd kernel size, following OpenCV's
/// sigma-from-ksize rule so tunables carry over from the usual tooling.
pub fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian-blur a `GrayImage` via `imageproc`, staying in u8 range.
pub fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut f = image::ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for y in 0..h {
        for x in 0..w {
            f.put_pixel(x, y, Luma([img.get_pixel(x, y)[0] as f32 / 255.0]));
        }
    }
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = blurred.get_pixel(x, y)[0].clamp(0.0, 1.0);
            out.put_pixel(x, y, Luma([(v * 255.0).round() as u8]));
        }
    }
    out
}

/// Fixed binary threshold: strictly-above `t` becomes foreground.
pub fn threshold_binary(map: &GrayImage, t: u8) -> GrayImage {
    let mut out = GrayImage::new(map.width(), map.height());
    for (src, dst) in map.pixels().zip(out.pixels_mut()) {
        dst[0] = if src[0] > t { FG } else { 0 };
    }
    out
}

/// Offsets covered by a disc of the given radius, center included.
fn disc_offsets(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let r_sq = r * r;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r_sq {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Disc erosion. Pixels outside the image count as foreground, so blobs
/// touching the border are not eaten by the frame edge.
pub fn erode_disc(mask: &GrayImage, radius: u32) -> GrayImage {
    morph_disc(mask, radius, true)
}

/// Disc dilation. Pixels outside the image count as background.
pub fn dilate_disc(mask: &GrayImage, radius: u32) -> GrayImage {
    morph_disc(mask, radius, false)
}

fn morph_disc(mask: &GrayImage, radius: u32, erode: bool) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (w, h) = mask.dimensions();
    let offsets = disc_offsets(radius);
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut hit = erode;
            for &(dx, dy) in &offsets {
                let nx = x + dx;
                let ny = y + dy;
                let inside = nx >= 0 && ny >= 0 && nx < w as i32 && ny < h as i32;
                let fg = if inside {
                    mask.get_pixel(nx as u32, ny as u32)[0] > 0
                } else {
                    erode
                };
                if erode != fg {
                    hit = !erode;
                    break;
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([if hit { FG } else { 0 }]));
        }
    }
    out
}

/// Morphological opening (erode then dilate) with a disc of radius `k`.
pub fn open_disc(mask: &GrayImage, radius: u32) -> GrayImage {
    dilate_disc(&erode_disc(mask, radius), radius)
}

/// Morphological closing (dilate then erode) with a disc of radius `k`.
pub fn close_disc(mask: &GrayImage, radius: u32) -> GrayImage {
    erode_disc(&dilate_disc(mask, radius), radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_area(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] > 0).count()
    }

    fn blob_with_speck() -> GrayImage {
        let mut mask = GrayImage::new(40, 40);
        // 10x10 solid blob
        for y in 10..20 {
            for x in 10..20 {
                mask.put_pixel(x, y, Luma([FG]));
            }
        }
        // isolated single-pixel speck
        mask.put_pixel(32, 32, Luma([FG]));
        mask
    }

    #[test]
    fn threshold_is_strictly_above() {
        let mut map = GrayImage::new(3, 1);
        map.put_pixel(0, 0, Luma([127]));
        map.put_pixel(1, 0, Luma([128]));
        map.put_pixel(2, 0, Luma([0]));
        let bin = threshold_binary(&map, 127);
        assert_eq!(bin.get_pixel(0, 0)[0], 0);
        assert_eq!(bin.get_pixel(1, 0)[0], FG);
        assert_eq!(bin.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn opening_removes_speck_and_keeps_blob() {
        let mask = blob_with_speck();
        let opened = open_disc(&mask, 1);
        assert_eq!(opened.get_pixel(32, 32)[0], 0, "speck should be removed");
        assert_eq!(opened.get_pixel(15, 15)[0], FG, "blob interior survives");
    }

    #[test]
    fn opening_never_adds_area() {
        let mask = blob_with_speck();
        for radius in 1..=3 {
            let opened = open_disc(&mask, radius);
            for (a, b) in mask.pixels().zip(opened.pixels()) {
                assert!(
                    b[0] == 0 || a[0] > 0,
                    "opening with radius {} set a pixel that was background",
                    radius
                );
            }
            assert!(mask_area(&opened) <= mask_area(&mask));
        }
    }

    #[test]
    fn closing_fills_small_hole() {
        let mut mask = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                mask.put_pixel(x, y, Luma([FG]));
            }
        }
        mask.put_pixel(15, 15, Luma([0]));
        let closed = close_disc(&mask, 1);
        assert_eq!(closed.get_pixel(15, 15)[0], FG);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = blob_with_speck();
        assert_eq!(open_disc(&mask, 0), mask);
        assert_eq!(close_disc(&mask, 0), mask);
    }

    #[test]
    fn border_blob_survives_erosion() {
        let mut mask = GrayImage::new(20, 20);
        for y in 0..6 {
            for x in 0..6 {
                mask.put_pixel(x, y, Luma([FG]));
            }
        }
        let eroded = erode_disc(&mask, 1);
        assert_eq!(eroded.get_pixel(0, 0)[0], FG, "corner pixel kept");
    }
}
