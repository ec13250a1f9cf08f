//! Synthetic scenes for unit tests: notched discs on a black background.
//!
//! Every blob carries a wedge notch so the pose extractor has a convexity
//! defect to orient on; a plain disc would be rejected as convex.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Half-angle of the notch wedge, radians.
const NOTCH_HALF_ANGLE: f64 = 0.35;
/// Inner radius of the notch as a fraction of the blob radius.
const NOTCH_INNER_FRAC: f64 = 0.4;

/// One notched disc: center, radius, notch direction and fill color.
/// The fill bytes carry whatever encoding the test feeds downstream
/// (raw HSV for pipeline stages, true RGB for whole-frame processing).
#[derive(Debug, Clone, Copy)]
pub struct Blob {
    pub center: (f64, f64),
    pub radius: f64,
    /// Direction the notch is cut toward, radians.
    pub notch_angle: f64,
    pub color: [u8; 3],
}

impl Blob {
    pub fn new(center: (f64, f64), radius: f64, notch_angle: f64, color: [u8; 3]) -> Self {
        Self {
            center,
            radius,
            notch_angle,
            color,
        }
    }

    fn covers(&self, x: f64, y: f64) -> bool {
        let dx = x - self.center.0;
        let dy = y - self.center.1;
        let r = (dx * dx + dy * dy).sqrt();
        if r > self.radius {
            return false;
        }
        // wedge notch from the rim toward the center
        if r > self.radius * NOTCH_INNER_FRAC {
            let ang = dy.atan2(dx);
            let mut diff = (ang - self.notch_angle).rem_euclid(2.0 * std::f64::consts::PI);
            if diff > std::f64::consts::PI {
                diff -= 2.0 * std::f64::consts::PI;
            }
            if diff.abs() < NOTCH_HALF_ANGLE {
                return false;
            }
        }
        true
    }
}

/// Binary mask of a single notched disc.
pub fn draw_notched_disc_mask(
    width: u32,
    height: u32,
    center: (f64, f64),
    radius: f64,
    notch_angle: f64,
) -> GrayImage {
    let blob = Blob::new(center, radius, notch_angle, [0, 0, 0]);
    let mut mask = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            if blob.covers(x as f64, y as f64) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Frame with the given blobs over a black background.
pub fn blob_scene(width: u32, height: u32, blobs: &[Blob]) -> RgbImage {
    let mut frame = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            for blob in blobs {
                if blob.covers(x as f64, y as f64) {
                    frame.put_pixel(x, y, Rgb(blob.color));
                    break;
                }
            }
        }
    }
    frame
}
