//! Anchor-pair invariant frame and pose comparison.
//!
//! Two anchor detections define a similarity frame: origin at the first
//! anchor's centroid, unit length equal to the anchor separation, x-axis
//! along the anchor baseline. Part poses projected into this frame are
//! invariant to translation, rotation and uniform scaling of the whole
//! costume, so a pose taught once can be recognized in any later frame.

use nalgebra::{Point2, Vector2};

/// A part pose expressed in the anchor frame:
/// `[along-baseline, across-baseline, size / anchor-separation]`.
pub type InvariantPose = [f64; 3];

/// Similarity frame spanned by a pair of anchor detections.
#[derive(Debug, Clone, Copy)]
pub struct AnchorFrame {
    origin: Point2<f64>,
    scale: f64,
    axis: Vector2<f64>,
}

impl AnchorFrame {
    /// Build the frame from the two anchor centroids.
    ///
    /// Returns `None` when the anchors coincide; a zero baseline gives no
    /// direction and no scale, so the caller skips this pairing.
    pub fn between(a: Point2<f64>, b: Point2<f64>) -> Option<Self> {
        let baseline = b - a;
        let scale = baseline.norm();
        if scale <= f64::EPSILON {
            return None;
        }
        Some(Self {
            origin: a,
            scale,
            axis: baseline / scale,
        })
    }

    /// Anchor separation in pixels.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Project a detection into the invariant frame.
    pub fn project(&self, centroid: Point2<f64>, size: f64) -> InvariantPose {
        let d = centroid - self.origin;
        let perp = Vector2::new(-self.axis.y, self.axis.x);
        [
            d.dot(&self.axis) / self.scale,
            d.dot(&perp) / self.scale,
            size / self.scale,
        ]
    }
}

/// Max-norm comparison of two invariant poses.
pub fn poses_match(a: &InvariantPose, b: &InvariantPose, tolerance: f64) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= tolerance)
}
