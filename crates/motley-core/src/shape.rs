//! Remembered silhouettes and per-contour pose features.
//!
//! [`ShapeMemory`] holds the single taught reference contour for one part and
//! filters candidate contours by Hu-invariant distance to it.
//! [`extract_pose_features`] reduces each surviving contour to the pose
//! record the composite matcher works with: centroid, orientation and
//! characteristic size.

use image::GrayImage;
use nalgebra::Point2;

use crate::contour::{
    self, contour_area, convexity_defects, min_enclosing_circle, point_in_polygon,
    polygon_moments, shape_distance, Contour,
};

/// Defects shallower than this (px) are tracing noise, not a concavity the
/// orientation estimate can anchor on.
const MIN_DEFECT_DEPTH: f64 = 1.0;

/// Pose of one detected candidate region.
///
/// Orientation points from the centroid toward the midpoint of the largest
/// convexity defect's hull-edge gap; size is the minimal-enclosing-circle
/// radius. Both are recomputed every detection call; nothing here survives
/// the frame except through the taught invariant poses.
#[derive(Debug, Clone)]
pub struct PoseFeature {
    pub centroid: Point2<f64>,
    /// Radians, `atan2` convention.
    pub orientation: f64,
    /// Minimal enclosing circle radius (px).
    pub size: f64,
    /// Source contour, kept for hit-testing and drawing.
    pub contour: Contour,
    /// Convex hull of the source contour, kept for drawing.
    pub hull: Contour,
}

impl PoseFeature {
    /// Whether a screen point falls inside the source contour.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        point_in_polygon(&self.contour, x, y)
    }
}

/// The taught reference silhouette of one part.
#[derive(Debug, Clone, Default)]
pub struct ShapeMemory {
    reference: Option<Contour>,
}

impl ShapeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self) -> Option<&Contour> {
        self.reference.as_ref()
    }

    pub fn set_reference(&mut self, contour: Option<Contour>) {
        self.reference = contour;
    }

    /// Keep only contours shape-similar to the reference.
    ///
    /// `contour_threshold` is the percent cutoff on the Hu-invariant
    /// distance; with no taught reference all contours pass through.
    pub fn filter_by_reference(
        &self,
        contours: Vec<Contour>,
        contour_threshold: u32,
    ) -> Vec<Contour> {
        let Some(reference) = &self.reference else {
            return contours;
        };
        let cutoff = contour_threshold as f64 / 100.0;
        contours
            .into_iter()
            .filter(|c| shape_distance(c, reference) < cutoff)
            .collect()
    }

    /// Teach the reference from a clicked point on a binary mask.
    ///
    /// Among area- and similarity-filtered contours, the one containing
    /// `(x, y)` becomes the new reference. If none contains the point the
    /// reference is cleared: clicking the background teaches "no shape".
    /// Returns `true` when a reference was set.
    pub fn teach_reference(&mut self, mask: &GrayImage, x: i32, y: i32, contour_threshold: u32) -> bool {
        let contours = self.filter_by_reference(contour::extract_contours(mask), contour_threshold);
        let hit = contours.into_iter().find(|c| point_in_polygon(c, x, y));
        let taught = hit.is_some();
        self.reference = hit;
        taught
    }
}

/// Compute pose features for each contour that can establish an orientation.
///
/// Contours with no convexity defect deeper than the noise floor are
/// dropped: a convex silhouette has no landmark to hang an invariant
/// orientation on, and the matcher prefers missing a part over matching it
/// with an arbitrary angle. Zero-area contours are skipped outright.
pub fn extract_pose_features(contours: Vec<Contour>) -> Vec<PoseFeature> {
    let mut features = Vec::new();
    for contour in contours {
        if contour_area(&contour) <= 0.0 {
            tracing::debug!("skipping zero-area contour");
            continue;
        }
        let moments = polygon_moments(&contour);
        let (cx, cy) = moments.centroid();

        let hull = imageproc::geometry::convex_hull(&contour[..]);
        let defects = convexity_defects(&contour, &hull);
        let Some(largest) = defects
            .iter()
            .filter(|d| d.depth >= MIN_DEFECT_DEPTH)
            .max_by(|a, b| a.depth.total_cmp(&b.depth))
        else {
            tracing::debug!("skipping convex contour: no defect to orient on");
            continue;
        };

        let (gx, gy) = largest.gap_midpoint();
        let orientation = (gy - cy).atan2(gx - cx);

        let Some((_, _, radius)) = min_enclosing_circle(&contour) else {
            continue;
        };

        features.push(PoseFeature {
            centroid: Point2::new(cx, cy),
            orientation,
            size: radius,
            contour,
            hull,
        });
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_notched_disc_mask;
    use image::Luma;
    use imageproc::point::Point;

    fn filled_rect_mask(w: u32, h: u32, x0: u32, y0: u32, rw: u32, rh: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y0 + rh {
            for x in x0..x0 + rw {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn convex_region_yields_no_pose() {
        let mask = filled_rect_mask(80, 80, 10, 10, 40, 40);
        let contours = contour::extract_contours(&mask);
        assert_eq!(contours.len(), 1);
        let poses = extract_pose_features(contours);
        assert!(poses.is_empty(), "a rectangle cannot establish an orientation");
    }

    #[test]
    fn notched_disc_yields_pose_toward_notch() {
        let mask = draw_notched_disc_mask(120, 120, (60.0, 60.0), 30.0, 0.0);
        let contours = contour::extract_contours(&mask);
        assert_eq!(contours.len(), 1);
        let poses = extract_pose_features(contours);
        assert_eq!(poses.len(), 1);
        let pose = &poses[0];

        assert!((pose.centroid.x - 60.0).abs() < 4.0, "centroid x = {}", pose.centroid.x);
        assert!((pose.centroid.y - 60.0).abs() < 4.0, "centroid y = {}", pose.centroid.y);
        assert!((pose.size - 30.0).abs() < 3.0, "size = {}", pose.size);
        // notch cut toward +x: the defect gap midpoint sits on that side
        assert!(
            pose.orientation.abs() < 0.5,
            "orientation {} should point at the notch",
            pose.orientation
        );
    }

    #[test]
    fn reference_filter_passes_all_when_untaught() {
        let memory = ShapeMemory::new();
        let contours = vec![vec![
            Point::new(0, 0),
            Point::new(30, 0),
            Point::new(30, 30),
            Point::new(0, 30),
        ]];
        assert_eq!(memory.filter_by_reference(contours.clone(), 15).len(), 1);
    }

    #[test]
    fn teach_then_filter_keeps_similar_shapes_only() {
        let mask = draw_notched_disc_mask(120, 120, (60.0, 60.0), 30.0, 0.0);
        let mut memory = ShapeMemory::new();
        assert!(memory.teach_reference(&mask, 60, 60, 15));
        assert!(memory.reference().is_some());

        // Same silhouette, shifted and scaled: passes.
        let similar = draw_notched_disc_mask(200, 200, (90.0, 110.0), 45.0, 0.0);
        let similar_contours = contour::extract_contours(&similar);
        assert_eq!(memory.filter_by_reference(similar_contours, 15).len(), 1);

        // A long thin bar: rejected by the shape gate.
        let bar = filled_rect_mask(120, 120, 20, 20, 70, 10);
        let bar_contours = contour::extract_contours(&bar);
        assert_eq!(bar_contours.len(), 1);
        assert!(memory.filter_by_reference(bar_contours, 15).is_empty());
    }

    #[test]
    fn teaching_background_clears_reference() {
        let mask = draw_notched_disc_mask(120, 120, (60.0, 60.0), 30.0, 0.0);
        let mut memory = ShapeMemory::new();
        assert!(memory.teach_reference(&mask, 60, 60, 15));
        assert!(!memory.teach_reference(&mask, 5, 5, 15));
        assert!(memory.reference().is_none());
    }
}
