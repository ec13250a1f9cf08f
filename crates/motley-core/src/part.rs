//! One named part of a composite object.
//!
//! A part bundles its color model, taught silhouette, tunables and the
//! per-frame detection results. The composite layer owns a map of these and
//! drives them frame by frame.

use image::RgbImage;

use crate::color::{ColorModel, ColorModelError};
use crate::contour;
use crate::invariant::InvariantPose;
use crate::overlay;
use crate::params::{MorphParams, ParamError};
use crate::shape::{extract_pose_features, PoseFeature, ShapeMemory};

/// A single part: color statistics, taught shape, tunables, frame state.
#[derive(Debug, Clone)]
pub struct PartModel {
    name: String,
    color: ColorModel,
    shape: ShapeMemory,
    params: MorphParams,
    detections: Vec<PoseFeature>,
    taught_poses: Vec<InvariantPose>,
}

impl PartModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: ColorModel::new(),
            shape: ShapeMemory::new(),
            params: MorphParams::default(),
            detections: Vec::new(),
            taught_poses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &ColorModel {
        &self.color
    }

    pub fn shape(&self) -> &ShapeMemory {
        &self.shape
    }

    pub fn params(&self) -> &MorphParams {
        &self.params
    }

    // ── Training ───────────────────────────────────────────────────────────

    /// Append one clicked HSV sample and refresh statistics.
    pub fn add_color_sample(&mut self, sample: &[f64]) -> Result<(), ColorModelError> {
        self.color.add_sample(sample)?;
        self.color.recompute_statistics();
        Ok(())
    }

    /// Teach the reference silhouette from a click at `(x, y)`.
    ///
    /// Runs the color pipeline on the frame first; returns `false` when the
    /// color model is untrained or no filtered contour contains the point.
    pub fn teach_shape(&mut self, hsv: &RgbImage, x: i32, y: i32) -> bool {
        let Some(mask) = self.color.binarize(hsv, &self.params) else {
            tracing::warn!(part = %self.name, "cannot teach shape: color model untrained");
            return false;
        };
        self.shape.teach_reference(&mask, x, y, self.params.contour_threshold)
    }

    /// Forget the color samples. The taught shape and poses are kept; they
    /// stay valid when the operator retrains the part under new lighting.
    pub fn reset_color(&mut self) {
        self.color.clear();
        self.detections.clear();
    }

    // ── Tunables ───────────────────────────────────────────────────────────

    pub fn set_parameter(&mut self, name: &str, value: i64) -> Result<(), ParamError> {
        self.params.set(name, value)
    }

    pub fn get_parameter(&self, name: &str) -> Result<i64, ParamError> {
        self.params.get(name)
    }

    // ── Detection ──────────────────────────────────────────────────────────

    /// Run the full per-part pipeline on an HSV frame.
    ///
    /// Replaces the stored detections and returns a diagnostic view: the
    /// binarized mask lifted to RGB with each detection's contour, hull and
    /// pose markers drawn on it. An untrained color model yields no view and
    /// no detections; that is the normal state before ten samples exist.
    pub fn detect(&mut self, hsv: &RgbImage) -> Option<RgbImage> {
        self.detections.clear();
        let mask = self.color.binarize(hsv, &self.params)?;
        let contours = self
            .shape
            .filter_by_reference(contour::extract_contours(&mask), self.params.contour_threshold);
        self.detections = extract_pose_features(contours);
        tracing::debug!(part = %self.name, detections = self.detections.len(), "part detected");
        let mut view = overlay::mask_to_rgb(&mask);
        for pose in &self.detections {
            overlay::draw_pose(&mut view, pose);
        }
        Some(view)
    }

    /// Detections from the most recent [`detect`](Self::detect) call.
    pub fn detections(&self) -> &[PoseFeature] {
        &self.detections
    }

    // ── Taught poses ───────────────────────────────────────────────────────

    pub fn taught_poses(&self) -> &[InvariantPose] {
        &self.taught_poses
    }

    pub fn add_taught_pose(&mut self, pose: InvariantPose) {
        self.taught_poses.push(pose);
    }

    pub fn clear_taught_poses(&mut self) {
        self.taught_poses.clear();
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// Rebuild a part from stored data, recomputing color statistics.
    pub fn from_data(name: impl Into<String>, data: crate::model_io::PartData) -> Result<Self, ColorModelError> {
        let mut part = Self::new(name);
        part.color = ColorModel::from_samples(data.samples)?;
        part.shape.set_reference(data.reference_contour.map(|points| {
            points
                .into_iter()
                .map(|[x, y]| imageproc::point::Point::new(x, y))
                .collect()
        }));
        part.taught_poses = data.taught_poses;
        part.params = data.params;
        Ok(part)
    }

    /// Snapshot the part's persistent state.
    pub fn to_data(&self) -> crate::model_io::PartData {
        crate::model_io::PartData {
            samples: self.color.samples().to_vec(),
            reference_contour: self
                .shape
                .reference()
                .map(|c| c.iter().map(|p| [p.x, p.y]).collect()),
            taught_poses: self.taught_poses.clone(),
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{blob_scene, Blob};

    const RED: [u8; 3] = [0, 220, 220];

    fn train_on(part: &mut PartModel, hsv_color: [u8; 3]) {
        let jitter = [-3.0, -2.0, -1.5, -1.0, -0.5, 0.5, 1.0, 1.5, 2.0, 3.0];
        for off in jitter {
            part.add_color_sample(&[
                hsv_color[0] as f64 + off,
                hsv_color[1] as f64 + off,
                hsv_color[2] as f64 - off,
            ])
            .unwrap();
        }
    }

    #[test]
    fn untrained_part_detects_nothing() {
        let mut part = PartModel::new("torso");
        let frame = blob_scene(100, 100, &[Blob::new((50.0, 50.0), 20.0, 0.0, RED)]);
        assert!(part.detect(&frame).is_none());
        assert!(part.detections().is_empty());
    }

    #[test]
    fn trained_part_finds_its_blob() {
        let mut part = PartModel::new("torso");
        train_on(&mut part, RED);
        let frame = blob_scene(120, 120, &[Blob::new((60.0, 60.0), 25.0, 0.0, RED)]);
        let view = part.detect(&frame).unwrap();
        assert_eq!(part.detections().len(), 1);
        let pose = &part.detections()[0];
        assert!((pose.centroid.x - 60.0).abs() < 5.0);
        assert!((pose.centroid.y - 60.0).abs() < 5.0);

        // the returned view is annotated: white mask body, pose marker at
        // the centroid
        assert_eq!(
            view.get_pixel(45, 60),
            &image::Rgb([255, 255, 255]),
            "mask interior lifted to white"
        );
        let cx = pose.centroid.x.round() as u32;
        let cy = pose.centroid.y.round() as u32;
        assert_eq!(view.get_pixel(cx, cy), &crate::overlay::POSE_COLOR);
    }

    #[test]
    fn detect_replaces_stale_detections() {
        let mut part = PartModel::new("torso");
        train_on(&mut part, RED);
        let frame = blob_scene(120, 120, &[Blob::new((60.0, 60.0), 25.0, 0.0, RED)]);
        part.detect(&frame).unwrap();
        assert_eq!(part.detections().len(), 1);

        let empty = blob_scene(120, 120, &[]);
        part.detect(&empty).unwrap();
        assert!(part.detections().is_empty());
    }

    #[test]
    fn shape_teaching_gates_later_detections() {
        let mut part = PartModel::new("torso");
        train_on(&mut part, RED);
        let frame = blob_scene(160, 120, &[Blob::new((50.0, 60.0), 25.0, 0.0, RED)]);
        assert!(part.teach_shape(&frame, 50, 60));
        assert!(part.shape().reference().is_some());

        // clicking background clears the reference again
        assert!(!part.teach_shape(&frame, 150, 10));
        assert!(part.shape().reference().is_none());
    }

    #[test]
    fn reset_color_keeps_taught_state() {
        let mut part = PartModel::new("torso");
        train_on(&mut part, RED);
        part.add_taught_pose([0.5, 0.1, 0.2]);
        part.reset_color();
        assert_eq!(part.color().sample_count(), 0);
        assert_eq!(part.taught_poses().len(), 1);
    }

    #[test]
    fn data_round_trip_preserves_the_part() {
        let mut part = PartModel::new("torso");
        train_on(&mut part, RED);
        part.add_taught_pose([0.5, -0.25, 0.125]);
        part.set_parameter("open", 3).unwrap();

        let restored = PartModel::from_data("torso", part.to_data()).unwrap();
        assert_eq!(restored.color().sample_count(), part.color().sample_count());
        assert!(restored.color().is_trained());
        assert_eq!(restored.taught_poses(), part.taught_poses());
        assert_eq!(restored.params(), part.params());
    }
}
