//! Diagnostic overlay rendering.
//!
//! All drawing is value-semantics on plain `RgbImage` buffers; nothing here
//! feeds back into detection. Colors follow the usual debugging palette:
//! green contours, blue hulls, red pose markers, yellow match rings.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::contour::Contour;
use crate::shape::PoseFeature;

pub const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const HULL_COLOR: Rgb<u8> = Rgb([80, 80, 255]);
pub const POSE_COLOR: Rgb<u8> = Rgb([255, 60, 60]);
pub const MATCH_COLOR: Rgb<u8> = Rgb([255, 220, 0]);

/// Lift a binary mask to an RGB canvas for annotation.
pub fn mask_to_rgb(mask: &image::GrayImage) -> RgbImage {
    let mut out = RgbImage::new(mask.width(), mask.height());
    for (src, dst) in mask.pixels().zip(out.pixels_mut()) {
        let v = src[0];
        *dst = Rgb([v, v, v]);
    }
    out
}

/// Draw a closed polygon outline.
pub fn draw_contour(canvas: &mut RgbImage, contour: &Contour, color: Rgb<u8>) {
    if contour.len() < 2 {
        return;
    }
    for i in 0..contour.len() {
        let a = contour[i];
        let b = contour[(i + 1) % contour.len()];
        draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}

/// Draw one detection: contour, hull, centroid cross and orientation ray.
pub fn draw_pose(canvas: &mut RgbImage, pose: &PoseFeature) {
    draw_contour(canvas, &pose.contour, CONTOUR_COLOR);
    draw_contour(canvas, &pose.hull, HULL_COLOR);

    let cx = pose.centroid.x;
    let cy = pose.centroid.y;
    draw_cross_mut(canvas, POSE_COLOR, cx.round() as i32, cy.round() as i32);
    let tip = (
        (cx + pose.size * pose.orientation.cos()) as f32,
        (cy + pose.size * pose.orientation.sin()) as f32,
    );
    draw_line_segment_mut(canvas, (cx as f32, cy as f32), tip, POSE_COLOR);
}

/// Ring a detection that matched a taught pose.
pub fn draw_match_marker(canvas: &mut RgbImage, pose: &PoseFeature) {
    draw_hollow_circle_mut(
        canvas,
        (pose.centroid.x.round() as i32, pose.centroid.y.round() as i32),
        pose.size.round().max(1.0) as i32,
        MATCH_COLOR,
    );
}
