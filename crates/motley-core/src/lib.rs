//! motley-core — recognition of compound colored objects ("costumes").
//!
//! A costume is a set of named parts, each with a distinctive color and
//! silhouette. The pipeline stages are:
//!
//! 1. **Colorspace** – RGB frames to OpenCV-convention HSV (hue modulus 180).
//! 2. **Color** – per-part Gaussian color statistics from clicked samples,
//!    per-pixel likelihood maps, binarization via blur/threshold/morphology.
//! 3. **Contour** – region extraction with an area floor, polygon moments,
//!    Hu invariants, minimal enclosing circles, convexity defects.
//! 4. **Shape** – taught reference silhouettes and shape-similarity
//!    filtering; pose features (centroid, orientation, size) per contour.
//! 5. **Invariant** – anchor-pair similarity frames and the invariant pose
//!    representation that survives translation, rotation and scaling.
//! 6. **Composite** – whole-object orchestration: per-frame detection,
//!    click-to-teach, pose matching, overlay rendering.

pub mod color;
pub mod colorspace;
pub mod composite;
pub mod contour;
pub mod invariant;
pub mod model_io;
pub mod morphology;
pub mod overlay;
pub mod params;
pub mod part;
pub mod shape;

#[cfg(test)]
pub(crate) mod test_utils;

pub use color::{ColorModel, ColorModelError, MIN_SAMPLES};
pub use colorspace::{rgb_to_hsv, HUE_RANGE};
pub use composite::{
    CompositeConfig, CompositeError, CompositeObject, FrameResult, PartMatch,
    DEFAULT_MATCH_TOLERANCE,
};
pub use invariant::{poses_match, AnchorFrame, InvariantPose};
pub use model_io::{load_model, save_model, ModelData, ModelIoError, PartData};
pub use params::{MorphParams, ParamError};
pub use part::PartModel;
pub use shape::{extract_pose_features, PoseFeature, ShapeMemory};
