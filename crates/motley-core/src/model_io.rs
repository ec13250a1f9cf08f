//! JSON persistence for trained models.
//!
//! The on-disk model is a map from part name to [`PartData`]. Statistics are
//! never stored; they are recomputed from the samples on load, so the file
//! format stays independent of how the statistics are summarized.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::invariant::InvariantPose;
use crate::params::MorphParams;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors from model file IO.
#[derive(Debug)]
pub enum ModelIoError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ModelIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "model file io: {}", err),
            Self::Json(err) => write!(f, "model file format: {}", err),
        }
    }
}

impl std::error::Error for ModelIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ModelIoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ModelIoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

// ── Format ─────────────────────────────────────────────────────────────────

/// Persistent state of one part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartData {
    /// Clicked HSV samples, verbatim.
    pub samples: Vec<Vec<f64>>,
    /// Taught reference contour vertices as `[x, y]`.
    #[serde(default)]
    pub reference_contour: Option<Vec<[i32; 2]>>,
    /// Taught invariant poses.
    #[serde(default)]
    pub taught_poses: Vec<InvariantPose>,
    /// Per-part tunables at save time.
    #[serde(default)]
    pub params: MorphParams,
}

/// Whole-model file contents, keyed by part name.
pub type ModelData = BTreeMap<String, PartData>;

/// Read a model file.
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelData, ModelIoError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write a model file, pretty-printed for diffability.
pub fn save_model(path: impl AsRef<Path>, data: &ModelData) -> Result<(), ModelIoError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> ModelData {
        let mut data = ModelData::new();
        data.insert(
            "torso".into(),
            PartData {
                samples: vec![vec![60.0, 200.0, 200.0], vec![61.0, 199.0, 201.0]],
                reference_contour: Some(vec![[0, 0], [10, 0], [10, 10]]),
                taught_poses: vec![[0.5, -0.25, 0.125]],
                params: MorphParams::default(),
            },
        );
        data
    }

    #[test]
    fn model_file_round_trip() {
        let dir = std::env::temp_dir().join("motley-model-io-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");

        let data = sample_data();
        save_model(&path, &data).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        let part = &loaded["torso"];
        assert_eq!(part.samples, data["torso"].samples);
        assert_eq!(part.reference_contour, data["torso"].reference_contour);
        assert_eq!(part.taught_poses, data["torso"].taught_poses);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"torso": {"samples": [[1.0, 2.0, 3.0]]}}"#;
        let data: ModelData = serde_json::from_str(json).unwrap();
        let part = &data["torso"];
        assert!(part.reference_contour.is_none());
        assert!(part.taught_poses.is_empty());
        assert_eq!(part.params, MorphParams::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_model("/nonexistent/motley/model.json").unwrap_err();
        assert!(matches!(err, ModelIoError::Io(_)));
    }
}
