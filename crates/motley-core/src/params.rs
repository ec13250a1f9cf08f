//! Operator-tunable detection parameters.
//!
//! These are the knobs the UI collaborator exposes as sliders. They may be
//! mutated at any time between frames; they only affect subsequent `detect`
//! calls, never past results.

use std::collections::BTreeMap;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors from name-keyed parameter access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The parameter name is not one of the known tunables.
    UnknownParameter(String),
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownParameter(name) => write!(f, "unknown parameter: {}", name),
        }
    }
}

impl std::error::Error for ParamError {}

// ── Parameters ─────────────────────────────────────────────────────────────

/// Per-part mask cleanup and shape filtering tunables.
///
/// `open`, `close` and `blur` are kernel half-sizes (effective kernel size
/// `2k+1`; zero disables the stage). `threshold` shifts the likelihood
/// sensitivity (see [`crate::color::ColorModel::likelihood_map`]).
/// `contour_threshold` is the shape-distance cutoff in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MorphParams {
    pub open: u32,
    pub close: u32,
    pub blur: u32,
    pub threshold: i32,
    pub contour_threshold: u32,
}

impl Default for MorphParams {
    fn default() -> Self {
        Self {
            open: 2,
            close: 2,
            blur: 2,
            threshold: 30,
            contour_threshold: 15,
        }
    }
}

impl MorphParams {
    /// Set a tunable by its slider name.
    pub fn set(&mut self, name: &str, value: i64) -> Result<(), ParamError> {
        match name {
            "open" => self.open = value.max(0) as u32,
            "close" => self.close = value.max(0) as u32,
            "blur" => self.blur = value.max(0) as u32,
            "threshold" => self.threshold = value as i32,
            "contour_threshold" => self.contour_threshold = value.max(0) as u32,
            _ => return Err(ParamError::UnknownParameter(name.to_string())),
        }
        Ok(())
    }

    /// Read a tunable by name.
    pub fn get(&self, name: &str) -> Result<i64, ParamError> {
        match name {
            "open" => Ok(self.open as i64),
            "close" => Ok(self.close as i64),
            "blur" => Ok(self.blur as i64),
            "threshold" => Ok(self.threshold as i64),
            "contour_threshold" => Ok(self.contour_threshold as i64),
            _ => Err(ParamError::UnknownParameter(name.to_string())),
        }
    }

    /// Snapshot of all tunables, keyed by slider name.
    pub fn as_map(&self) -> BTreeMap<String, i64> {
        ["open", "close", "blur", "threshold", "contour_threshold"]
            .iter()
            .map(|name| (name.to_string(), self.get(name).expect("known name")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let p = MorphParams::default();
        assert_eq!(p.open, 2);
        assert_eq!(p.close, 2);
        assert_eq!(p.blur, 2);
        assert_eq!(p.threshold, 30);
        assert_eq!(p.contour_threshold, 15);
    }

    #[test]
    fn set_get_round_trip() {
        let mut p = MorphParams::default();
        p.set("open", 4).unwrap();
        p.set("threshold", -5).unwrap();
        assert_eq!(p.get("open").unwrap(), 4);
        assert_eq!(p.get("threshold").unwrap(), -5);
        assert_eq!(p.as_map().len(), 5);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let mut p = MorphParams::default();
        assert_eq!(
            p.set("kernel", 1),
            Err(ParamError::UnknownParameter("kernel".into()))
        );
        assert!(p.get("kernel").is_err());
    }

    #[test]
    fn negative_kernel_sizes_clamp_to_zero() {
        let mut p = MorphParams::default();
        p.set("blur", -3).unwrap();
        assert_eq!(p.blur, 0);
    }
}
