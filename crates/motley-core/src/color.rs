//! Incrementally trained per-pixel Gaussian color statistics.
//!
//! The operator clicks pixels belonging to a part; each click appends an HSV
//! sample. Statistics are recomputed in full from the sample set (the set is
//! small, so recomputation is authoritative; there is no running sum). With at
//! least [`MIN_SAMPLES`] samples the model turns a frame into a per-pixel
//! likelihood map under an independent-channel Gaussian, then into a binary
//! part mask via blur, fixed thresholding and disc morphology.
//!
//! Channel 0 is circular (OpenCV-style hue, modulus 180): the difference to
//! the mean is wrapped so that hues on either side of the 0/180 seam are
//! close, not maximally far apart.

use image::{GrayImage, RgbImage};

use crate::colorspace::HUE_RANGE;
use crate::morphology;
use crate::params::MorphParams;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors reported by the color model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorModelError {
    /// A sample's dimensionality differs from the existing sample set.
    DimensionMismatch { expected: usize, got: usize },
    /// Not enough samples to evaluate likelihoods; the model is untrained.
    InsufficientData { needed: usize, got: usize },
}

impl std::fmt::Display for ColorModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "sample dimension mismatch: expected {}, got {}", expected, got)
            }
            Self::InsufficientData { needed, got } => {
                write!(f, "insufficient samples: need {}, got {}", needed, got)
            }
        }
    }
}

impl std::error::Error for ColorModelError {}

// ── Model ──────────────────────────────────────────────────────────────────

/// Minimum number of samples before likelihood evaluation is enabled.
pub const MIN_SAMPLES: usize = 10;

/// Floor on the per-channel standard deviation. A channel whose clicked
/// samples are all identical would otherwise produce a zero-width Gaussian.
const SIGMA_FLOOR: f64 = 1e-3;

/// Per-pixel Gaussian color model over an append-only sample set.
///
/// `mean`/`stddev` are `None` until [`ColorModel::recompute_statistics`] has
/// run at least once on a non-empty set.
#[derive(Debug, Clone, Default)]
pub struct ColorModel {
    samples: Vec<Vec<f64>>,
    mean: Option<Vec<f64>>,
    stddev: Option<Vec<f64>>,
}

impl ColorModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from previously stored samples and recompute statistics.
    ///
    /// Fails with `DimensionMismatch` if the stored samples disagree on
    /// dimensionality.
    pub fn from_samples(samples: Vec<Vec<f64>>) -> Result<Self, ColorModelError> {
        let mut model = Self::new();
        for sample in &samples {
            model.add_sample(sample)?;
        }
        model.recompute_statistics();
        Ok(model)
    }

    /// Append one sample vector.
    ///
    /// Fails with `DimensionMismatch` when the set is non-empty and the new
    /// vector's length differs; the sample set is left unmodified in that
    /// case. Statistics are not refreshed here; call
    /// [`recompute_statistics`](Self::recompute_statistics).
    pub fn add_sample(&mut self, sample: &[f64]) -> Result<(), ColorModelError> {
        if let Some(first) = self.samples.first() {
            if first.len() != sample.len() {
                return Err(ColorModelError::DimensionMismatch {
                    expected: first.len(),
                    got: sample.len(),
                });
            }
        }
        self.samples.push(sample.to_vec());
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    pub fn stddev(&self) -> Option<&[f64]> {
        self.stddev.as_deref()
    }

    /// Whether enough samples exist and statistics are current enough for
    /// likelihood evaluation.
    pub fn is_trained(&self) -> bool {
        self.samples.len() >= MIN_SAMPLES && self.mean.is_some()
    }

    /// Drop all samples and statistics, returning the model to untrained.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.mean = None;
        self.stddev = None;
    }

    /// Recompute per-dimension mean and population standard deviation from
    /// the full sample set. No-op on an empty set (state stays undefined).
    pub fn recompute_statistics(&mut self) {
        if self.samples.is_empty() {
            return;
        }
        let dim = self.samples[0].len();
        let n = self.samples.len() as f64;

        let mut mean = vec![0.0; dim];
        for sample in &self.samples {
            for (m, v) in mean.iter_mut().zip(sample) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = vec![0.0; dim];
        for sample in &self.samples {
            for d in 0..dim {
                let diff = sample[d] - mean[d];
                var[d] += diff * diff;
            }
        }
        let stddev = var.into_iter().map(|v| (v / n).sqrt()).collect();

        self.mean = Some(mean);
        self.stddev = Some(stddev);
    }

    /// Gaussian likelihood of a single sample under the current statistics,
    /// before sensitivity scaling. Channel 0 uses the wrapped hue difference.
    pub fn likelihood(&self, sample: &[f64]) -> Result<f64, ColorModelError> {
        let (mean, stddev) = self.trained_stats()?;
        if sample.len() != mean.len() {
            return Err(ColorModelError::DimensionMismatch {
                expected: mean.len(),
                got: sample.len(),
            });
        }
        let mut l = 1.0;
        for d in 0..mean.len() {
            let sd = stddev[d].max(SIGMA_FLOOR);
            let diff = if d == 0 {
                hue_wrapped_diff(sample[d], mean[d])
            } else {
                sample[d] - mean[d]
            };
            let z = diff / sd;
            l *= (-0.5 * z * z).exp() / (sd * (2.0 * std::f64::consts::PI).sqrt());
        }
        Ok(l)
    }

    /// Per-pixel likelihood map over an HSV-encoded frame.
    ///
    /// The raw likelihood is scaled by `10^(4 + threshold/5)` and clamped to
    /// u8; raising `threshold` lowers the effective probability bar, trading
    /// sensitivity for false positives. Fails with `InsufficientData` while
    /// fewer than [`MIN_SAMPLES`] samples exist; callers treat that as
    /// "no mask", not as a frame-aborting error.
    pub fn likelihood_map(
        &self,
        hsv: &RgbImage,
        threshold: i32,
    ) -> Result<GrayImage, ColorModelError> {
        let (mean, stddev) = self.trained_stats()?;
        if mean.len() != 3 {
            return Err(ColorModelError::DimensionMismatch {
                expected: 3,
                got: mean.len(),
            });
        }

        let scale = 10f64.powf(4.0 + threshold as f64 / 5.0);
        let sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt();
        let sd: Vec<f64> = stddev.iter().map(|s| s.max(SIGMA_FLOOR)).collect();
        let coef = 1.0 / (sd[0] * sd[1] * sd[2] * sqrt_2pi.powi(3));

        let mut out = GrayImage::new(hsv.width(), hsv.height());
        for (px, dst) in hsv.pixels().zip(out.pixels_mut()) {
            let dh = hue_wrapped_diff(px[0] as f64, mean[0]) / sd[0];
            let ds = (px[1] as f64 - mean[1]) / sd[1];
            let dv = (px[2] as f64 - mean[2]) / sd[2];
            let l = coef * (-0.5 * (dh * dh + ds * ds + dv * dv)).exp();
            dst[0] = (l * scale).min(255.0) as u8;
        }
        Ok(out)
    }

    /// Binarized part mask: likelihood map → Gaussian blur (kernel
    /// `2·blur+1`) → fixed threshold at mid-range → disc opening
    /// (`2·open+1`) → disc closing (`2·close+1`).
    ///
    /// Returns `None` while the model is untrained.
    pub fn binarize(&self, hsv: &RgbImage, params: &MorphParams) -> Option<GrayImage> {
        let map = match self.likelihood_map(hsv, params.threshold) {
            Ok(map) => map,
            Err(ColorModelError::InsufficientData { .. }) => return None,
            Err(err) => {
                tracing::warn!(%err, "likelihood map failed");
                return None;
            }
        };
        let blurred = if params.blur > 0 {
            morphology::blur_gray(&map, morphology::sigma_for_kernel(2 * params.blur + 1))
        } else {
            map
        };
        let mask = morphology::threshold_binary(&blurred, 127);
        let opened = morphology::open_disc(&mask, params.open);
        Some(morphology::close_disc(&opened, params.close))
    }

    fn trained_stats(&self) -> Result<(&[f64], &[f64]), ColorModelError> {
        if self.samples.len() < MIN_SAMPLES {
            return Err(ColorModelError::InsufficientData {
                needed: MIN_SAMPLES,
                got: self.samples.len(),
            });
        }
        match (&self.mean, &self.stddev) {
            (Some(mean), Some(stddev)) => Ok((mean, stddev)),
            _ => Err(ColorModelError::InsufficientData {
                needed: MIN_SAMPLES,
                got: 0,
            }),
        }
    }
}

/// Wrap-aware difference on the circular hue axis:
/// `((a − b + 90) mod 180) − 90`, in `(-90, 90]`.
pub fn hue_wrapped_diff(a: f64, b: f64) -> f64 {
    let half = HUE_RANGE / 2.0;
    (a - b + half).rem_euclid(HUE_RANGE) - half
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn trained_model(center: [f64; 3]) -> ColorModel {
        let mut model = ColorModel::new();
        // deterministic jitter around the center
        let offsets = [-3.0, -2.0, -1.5, -1.0, -0.5, 0.5, 1.0, 1.5, 2.0, 3.0];
        for (i, off) in offsets.iter().enumerate() {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            model
                .add_sample(&[center[0] + off, center[1] + sign * off, center[2] + off * 0.5])
                .unwrap();
        }
        model.recompute_statistics();
        model
    }

    #[test]
    fn hue_wrap_is_short_way_around() {
        // 1 and 179 are 2 apart on the circle, not 178
        assert_eq!(hue_wrapped_diff(1.0, 179.0).abs(), 2.0);
        assert_eq!(hue_wrapped_diff(179.0, 1.0).abs(), 2.0);
        // far from the seam the wrapped difference is the linear one
        assert_eq!(hue_wrapped_diff(60.0, 90.0), -30.0);
        assert_eq!(hue_wrapped_diff(90.0, 60.0), 30.0);
    }

    #[test]
    fn mismatched_sample_rejected_and_set_unchanged() {
        let mut model = ColorModel::new();
        model.add_sample(&[1.0, 2.0, 3.0]).unwrap();
        let err = model.add_sample(&[1.0, 2.0]).unwrap_err();
        assert_eq!(err, ColorModelError::DimensionMismatch { expected: 3, got: 2 });
        assert_eq!(model.sample_count(), 1);
    }

    #[test]
    fn statistics_match_hand_computation() {
        let mut model = ColorModel::new();
        model.add_sample(&[0.0, 10.0]).unwrap();
        model.add_sample(&[4.0, 10.0]).unwrap();
        model.recompute_statistics();
        assert_eq!(model.mean().unwrap(), &[2.0, 10.0]);
        // population std-dev: sqrt(((0-2)^2 + (4-2)^2)/2) = 2
        assert_eq!(model.stddev().unwrap(), &[2.0, 0.0]);
    }

    #[test]
    fn untrained_model_reports_insufficient_data() {
        let mut model = ColorModel::new();
        for i in 0..(MIN_SAMPLES - 1) {
            model.add_sample(&[i as f64, 0.0, 0.0]).unwrap();
        }
        model.recompute_statistics();
        let hsv = RgbImage::new(4, 4);
        match model.likelihood_map(&hsv, 30) {
            Err(ColorModelError::InsufficientData { needed, got }) => {
                assert_eq!(needed, MIN_SAMPLES);
                assert_eq!(got, MIN_SAMPLES - 1);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        assert!(model.binarize(&hsv, &MorphParams::default()).is_none());
    }

    #[test]
    fn likelihood_falls_off_monotonically_from_mean() {
        let model = trained_model([90.0, 128.0, 128.0]);
        let mean = model.mean().unwrap().to_vec();
        let sd = model.stddev().unwrap().to_vec();

        let at_mean = model.likelihood(&mean).unwrap();
        for d in 0..3 {
            let mut shifted = mean.clone();
            shifted[d] += sd[d].max(1.0);
            let away = model.likelihood(&shifted).unwrap();
            assert!(
                at_mean >= away,
                "likelihood at mean {} should dominate one-sigma shift {} on dim {}",
                at_mean,
                away,
                d
            );
        }
    }

    #[test]
    fn likelihood_map_peaks_on_model_color() {
        let model = trained_model([60.0, 200.0, 200.0]);
        let mut hsv = RgbImage::new(2, 1);
        hsv.put_pixel(0, 0, Rgb([60, 200, 200]));
        hsv.put_pixel(1, 0, Rgb([120, 50, 50]));
        let map = model.likelihood_map(&hsv, 30).unwrap();
        assert!(map.get_pixel(0, 0)[0] > map.get_pixel(1, 0)[0]);
        assert_eq!(map.get_pixel(1, 0)[0], 0, "off-color pixel should be dark");
    }

    #[test]
    fn likelihood_map_respects_hue_wrap() {
        // model trained close to the hue seam
        let model = trained_model([2.0, 200.0, 200.0]);
        let mut hsv = RgbImage::new(2, 1);
        hsv.put_pixel(0, 0, Rgb([178, 200, 200])); // circularly near
        hsv.put_pixel(1, 0, Rgb([90, 200, 200])); // circularly far
        let map = model.likelihood_map(&hsv, 30).unwrap();
        assert!(
            map.get_pixel(0, 0)[0] > map.get_pixel(1, 0)[0],
            "hue across the seam must outscore a mid-range hue"
        );
    }

    #[test]
    fn higher_threshold_never_darkens_the_map() {
        let model = trained_model([60.0, 200.0, 200.0]);
        let mut hsv = RgbImage::new(1, 1);
        hsv.put_pixel(0, 0, Rgb([64, 196, 204]));
        let low = model.likelihood_map(&hsv, 10).unwrap();
        let high = model.likelihood_map(&hsv, 40).unwrap();
        assert!(high.get_pixel(0, 0)[0] >= low.get_pixel(0, 0)[0]);
    }
}
