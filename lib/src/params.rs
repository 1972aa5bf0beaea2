use crate::error::{Result, SamplingError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEED: u64 = 0x5EED_CAFE_F00D_D00D;

/// Tuning knobs shared by every strategy.
///
/// Deserializes with defaults for missing keys, so a params file only needs to name
/// what it overrides.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Minimum importance for a candidate; the collector keeps anything above half of it.
    pub importance_threshold: f32,

    pub contrast_weight: f32,

    pub saturation_weight: f32,

    /// Distance of the neighbor ring used for local contrast.
    pub edge_radius: u32,

    /// Fraction of the target drawn from the high-importance tier (hybrid).
    pub important_sampling_ratio: f32,

    /// Fraction of the target placed in the top half of the image.
    pub top_bottom_ratio: f32,

    pub apply_anti_clustering: bool,

    pub seed: u64,

    /// Pixels with alpha below this are treated as transparent.
    pub alpha_threshold: f32,

    /// Lower alpha bar used by the fallback passes.
    pub weak_alpha_threshold: f32,

    /// Distance under which two samples count as neighbors in the clustering check.
    /// Derived from sample density when unset.
    pub clustering_distance: Option<f32>,

    /// Number of horizontal bands used by stratified resampling.
    pub band_count: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            importance_threshold: 0.3,
            contrast_weight: 1.0,
            saturation_weight: 0.6,
            edge_radius: 1,
            important_sampling_ratio: 0.6,
            top_bottom_ratio: 0.5,
            apply_anti_clustering: true,
            seed: DEFAULT_SEED,
            alpha_threshold: 0.1,
            weak_alpha_threshold: 0.01,
            clustering_distance: None,
            band_count: 16,
        }
    }
}

impl SamplingParams {
    pub fn with_seed(self, seed: u64) -> Self {
        SamplingParams { seed, ..self }
    }

    pub fn with_threshold(self, importance_threshold: f32) -> Self {
        SamplingParams {
            importance_threshold,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("top_bottom_ratio", self.top_bottom_ratio)?;
        check_unit("important_sampling_ratio", self.important_sampling_ratio)?;
        check_unit("alpha_threshold", self.alpha_threshold)?;
        check_unit("weak_alpha_threshold", self.weak_alpha_threshold)?;
        check_non_negative("importance_threshold", self.importance_threshold)?;

        if self.weak_alpha_threshold > self.alpha_threshold {
            return Err(invalid(format!(
                "weak_alpha_threshold {} exceeds alpha_threshold {}",
                self.weak_alpha_threshold, self.alpha_threshold
            )));
        }

        check_non_negative("contrast_weight", self.contrast_weight)?;
        check_non_negative("saturation_weight", self.saturation_weight)?;

        if let Some(distance) = self.clustering_distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(invalid(format!(
                    "clustering_distance must be positive, got {distance}"
                )));
            }
        }

        if self.edge_radius == 0 {
            return Err(invalid("edge_radius must be at least 1".into()));
        }

        if self.band_count == 0 {
            return Err(invalid("band_count must be at least 1".into()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> SamplingError {
    SamplingError::InvalidParameters(message)
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must lie in [0, 1], got {value}")));
    }

    Ok(())
}

fn check_non_negative(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!(
            "{name} must be finite and non-negative, got {value}"
        )));
    }

    Ok(())
}
