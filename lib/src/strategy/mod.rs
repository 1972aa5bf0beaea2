//! The interchangeable sampling algorithms.
//!
//! Every strategy validates its request the same way and answers requests for at least
//! as many samples as there are pixels with every pixel, in row-major order.

pub mod adaptive;
pub mod advanced;
pub mod hybrid;
pub mod importance;
pub mod uniform;

use crate::color::Color;
use crate::error::{Result, SamplingError};
use crate::params::SamplingParams;
use crate::sample::Sample;
use crate::source::PixelSource;
use std::fmt;
use std::str::FromStr;

pub use adaptive::AdaptiveSampler;
pub use advanced::{BlueNoiseSampler, HashWeightedSampler, LowDiscrepancySampler, PhasedAdaptiveSampler};
pub use hybrid::HybridSampler;
pub use importance::ImportanceSampler;
pub use uniform::UniformSampler;

/// Turns an image into at most `target_count` unique samples.
pub trait SamplingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn sample(
        &self,
        width: u32,
        height: u32,
        target_count: usize,
        params: &SamplingParams,
        source: &dyn PixelSource,
        dominant_colors: &[Color],
    ) -> Result<Vec<Sample>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    Uniform,
    Importance,
    Adaptive,
    Hybrid,
    BlueNoise,
    LowDiscrepancy,
    HashWeighted,
    PhasedAdaptive,
}

impl Strategy {
    pub fn all() -> [Strategy; 8] {
        [
            Strategy::Uniform,
            Strategy::Importance,
            Strategy::Adaptive,
            Strategy::Hybrid,
            Strategy::BlueNoise,
            Strategy::LowDiscrepancy,
            Strategy::HashWeighted,
            Strategy::PhasedAdaptive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Uniform => "uniform",
            Strategy::Importance => "importance",
            Strategy::Adaptive => "adaptive",
            Strategy::Hybrid => "hybrid",
            Strategy::BlueNoise => "blue-noise",
            Strategy::LowDiscrepancy => "low-discrepancy",
            Strategy::HashWeighted => "hash-weighted",
            Strategy::PhasedAdaptive => "phased-adaptive",
        }
    }

    pub fn sampler(&self) -> Box<dyn SamplingStrategy> {
        match self {
            Strategy::Uniform => Box::new(UniformSampler::default()),
            Strategy::Importance => Box::new(ImportanceSampler),
            Strategy::Adaptive => Box::new(AdaptiveSampler),
            Strategy::Hybrid => Box::new(HybridSampler),
            Strategy::BlueNoise => Box::new(BlueNoiseSampler),
            Strategy::LowDiscrepancy => Box::new(LowDiscrepancySampler),
            Strategy::HashWeighted => Box::new(HashWeightedSampler),
            Strategy::PhasedAdaptive => Box::new(PhasedAdaptiveSampler),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = SamplingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Strategy::all()
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| SamplingError::InvalidParameters(format!("unknown strategy `{s}`")))
    }
}

/// Checks a request and short-circuits the every-pixel case.
///
/// Returns `Some(samples)` when `target_count` covers the whole image.
pub(crate) fn prepare(
    width: u32,
    height: u32,
    target_count: usize,
    params: &SamplingParams,
    source: &dyn PixelSource,
) -> Result<Option<Vec<Sample>>> {
    if width == 0 || height == 0 || width > source.width() || height > source.height() {
        return Err(SamplingError::InvalidDimensions { width, height });
    }

    let total = width as usize * height as usize;

    if target_count == 0 {
        return Err(SamplingError::InvalidTargetCount {
            requested: target_count,
            total,
        });
    }

    params.validate()?;

    if target_count >= total {
        return Ok(Some(uniform::all_pixels(width, height, source)));
    }

    Ok(None)
}

/// Surfaces an empty result as an error.
pub(crate) fn finish(strategy: &'static str, samples: Vec<Sample>) -> Result<Vec<Sample>> {
    if samples.is_empty() {
        return Err(SamplingError::EmptyResult { strategy });
    }

    log::info!("{strategy} sampling produced {} samples", samples.len());
    Ok(samples)
}
