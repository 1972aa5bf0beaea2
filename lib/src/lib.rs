//! Picks a small, representative set of colored pixel samples from an image.
//!
//! Every strategy is a synchronous, side-effect free function of its inputs: the same
//! image, parameters and seed always give the same samples.

pub mod artifact;
pub mod balance;
pub mod collect;
pub mod color;
pub mod error;
pub mod palette;
pub mod params;
pub mod sample;
pub mod score;
pub mod source;
pub mod strategy;
#[cfg(feature = "svg")]
pub mod svg;

pub use color::Color;
pub use error::{Result, SamplingError};
pub use params::SamplingParams;
pub use sample::Sample;
pub use source::{PixelBuffer, PixelSource};
pub use strategy::{SamplingStrategy, Strategy};

/// Runs `strategy` over the `width` x `height` region of `source`.
pub fn sample(
    strategy: Strategy,
    width: u32,
    height: u32,
    target_count: usize,
    params: &SamplingParams,
    source: &dyn PixelSource,
    dominant_colors: &[Color],
) -> Result<Vec<Sample>> {
    strategy
        .sampler()
        .sample(width, height, target_count, params, source, dominant_colors)
}
