use thiserror::Error;

/// Errors returned by the sampling entry points.
///
/// Recoverable conditions (too few candidates, uncovered corners, clustering) are
/// repaired internally and never show up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid target count {requested} for an image of {total} pixels")]
    InvalidTargetCount { requested: usize, total: usize },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{strategy} sampling produced no samples")]
    EmptyResult { strategy: &'static str },
}

pub type Result<T> = std::result::Result<T, SamplingError>;
