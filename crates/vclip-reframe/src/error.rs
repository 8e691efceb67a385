//! Error types for the reframing engine.

use thiserror::Error;
use vclip_models::FrameIndex;

/// Result type for engine operations.
pub type ReframeResult<T> = Result<T, ReframeError>;

/// Errors that abort a reframing job.
///
/// Brief detection dropouts and empty frames are not errors; they are
/// absorbed by the hold-last-state policies of the resolver and stabilizer.
#[derive(Debug, Error)]
pub enum ReframeError {
    /// Detector feed violates the frame contract (gaps, duplicates, disorder).
    #[error("Malformed detection input: {message}")]
    MalformedInput { message: String },

    /// Mode selection produced an empty, inverted or non-partitioning segment.
    #[error("Degenerate segment [{start}, {end})")]
    DegenerateSegment { start: FrameIndex, end: FrameIndex },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pull-mode detector reported a failure.
    #[error("Detector failed: {0}")]
    Detector(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReframeError {
    /// Create a malformed input error.
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a degenerate segment error.
    pub fn degenerate_segment(start: FrameIndex, end: FrameIndex) -> Self {
        Self::DegenerateSegment { start, end }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a detector failure error.
    pub fn detector(message: impl Into<String>) -> Self {
        Self::Detector(message.into())
    }

    /// Stable identifier for the calling pipeline.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "MALFORMED_INPUT",
            Self::DegenerateSegment { .. } => "DEGENERATE_SEGMENT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Detector(_) => "DETECTOR_FAILED",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Every engine error ends the job; the engine never retries.
    pub fn is_fatal(&self) -> bool {
        true
    }
}
