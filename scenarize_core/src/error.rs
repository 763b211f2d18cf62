// scenarize_core/src/error.rs

use thiserror::Error;

/// Fatal error conditions of the conversion pipeline.
///
/// Recoverable per-unit conditions (an off-road goal position, a track that is
/// too short, a scenario that ends up without obstacles) are not errors; they
/// are skip paths that the pipeline counts and moves past.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no static scene registered for location `{0}`")]
    UnknownLocation(String),

    #[error("malformed window: {0}")]
    MalformedWindow(String),

    #[error("malformed recording `{0}`: {1}")]
    MalformedRecording(String, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
