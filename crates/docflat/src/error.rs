use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors. Any of these halts the pipeline and no output file is written.
#[derive(Error, Debug)]
pub enum DocflatError {
    #[error("No document detected in image")]
    NoDocumentDetected,

    #[error("Rectification failed: no content region")]
    NoContentRegion,

    #[error("Could not read image at {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("File type not allowed: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Input {path} is {size} bytes, limit is {limit}")]
    InputTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid mask: {0}")]
    InvalidMask(String),

    #[error("Invalid pipeline transition from {from}")]
    InvalidTransition { from: String },

    #[error("Failed to encode image: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unsupported config format. Please use .toml or .json files")]
    UnsupportedConfigFormat,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DocflatError>;

/// Errors a super-resolution oracle can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuperResolutionError {
    #[error("super-resolution unavailable: {0}")]
    Unavailable(String),

    #[error("super-resolution failed: {0}")]
    Failed(String),

    #[error("super-resolution returned {actual:?}, expected {expected:?}")]
    InvalidOutput {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Non-fatal problems. The pipeline records these and carries on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftFailure {
    #[error("rectification numeric failure: {reason}")]
    RectificationNumericFailure { reason: String },

    #[error("super-resolution unavailable: {reason}")]
    SuperResolutionUnavailable { reason: String },

    #[error("super-resolution failed: {reason}")]
    SuperResolutionFailed { reason: String },

    #[error("super-resolution returned {actual:?}, expected {expected:?}")]
    SuperResolutionInvalidOutput {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl From<SuperResolutionError> for SoftFailure {
    fn from(err: SuperResolutionError) -> Self {
        match err {
            SuperResolutionError::Unavailable(reason) => {
                SoftFailure::SuperResolutionUnavailable { reason }
            }
            SuperResolutionError::Failed(reason) => SoftFailure::SuperResolutionFailed { reason },
            SuperResolutionError::InvalidOutput { expected, actual } => {
                SoftFailure::SuperResolutionInvalidOutput { expected, actual }
            }
        }
    }
}
