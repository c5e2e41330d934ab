use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{DocflatError, Result};

/// Why a run halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    NoDocumentDetected,
    NoContentRegion,
    /// The segmentation oracle itself errored
    SegmenterError(String),
}

impl FailureReason {
    /// The halting reason for a fatal stage error, if it is one a stage can raise.
    pub fn from_error(err: &DocflatError) -> Option<Self> {
        match err {
            DocflatError::NoDocumentDetected => Some(Self::NoDocumentDetected),
            DocflatError::NoContentRegion => Some(Self::NoContentRegion),
            _ => None,
        }
    }

    /// The halting reason for any error returned by the segmentation oracle.
    pub fn from_segmenter_error(err: &DocflatError) -> Self {
        match err {
            DocflatError::NoDocumentDetected => Self::NoDocumentDetected,
            _ => Self::SegmenterError(err.to_string()),
        }
    }
}

/// Stage outcome fed to [`PipelineState::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Succeeded,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    Extracting,
    Rectifying,
    Normalizing,
    Done,
    Failed(FailureReason),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Next state for `transition`. Normalization cannot fail, and only
    /// extraction can report a missing document or a segmenter error.
    pub fn advance(&self, transition: Transition) -> Result<Self> {
        use FailureReason::*;

        let next = match (self, transition) {
            (Self::Extracting, Transition::Succeeded) => Self::Rectifying,
            (Self::Rectifying, Transition::Succeeded) => Self::Normalizing,
            (Self::Normalizing, Transition::Succeeded) => Self::Done,
            (Self::Extracting, Transition::Failed(reason @ (NoDocumentDetected | SegmenterError(_)))) => {
                Self::Failed(reason)
            }
            (Self::Rectifying, Transition::Failed(reason @ NoContentRegion)) => Self::Failed(reason),
            _ => {
                return Err(DocflatError::InvalidTransition {
                    from: self.to_string(),
                });
            }
        };
        Ok(next)
    }
}
