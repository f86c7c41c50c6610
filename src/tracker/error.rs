use thiserror::Error;

use crate::tracker::matching::AssignmentError;

/// Errors returned by [`BYTETracker`](crate::tracker::BYTETracker).
///
/// Whenever `update` fails the tracker is left exactly as it was before the
/// call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("assignment failed: {0}")]
    Assignment(#[from] AssignmentError),

    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("detection {index} has a non-finite box or score")]
    InvalidDetection { index: usize },
}
