//! ByteTrack multi-object tracking core.
//!
//! Detections are associated to tracks in two passes: high-score boxes
//! first, then low-score boxes against tracks the first pass left over, so
//! briefly occluded objects keep their identity.

mod arena;
mod byte_tracker;
mod error;
mod kalman_filter;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use arena::{TrackArena, TrackHandle};
pub use byte_tracker::{
    BYTETracker, DUPLICATE_IOU_DISTANCE, FilterFault, SECOND_MATCH_THRESH, TrackerConfig,
    UNCONFIRMED_MATCH_THRESH,
};
pub use error::TrackerError;
pub use kalman_filter::{CHI2INV95, FilterError, KalmanFilter};
pub use matching::{AssignmentError, AssignmentResult, Detection, iou_distance, linear_assignment};
pub use rect::{Rect, iou_batch};
pub use strack::{STrack, TrackIdGenerator};
pub use track_state::TrackState;
