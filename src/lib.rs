//! Multi-object tracking with ByteTrack.
//!
//! Feed per-frame detections to a [`BYTETracker`] and get back the tracks
//! confirmed so far, each with a stable id.
//!
//! ```
//! use bytetrack_core::{BYTETracker, Detection, TrackerConfig};
//!
//! let mut tracker = BYTETracker::new(TrackerConfig::default());
//! let tracks = tracker.update(&[Detection::new(10.0, 10.0, 20.0, 20.0, 0.9)])?;
//! assert!(tracks.is_empty());
//!
//! let tracks = tracker.update(&[Detection::new(11.0, 11.0, 20.0, 20.0, 0.9)])?;
//! assert_eq!(tracks[0].track_id, 1);
//! # Ok::<(), bytetrack_core::TrackerError>(())
//! ```

pub mod integration;
pub mod tracker;

pub use integration::{
    DetectionBuilder, DetectionSource, Keypoint, ObjectDetection, PipelineError, TrackerPipeline,
    track_color,
};
pub use tracker::{BYTETracker, Detection, Rect, STrack, TrackState, TrackerConfig, TrackerError};
