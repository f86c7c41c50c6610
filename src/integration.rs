//! Integration module for connecting object detection backends with ByteTrack.
//!
//! A detector implements [`DetectionSource`]; [`TrackerPipeline`] runs it,
//! keeps the class of interest and feeds the boxes to the tracker.
//! [`track_color`] gives each track id a stable display color.

mod builder;
mod detector;
mod palette;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections, Keypoint, ObjectDetection};
pub use palette::track_color;
pub use pipeline::{PipelineError, TrackerPipeline};
