//! Detector plus tracker, one call per frame.

use thiserror::Error;
use tracing::trace;

use crate::tracker::{BYTETracker, Detection, STrack, TrackerConfig, TrackerError};

use super::{DetectionSource, ObjectDetection};

/// Failure of one pipeline step.
#[derive(Error, Debug)]
pub enum PipelineError<E: std::error::Error + 'static> {
    #[error("detection failed: {0}")]
    Detector(#[source] E),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Runs a [`DetectionSource`] and feeds its boxes to a [`BYTETracker`].
///
/// With a class filter set, boxes of any other class are dropped before
/// association.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: BYTETracker,
    class_filter: Option<u32>,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        Self {
            detector,
            tracker: BYTETracker::new(config),
            class_filter: None,
        }
    }

    /// Like [`TrackerPipeline::new`], but rejects an invalid configuration.
    pub fn try_new(detector: D, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            detector,
            tracker: BYTETracker::try_new(config)?,
            class_filter: None,
        })
    }

    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, TrackerConfig::default())
    }

    /// Track only objects of `class_id`.
    pub fn with_class_filter(mut self, class_id: u32) -> Self {
        self.class_filter = Some(class_id);
        self
    }

    pub fn class_filter(&self) -> Option<u32> {
        self.class_filter
    }

    /// Detects on `input` (a `width` x `height` frame) and advances the
    /// tracker by one frame. A detector failure leaves the tracker untouched.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<STrack>, PipelineError<D::Error>> {
        let objects = self
            .detector
            .detect(input, width, height)
            .map_err(PipelineError::Detector)?;

        let detections: Vec<Detection> = objects
            .iter()
            .filter(|o| self.class_filter.is_none_or(|class_id| o.class_id == class_id))
            .map(ObjectDetection::to_detection)
            .collect();
        trace!(
            detected = objects.len(),
            kept = detections.len(),
            "detections filtered"
        );

        Ok(self.tracker.update(&detections)?)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &BYTETracker {
        &self.tracker
    }

    /// Direct access, e.g. for [`BYTETracker::purge_removed`].
    pub fn tracker_mut(&mut self) -> &mut BYTETracker {
        &mut self.tracker
    }
}
