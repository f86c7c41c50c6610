//! Single object track (STrack) for multi-object tracking.

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::{FilterError, KalmanFilter};
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Monotonic source of track ids.
///
/// Each tracker owns one, so independent trackers (one per camera stream,
/// for instance) hand out independent id sequences starting at 1.
#[derive(Debug, Clone, Default)]
pub struct TrackIdGenerator {
    last: u64,
}

impl TrackIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the next unique track ID.
    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently issued id, 0 if none.
    pub fn last_id(&self) -> u64 {
        self.last
    }
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct STrack {
    /// Unique track identifier, 0 until activated
    pub track_id: u64,
    /// Current track state
    pub state: TrackState,
    /// Whether the track has been re-matched at least once since creation
    pub is_activated: bool,
    /// Confidence of the most recent matched detection
    pub score: f32,
    /// Frame of the most recent successful match
    pub frame_id: u32,
    /// Frame the track was activated in
    pub start_frame: u32,
    /// Consecutive successful matches since (re)activation
    pub tracklet_len: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Option<Array1<f64>>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Box of the detection this track was created from (TLWH)
    pub det_tlwh: Rect,
}

impl STrack {
    /// Create a new, not yet activated STrack from a detection.
    pub fn new(tlwh: Rect, score: f32) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            det_tlwh: tlwh,
        }
    }

    /// Get the current bounding box in TLWH format.
    ///
    /// A `New` track reports its detection box; afterwards the box follows
    /// the filter estimate.
    pub fn tlwh(&self) -> Rect {
        match (&self.mean, self.state) {
            (Some(mean), state) if state != TrackState::New => rect_from_mean(mean),
            _ => self.det_tlwh,
        }
    }

    /// Current bounding box as `[x1, y1, x2, y2]`.
    pub fn tlbr(&self) -> [f32; 4] {
        self.tlwh().to_tlbr()
    }

    pub fn rect(&self) -> Rect {
        self.tlwh()
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    /// Frames between activation and the most recent match.
    pub fn duration(&self) -> u32 {
        self.frame_id.saturating_sub(self.start_frame)
    }

    /// Start a new tracklet with a fresh id.
    ///
    /// The track is `Tracked` but not yet confirmed; it must be matched again
    /// on the next frame to be reported.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u32, track_id: u64) {
        self.track_id = track_id;

        let (mean, covariance) = kalman_filter.initiate(self.det_tlwh.to_xyah_f64());
        self.mean = Some(mean);
        self.covariance = Some(covariance);

        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = false;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Resume a lost track with a matched detection.
    ///
    /// The id is kept unless `new_id` is given. If the filter update fails
    /// the track stays (or becomes) `Lost` and the error is returned.
    pub fn re_activate(
        &mut self,
        new_track: &STrack,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        new_id: Option<u64>,
    ) -> Result<(), FilterError> {
        self.correct(new_track, kalman_filter)?;

        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = new_track.score;

        if let Some(track_id) = new_id {
            self.track_id = track_id;
        }
        Ok(())
    }

    /// Update a matched track with a detection.
    ///
    /// If the filter update fails the track is marked `Lost` and the error is
    /// returned.
    pub fn update(
        &mut self,
        new_track: &STrack,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
    ) -> Result<(), FilterError> {
        self.correct(new_track, kalman_filter)?;

        self.frame_id = frame_id;
        self.tracklet_len += 1;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = new_track.score;
        Ok(())
    }

    fn correct(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter) -> Result<(), FilterError> {
        let result = match (&self.mean, &self.covariance) {
            (Some(mean), Some(cov)) => {
                kalman_filter.update(mean, cov, new_track.det_tlwh.to_xyah_f64())
            }
            _ => Err(FilterError::Uninitialized),
        };

        match result {
            Ok((mean, covariance)) => {
                self.mean = Some(mean);
                self.covariance = Some(covariance);
                Ok(())
            }
            Err(err) => {
                self.mark_lost();
                Err(err)
            }
        }
    }

    /// Filter state one frame ahead, without modifying the track.
    ///
    /// Tracks that are not currently `Tracked` have their height velocity
    /// zeroed first so the box does not keep growing or shrinking while the
    /// object is unseen.
    pub fn predicted_state(&self, kalman_filter: &KalmanFilter) -> Option<(Array1<f64>, Array2<f64>)> {
        let (mean, cov) = (self.mean.as_ref()?, self.covariance.as_ref()?);
        let mut mean_to_predict = mean.clone();
        if self.state != TrackState::Tracked {
            mean_to_predict[7] = 0.0;
        }
        Some(kalman_filter.predict(&mean_to_predict, cov))
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let Some((mean, covariance)) = self.predicted_state(kalman_filter) {
            self.mean = Some(mean);
            self.covariance = Some(covariance);
        }
    }

    pub fn mark_lost(&mut self) {
        if self.state != TrackState::Removed {
            self.state = TrackState::Lost;
        }
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}

/// Box described by the position part of a filter mean.
pub fn rect_from_mean(mean: &Array1<f64>) -> Rect {
    Rect::from_xyah(mean[0] as f32, mean[1] as f32, mean[2] as f32, mean[3] as f32)
}
