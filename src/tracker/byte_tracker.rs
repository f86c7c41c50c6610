//! Main BYTETracker algorithm implementation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::tracker::arena::{TrackArena, TrackHandle};
use crate::tracker::error::TrackerError;
use crate::tracker::kalman_filter::{FilterError, KalmanFilter};
use crate::tracker::matching::{self, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::strack::{STrack, TrackIdGenerator};
use crate::tracker::track_state::TrackState;

/// Cost threshold for the second association, against low-score detections.
pub const SECOND_MATCH_THRESH: f32 = 0.5;
/// Cost threshold for matching unconfirmed tracks to leftover detections.
pub const UNCONFIRMED_MATCH_THRESH: f32 = 0.7;
/// Tracked and lost tracks closer than this IoU distance are duplicates.
pub const DUPLICATE_IOU_DISTANCE: f32 = 0.15;

/// Configuration for the BYTETracker.
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frame rate of the source video; scales `track_buffer`
    pub frame_rate: u32,
    /// Frames a lost track is kept at 30 fps
    pub track_buffer: u32,
    /// Detections scoring at least this go to the first association
    pub track_thresh: f32,
    /// Accepted for compatibility; the association cascade does not read it
    pub high_thresh: f32,
    /// Cost threshold for the first association
    pub match_thresh: f32,
    /// Minimum score for an unmatched detection to start a track
    pub new_thresh: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            track_buffer: 30,
            track_thresh: 0.5,
            high_thresh: 0.6,
            match_thresh: 0.8,
            new_thresh: 0.5,
        }
    }
}

impl TrackerConfig {
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_track_buffer(mut self, track_buffer: u32) -> Self {
        self.track_buffer = track_buffer;
        self
    }

    pub fn with_track_thresh(mut self, track_thresh: f32) -> Self {
        self.track_thresh = track_thresh;
        self
    }

    pub fn with_high_thresh(mut self, high_thresh: f32) -> Self {
        self.high_thresh = high_thresh;
        self
    }

    pub fn with_match_thresh(mut self, match_thresh: f32) -> Self {
        self.match_thresh = match_thresh;
        self
    }

    pub fn with_new_thresh(mut self, new_thresh: f32) -> Self {
        self.new_thresh = new_thresh;
        self
    }

    /// Frames a track may stay lost before it is removed.
    pub fn max_time_lost(&self) -> u32 {
        (f64::from(self.frame_rate) / 30.0 * f64::from(self.track_buffer)) as u32
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.frame_rate == 0 {
            return Err(TrackerError::InvalidConfig(
                "frame_rate must be positive".to_string(),
            ));
        }

        let thresholds = [
            ("track_thresh", self.track_thresh),
            ("high_thresh", self.high_thresh),
            ("match_thresh", self.match_thresh),
            ("new_thresh", self.new_thresh),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A track whose motion filter rejected a matched detection.
///
/// The track is moved to `Lost` instead of carrying a corrupted state.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterFault {
    pub track_id: u64,
    pub frame_id: u32,
    pub error: FilterError,
}

pub struct BYTETracker {
    tracks: TrackArena,
    tracked_stracks: Vec<TrackHandle>,
    lost_stracks: Vec<TrackHandle>,
    removed_stracks: Vec<TrackHandle>,
    frame_id: u32,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
    track_ids: TrackIdGenerator,
    faults: Vec<FilterFault>,
}

impl Default for BYTETracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl BYTETracker {
    /// Create a tracker without checking the configuration.
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = config.max_time_lost();
        Self {
            tracks: TrackArena::new(),
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            removed_stracks: Vec::new(),
            frame_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
            track_ids: TrackIdGenerator::new(),
            faults: Vec::new(),
        }
    }

    pub fn try_new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Advance one frame and return the confirmed tracks.
    ///
    /// Every association is solved before any track changes, so on error the
    /// tracker is left untouched and the frame is not counted.
    pub fn update(&mut self, detections: &[Detection]) -> Result<Vec<STrack>, TrackerError> {
        if let Some(index) = detections.iter().position(|d| !is_finite_detection(d)) {
            return Err(TrackerError::InvalidDetection { index });
        }
        let frame_id = self.frame_id + 1;

        // Step 1: Split detections into high-score and low-score
        let (detections_high, detections_low): (Vec<STrack>, Vec<STrack>) = detections
            .iter()
            .map(|d| STrack::new(d.bbox, d.score))
            .partition(|t| t.score >= self.config.track_thresh);

        // Create track pool
        let (unconfirmed, confirmed): (Vec<TrackHandle>, Vec<TrackHandle>) = self
            .tracked_stracks
            .iter()
            .copied()
            .filter(|&h| self.tracks.contains(h))
            .partition(|&h| self.tracks.get(h).is_some_and(|t| !t.is_activated));

        let (pool_handles, mut strack_pool): (Vec<TrackHandle>, Vec<STrack>) =
            joint_stracks(&confirmed, &self.lost_stracks)
                .into_iter()
                .filter_map(|h| self.tracks.get(h).map(|t| (h, t.clone())))
                .unzip();

        // Step 2: First association, with high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let det_rects = rects(&detections_high);
        let first = matching::linear_assignment(
            &matching::iou_distance(&rects(&strack_pool), &det_rects),
            self.config.match_thresh,
        )?;

        // Step 3: Second association, with low score detections
        let r_tracked: Vec<usize> = first
            .unmatched_tracks
            .iter()
            .copied()
            .filter(|&i| strack_pool[i].state == TrackState::Tracked)
            .collect();
        let r_rects: Vec<Rect> = r_tracked.iter().map(|&i| strack_pool[i].rect()).collect();
        let second = matching::linear_assignment(
            &matching::iou_distance(&r_rects, &rects(&detections_low)),
            SECOND_MATCH_THRESH,
        )?;

        // Unconfirmed tracks only see the high score detections left over
        let detections_rem = &first.unmatched_detections;
        let unconfirmed_rects: Vec<Rect> = unconfirmed
            .iter()
            .filter_map(|&h| self.tracks.get(h))
            .map(STrack::rect)
            .collect();
        let rem_rects: Vec<Rect> = detections_rem.iter().map(|&i| det_rects[i]).collect();
        let third = matching::linear_assignment(
            &matching::iou_distance(&unconfirmed_rects, &rem_rects),
            UNCONFIRMED_MATCH_THRESH,
        )?;

        trace!(
            frame_id,
            first = first.matches.len(),
            second = second.matches.len(),
            unconfirmed = third.matches.len(),
            "associations solved"
        );

        self.frame_id = frame_id;
        self.faults.clear();
        let mut changes = FrameChanges::default();

        for &(itracked, idet) in &first.matches {
            let outcome = apply_match(
                &mut strack_pool[itracked],
                &detections_high[idet],
                &self.kalman_filter,
                frame_id,
                &mut self.faults,
            );
            changes.record(pool_handles[itracked], outcome);
        }

        for &(ir, idet) in &second.matches {
            let itracked = r_tracked[ir];
            let outcome = apply_match(
                &mut strack_pool[itracked],
                &detections_low[idet],
                &self.kalman_filter,
                frame_id,
                &mut self.faults,
            );
            changes.record(pool_handles[itracked], outcome);
        }

        for &ir in &second.unmatched_tracks {
            let itracked = r_tracked[ir];
            strack_pool[itracked].mark_lost();
            changes.lost.push(pool_handles[itracked]);
        }

        for (&handle, track) in pool_handles.iter().zip(strack_pool) {
            if let Some(slot) = self.tracks.get_mut(handle) {
                *slot = track;
            }
        }

        // Deal with unconfirmed tracks, usually tracks with only one beginning frame
        for &(itracked, ir) in &third.matches {
            let handle = unconfirmed[itracked];
            if let Some(track) = self.tracks.get_mut(handle) {
                let outcome = apply_match(
                    track,
                    &detections_high[detections_rem[ir]],
                    &self.kalman_filter,
                    frame_id,
                    &mut self.faults,
                );
                changes.record(handle, outcome);
            }
        }

        for &itracked in &third.unmatched_tracks {
            let handle = unconfirmed[itracked];
            if let Some(track) = self.tracks.get_mut(handle) {
                track.mark_removed();
                debug!(track_id = track.track_id, frame_id, "unconfirmed track removed");
                changes.removed.push(handle);
            }
        }

        // Step 4: Init new stracks
        for &ir in &third.unmatched_detections {
            let mut track = detections_high[detections_rem[ir]].clone();
            if track.score < self.config.new_thresh {
                continue;
            }
            track.activate(&self.kalman_filter, frame_id, self.track_ids.next_id());
            debug!(track_id = track.track_id, frame_id, score = track.score, "track started");
            changes.activated.push(self.tracks.insert(track));
        }

        // Step 5: Update state
        for &handle in &self.lost_stracks {
            if let Some(track) = self.tracks.get_mut(handle) {
                if track.state == TrackState::Lost
                    && frame_id.saturating_sub(track.end_frame()) > self.max_time_lost
                {
                    track.mark_removed();
                    debug!(track_id = track.track_id, frame_id, "lost track expired");
                    changes.removed.push(handle);
                }
            }
        }

        let still_tracked: Vec<TrackHandle> = self
            .tracked_stracks
            .iter()
            .copied()
            .filter(|&h| self.state_of(h) == Some(TrackState::Tracked))
            .collect();
        let tracked: Vec<TrackHandle> = joint_stracks(
            &joint_stracks(&still_tracked, &changes.activated),
            &changes.refind,
        )
        .into_iter()
        .filter(|&h| self.state_of(h) == Some(TrackState::Tracked))
        .collect();

        let mut lost: Vec<TrackHandle> = sub_stracks(
            &joint_stracks(&sub_stracks(&self.lost_stracks, &tracked), &changes.lost),
            &changes.removed,
        )
        .into_iter()
        .filter(|&h| self.state_of(h) == Some(TrackState::Lost))
        .collect();
        // Lost tracks re-enter the next Stage A pool in id order.
        lost.sort_by_key(|&h| self.tracks.get(h).map(|t| t.track_id));

        self.removed_stracks.extend(changes.removed);

        let (tracked, lost) = self.remove_duplicate_stracks(tracked, lost);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;

        let output: Vec<STrack> = self
            .tracked_stracks()
            .filter(|t| t.is_activated)
            .cloned()
            .collect();

        debug!(
            frame_id,
            high = detections_high.len(),
            low = detections_low.len(),
            tracked = self.tracked_stracks.len(),
            lost = self.lost_stracks.len(),
            removed = self.removed_stracks.len(),
            output = output.len(),
            "frame updated"
        );

        Ok(output)
    }

    /// Suppress near-identical tracked/lost pairs, keeping the longer lived
    /// track. The other one is dropped from the tracker.
    fn remove_duplicate_stracks(
        &mut self,
        stracksa: Vec<TrackHandle>,
        stracksb: Vec<TrackHandle>,
    ) -> (Vec<TrackHandle>, Vec<TrackHandle>) {
        if stracksa.is_empty() || stracksb.is_empty() {
            return (stracksa, stracksb);
        }

        let a: Vec<&STrack> = stracksa.iter().filter_map(|&h| self.tracks.get(h)).collect();
        let b: Vec<&STrack> = stracksb.iter().filter_map(|&h| self.tracks.get(h)).collect();
        let a_rects: Vec<Rect> = a.iter().map(|t| t.rect()).collect();
        let b_rects: Vec<Rect> = b.iter().map(|t| t.rect()).collect();
        let pdist = matching::iou_distance(&a_rects, &b_rects);

        let mut dupa = vec![false; a.len()];
        let mut dupb = vec![false; b.len()];
        for ((i, j), &dist) in pdist.indexed_iter() {
            if dist < DUPLICATE_IOU_DISTANCE {
                if a[i].duration() > b[j].duration() {
                    dupb[j] = true;
                } else {
                    dupa[i] = true;
                }
            }
        }

        let resa = self.drop_duplicates(stracksa, &dupa);
        let resb = self.drop_duplicates(stracksb, &dupb);
        (resa, resb)
    }

    fn drop_duplicates(&mut self, handles: Vec<TrackHandle>, duplicate: &[bool]) -> Vec<TrackHandle> {
        let mut kept = Vec::with_capacity(handles.len());
        for (handle, &dup) in handles.into_iter().zip(duplicate) {
            if !dup {
                kept.push(handle);
            } else if let Some(track) = self.tracks.remove(handle) {
                debug!(
                    track_id = track.track_id,
                    frame_id = self.frame_id,
                    "duplicate track suppressed"
                );
            }
        }
        kept
    }

    fn state_of(&self, handle: TrackHandle) -> Option<TrackState> {
        self.tracks.get(handle).map(|t| t.state)
    }

    /// Tracks currently followed, confirmed or not.
    pub fn tracked_stracks(&self) -> impl Iterator<Item = &STrack> + '_ {
        self.tracked_stracks.iter().filter_map(|&h| self.tracks.get(h))
    }

    pub fn lost_stracks(&self) -> impl Iterator<Item = &STrack> + '_ {
        self.lost_stracks.iter().filter_map(|&h| self.tracks.get(h))
    }

    pub fn removed_stracks(&self) -> impl Iterator<Item = &STrack> + '_ {
        self.removed_stracks.iter().filter_map(|&h| self.tracks.get(h))
    }

    /// Release the storage held by removed tracks.
    ///
    /// Ids are never reused, so this has no effect on future tracks.
    pub fn purge_removed(&mut self) -> usize {
        let purged = self
            .removed_stracks
            .drain(..)
            .filter_map(|h| self.tracks.remove(h))
            .count();
        trace!(purged, "removed tracks purged");
        purged
    }

    /// Filter faults raised during the most recent successful `update`.
    pub fn last_faults(&self) -> &[FilterFault] {
        &self.faults
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn max_time_lost(&self) -> u32 {
        self.max_time_lost
    }
}

enum MatchOutcome {
    Updated,
    Refound,
    Faulted,
}

/// Pool membership changes collected while a frame is applied.
#[derive(Default)]
struct FrameChanges {
    activated: Vec<TrackHandle>,
    refind: Vec<TrackHandle>,
    lost: Vec<TrackHandle>,
    removed: Vec<TrackHandle>,
}

impl FrameChanges {
    fn record(&mut self, handle: TrackHandle, outcome: MatchOutcome) {
        match outcome {
            MatchOutcome::Updated => self.activated.push(handle),
            MatchOutcome::Refound => self.refind.push(handle),
            MatchOutcome::Faulted => self.lost.push(handle),
        }
    }
}

/// Update a tracked track or re-activate a lost one with its matched detection.
fn apply_match(
    track: &mut STrack,
    detection: &STrack,
    kalman_filter: &KalmanFilter,
    frame_id: u32,
    faults: &mut Vec<FilterFault>,
) -> MatchOutcome {
    let result = if track.state == TrackState::Tracked {
        track
            .update(detection, kalman_filter, frame_id)
            .map(|()| MatchOutcome::Updated)
    } else {
        track
            .re_activate(detection, kalman_filter, frame_id, None)
            .map(|()| MatchOutcome::Refound)
    };

    match result {
        Ok(MatchOutcome::Refound) => {
            debug!(track_id = track.track_id, frame_id, "lost track refound");
            MatchOutcome::Refound
        }
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(track_id = track.track_id, frame_id, %error, "filter update failed, track marked lost");
            faults.push(FilterFault {
                track_id: track.track_id,
                frame_id,
                error,
            });
            MatchOutcome::Faulted
        }
    }
}

fn is_finite_detection(detection: &Detection) -> bool {
    detection.score.is_finite() && detection.bbox.to_tlwh().iter().all(|v| v.is_finite())
}

fn rects(stracks: &[STrack]) -> Vec<Rect> {
    stracks.iter().map(STrack::rect).collect()
}

/// Union of two handle lists, keeping first-seen order.
pub fn joint_stracks(tlista: &[TrackHandle], tlistb: &[TrackHandle]) -> Vec<TrackHandle> {
    let mut exists = HashSet::new();
    tlista
        .iter()
        .chain(tlistb)
        .copied()
        .filter(|&h| exists.insert(h))
        .collect()
}

/// Handles of `tlista` that are not in `tlistb`.
pub fn sub_stracks(tlista: &[TrackHandle], tlistb: &[TrackHandle]) -> Vec<TrackHandle> {
    let b: HashSet<TrackHandle> = tlistb.iter().copied().collect();
    tlista.iter().copied().filter(|h| !b.contains(h)).collect()
}
