/// Lifecycle of a track.
///
/// `New` -> `Tracked` on activation. A `Tracked` track becomes `Lost` when it
/// goes unmatched and returns to `Tracked` if it is matched again in time;
/// otherwise it ends as `Removed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Candidate built from a detection, not yet activated
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// Temporarily lost track
    Lost,
    /// Removed from tracking
    Removed,
}
