//! Storage for every track owned by a tracker.
//!
//! Pools refer to tracks through [`TrackHandle`]s instead of holding copies,
//! so a prediction or update applied to a track is visible from every pool
//! that names it. A handle carries the generation of its slot; once the slot
//! is freed and reused, stale handles no longer resolve.

use crate::tracker::strack::STrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    track: Option<STrack>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    len: usize,
}

impl TrackArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track: STrack) -> TrackHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.track = Some(track);
            return TrackHandle {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            track: Some(track),
        });
        TrackHandle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn get(&self, handle: TrackHandle) -> Option<&STrack> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.track.as_ref())
    }

    pub fn get_mut(&mut self, handle: TrackHandle) -> Option<&mut STrack> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.track.as_mut())
    }

    /// Take a track out of the arena. Its handle, and every copy of it, stops
    /// resolving.
    pub fn remove(&mut self, handle: TrackHandle) -> Option<STrack> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)?;
        let track = slot.track.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(track)
    }

    pub fn contains(&self, handle: TrackHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live tracks in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackHandle, &STrack)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.track.as_ref().map(|track| {
                (
                    TrackHandle {
                        index,
                        generation: slot.generation,
                    },
                    track,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::rect::Rect;

    fn track(score: f32) -> STrack {
        STrack::new(Rect::new(0.0, 0.0, 10.0, 10.0), score)
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = TrackArena::new();
        let a = arena.insert(track(0.1));
        let b = arena.insert(track(0.2));

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(|t| t.score), Some(0.1));
        assert_eq!(arena.get(b).map(|t| t.score), Some(0.2));

        if let Some(t) = arena.get_mut(a) {
            t.score = 0.5;
        }
        assert_eq!(arena.get(a).map(|t| t.score), Some(0.5));
    }

    #[test]
    fn test_stale_handle_does_not_resolve_after_reuse() {
        let mut arena = TrackArena::new();
        let old = arena.insert(track(0.1));
        assert!(arena.remove(old).is_some());
        assert!(arena.is_empty());

        let new = arena.insert(track(0.9));
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert!(arena.get_mut(old).is_none());
        assert!(arena.remove(old).is_none());
        assert_eq!(arena.get(new).map(|t| t.score), Some(0.9));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut arena = TrackArena::new();
        let handles: Vec<_> = (0..4).map(|i| arena.insert(track(i as f32))).collect();
        arena.remove(handles[1]);
        arena.remove(handles[2]);

        let live: Vec<_> = arena.iter().map(|(h, _)| h).collect();
        assert_eq!(live, vec![handles[0], handles[3]]);
        assert!(arena.contains(handles[3]));
        assert!(!arena.contains(handles[1]));
    }
}
