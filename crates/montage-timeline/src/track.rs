//! Tracks: position-ordered clips on one compositing layer.

use crate::clip::{Clip, ClipId};
use crate::transition::Transition;
use montage_core::{Pts, PTS_EPSILON};
use uuid::Uuid;

/// Clips active on a track at one timestamp.
#[derive(Debug, Clone, Copy)]
pub struct ActiveClip<'a> {
    /// The clip that started last among those covering the timestamp.
    pub clip: &'a Clip,
    /// Present inside a transition: the clip being blended away from.
    pub outgoing: Option<&'a Clip>,
    pub transition: Option<&'a Transition>,
}

/// Level, balance and solo of a track's sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMix {
    /// Linear gain, 0.0 and up.
    pub volume: f32,
    /// -1.0 full left to 1.0 full right.
    pub pan: f32,
    pub solo: bool,
}

impl Default for TrackMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            solo: false,
        }
    }
}

/// Ordered clips on one layer. Track 0 is composited in front.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    /// Sorted by position.
    pub(crate) clips: Vec<Clip>,
    pub muted: bool,
    pub hidden: bool,
    pub mix: TrackMix,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            clips: Vec::new(),
            muted: false,
            hidden: false,
            mix: TrackMix::default(),
        }
    }

    #[inline]
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    #[inline]
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn find(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    pub(crate) fn find_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id() == id)
    }

    pub(crate) fn index_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id() == id)
    }

    /// End of the last clip.
    pub fn duration(&self) -> Pts {
        self.clips.iter().map(Clip::end).fold(0.0, Pts::max)
    }

    /// Insert keeping position order.
    pub(crate) fn insert(&mut self, clip: Clip) {
        let index = self
            .clips
            .partition_point(|c| c.position() <= clip.position());
        self.clips.insert(index, clip);
    }

    pub(crate) fn take(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.index_of(id)?;
        Some(self.clips.remove(index))
    }

    pub(crate) fn sort(&mut self) {
        self.clips
            .sort_by(|a, b| a.position().total_cmp(&b.position()));
    }

    /// Recompute every head transition from the current placement. Styles
    /// of transitions that survive are kept.
    pub(crate) fn update_transitions(&mut self) {
        self.sort();
        for i in 0..self.clips.len() {
            let overlap = match i.checked_sub(1).map(|p| &self.clips[p]) {
                Some(prev) if prev.end() > self.clips[i].position() + PTS_EPSILON => {
                    Some((prev.id(), prev.end() - self.clips[i].position()))
                }
                _ => None,
            };
            let clip = &mut self.clips[i];
            clip.transition = overlap.map(|(from, length)| {
                let mut t = Transition::new(clip.position(), length, from);
                if let Some(old) = clip.transition.take() {
                    t.style = old.style;
                    t.curve = old.curve;
                }
                t
            });
        }
    }

    /// Clips to show at `pts`.
    pub fn active_at(&self, pts: Pts) -> Option<ActiveClip<'_>> {
        let clip = self.clips.iter().rev().find(|c| c.contains(pts))?;
        let transition = clip.transition().filter(|t| t.contains(pts));
        let outgoing = transition.and_then(|t| self.find(t.from));
        Some(ActiveClip {
            clip,
            outgoing,
            transition: transition.filter(|_| outgoing.is_some()),
        })
    }

    /// Clips starting in `[from, to)`.
    pub fn starting_within(&self, from: Pts, to: Pts) -> impl Iterator<Item = &Clip> {
        self.clips
            .iter()
            .filter(move |c| c.position() >= from && c.position() < to)
    }
}
