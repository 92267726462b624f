//! The scene: tracks of clips, placement rules and the playhead.
//!
//! Placement predicates (`can_*`) never mutate. They return the corrected
//! value to commit, or `None` when the placement is illegal. The matching
//! mutators assume the predicate passed and recompute transitions on every
//! track they touch.
//!
//! A scene is shared between the edit side and the composer as a
//! [`SharedScene`]; every edit and every read of the active clip set
//! happens under that one lock.

use crate::clip::{Clip, ClipId};
use crate::source::Source;
use crate::track::{ActiveClip, Track, TrackMix};
use montage_core::{MontageError, PipelineConfig, Profile, Pts, Result, PTS_EPSILON};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info};

pub type SharedScene = Arc<Mutex<Scene>>;

/// Active clips per track at one timestamp, front track first.
pub type ActiveClips<'a> = SmallVec<[(usize, ActiveClip<'a>); 4]>;

#[derive(Debug, Clone)]
pub struct Scene {
    profile: Profile,
    pub(crate) tracks: Vec<Track>,
    /// Playhead of the video output.
    pub current_pts: Pts,
    /// Playhead of the audio output.
    pub current_pts_audio: Pts,
    /// Largest overlap allowed between neighbours on a track.
    margin: Pts,
    /// An edit touched the frame under the playhead.
    update: bool,
}

impl Scene {
    pub fn new(profile: Profile, config: &PipelineConfig) -> Self {
        Self {
            profile,
            tracks: Vec::new(),
            current_pts: 0.0,
            current_pts_audio: 0.0,
            margin: config.transition_margin_us,
            update: false,
        }
    }

    /// A scene with `count` empty tracks.
    pub fn with_tracks(profile: Profile, config: &PipelineConfig, count: usize) -> Self {
        let mut scene = Self::new(profile, config);
        scene.tracks = (0..count).map(|_| Track::new()).collect();
        scene
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: Profile) {
        info!("Scene profile set to {}", profile);
        self.profile = profile;
        self.update = true;
    }

    #[inline]
    pub fn margin(&self) -> Pts {
        self.margin
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// End of the last clip on any track.
    pub fn duration(&self) -> Pts {
        self.tracks.iter().map(Track::duration).fold(0.0, Pts::max)
    }

    /// Whether an edit touched the frame under the playhead since the last
    /// call.
    pub fn take_update(&mut self) -> bool {
        std::mem::take(&mut self.update)
    }

    pub fn request_update(&mut self) {
        self.update = true;
    }

    /// Flag the playhead dirty if it lies in `[begin, end]`.
    fn touch(&mut self, begin: Pts, end: Pts) {
        if self.current_pts >= begin - PTS_EPSILON && self.current_pts <= end + PTS_EPSILON {
            self.update = true;
        }
    }

    /// Remove every clip and track.
    pub fn drain(&mut self) {
        self.tracks.clear();
        self.update = true;
        debug!("Scene drained");
    }

    /// Insert an empty track before `index`.
    pub fn add_track(&mut self, index: usize) -> bool {
        if index > self.tracks.len() {
            return false;
        }
        self.tracks.insert(index, Track::new());
        self.update = true;
        true
    }

    /// Remove the track at `index`. Only empty tracks can be removed.
    pub fn remove_track(&mut self, index: usize) -> bool {
        match self.tracks.get(index) {
            Some(t) if t.is_empty() => {
                self.tracks.remove(index);
                self.update = true;
                true
            }
            _ => false,
        }
    }

    /// Silence a track's audio.
    pub fn set_muted(&mut self, index: usize, muted: bool) -> bool {
        let Some(track) = self.tracks.get_mut(index) else {
            return false;
        };
        track.muted = muted;
        true
    }

    /// Replace a track's sound settings.
    pub fn set_mix(&mut self, index: usize, mix: TrackMix) -> bool {
        let Some(track) = self.tracks.get_mut(index) else {
            return false;
        };
        track.mix = mix;
        true
    }

    /// Hide a track from composition.
    pub fn set_hidden(&mut self, index: usize, hidden: bool) -> bool {
        let Some(track) = self.tracks.get_mut(index) else {
            return false;
        };
        track.hidden = hidden;
        self.update = true;
        true
    }

    /// A new clip, not yet placed on a track.
    pub fn create_clip(&self, source: Arc<Source>, position: Pts, start: Pts, length: Pts) -> Clip {
        Clip::new(source, position, start, length)
    }

    /// Track index and clip for `id`.
    pub fn find(&self, id: ClipId) -> Option<(usize, &Clip)> {
        self.tracks
            .iter()
            .enumerate()
            .find_map(|(i, t)| t.find(id).map(|c| (i, c)))
    }

    pub(crate) fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.tracks.iter_mut().find_map(|t| t.find_mut(id))
    }

    fn clip_on(&self, id: ClipId, track: usize) -> Result<&Clip> {
        self.tracks
            .get(track)
            .and_then(|t| t.find(id))
            .ok_or_else(|| MontageError::NotFound(format!("clip {} on track {}", id, track)))
    }

    fn track_mut(&mut self, track: usize) -> Result<&mut Track> {
        self.tracks
            .get_mut(track)
            .ok_or_else(|| MontageError::NotFound(format!("track {}", track)))
    }

    // ── Placement rules ───────────────────────────────────────────

    /// Whether `[pos, pos + len)` fits on `track` among the clips not
    /// excluded. A clip may overlap at most one neighbour on each side, by
    /// no more than the margin, and the two overlaps may not cross.
    fn check_placement(
        &self,
        track: usize,
        exclude: impl Fn(&Clip) -> bool,
        pos: Pts,
        len: Pts,
    ) -> bool {
        let Some(t) = self.tracks.get(track) else {
            return false;
        };
        if len <= PTS_EPSILON || pos < -PTS_EPSILON {
            return false;
        }
        let end = pos + len;
        let mut head: Option<Pts> = None;
        let mut tail: Option<Pts> = None;
        for c in t.clips().iter().filter(|c| !exclude(c)) {
            let (cs, ce) = (c.position(), c.end());
            if ce <= pos + PTS_EPSILON || cs >= end - PTS_EPSILON {
                continue;
            }
            let overlap = ce.min(end) - cs.max(pos);
            if overlap > self.margin + PTS_EPSILON
                || overlap >= len - PTS_EPSILON
                || overlap >= c.length() - PTS_EPSILON
            {
                return false;
            }
            if cs < pos - PTS_EPSILON && ce < end - PTS_EPSILON && head.is_none() {
                head = Some(ce);
            } else if cs > pos + PTS_EPSILON && ce > end + PTS_EPSILON && tail.is_none() {
                tail = Some(cs);
            } else {
                return false;
            }
        }
        match (head, tail) {
            (Some(h), Some(t)) => h <= t + PTS_EPSILON,
            _ => true,
        }
    }

    /// Snap `pos` to the frame grid, then onto a neighbour's edge when
    /// within half a frame of it.
    fn snap(&self, track: usize, exclude: impl Fn(&Clip) -> bool, pos: Pts, len: Pts) -> Pts {
        let grid = self.profile.frame_duration();
        let mut pos = self.profile.frame_rate.quantize(pos);
        if let Some(t) = self.tracks.get(track) {
            let near = grid / 2.0;
            for c in t.clips().iter().filter(|c| !exclude(c)) {
                if (pos - c.end()).abs() < near {
                    pos = c.end();
                    break;
                }
                if (pos + len - c.position()).abs() < near {
                    pos = c.position() - len;
                    break;
                }
            }
        }
        pos.max(0.0)
    }

    /// Where `clip` of `length` would land if moved to `pos` on `track`.
    /// The clip need not be placed yet.
    pub fn can_move(&self, clip: ClipId, length: Pts, pos: Pts, track: usize) -> Option<Pts> {
        let pos = self.snap(track, |c| c.id() == clip, pos, length);
        self.check_placement(track, |c| c.id() == clip, pos, length)
            .then_some(pos)
    }

    /// Like [`can_move`](Self::can_move) for `clip` together with every
    /// clip after it on its track, which keep their spacing.
    pub fn can_move_multi(&self, clip: ClipId, length: Pts, pos: Pts, track: usize) -> Option<Pts> {
        let from = self.tracks.get(track)?.find(clip)?.position();
        let moving = |c: &Clip| c.position() >= from - PTS_EPSILON;
        let pos = self.snap(track, moving, pos, length);
        self.check_placement(track, moving, pos, length)
            .then_some(pos)
    }

    /// Length `clip` would get when its end is dragged, clamped to the
    /// source.
    pub fn can_resize(&self, clip: ClipId, length: Pts, track: usize) -> Option<Pts> {
        let c = self.tracks.get(track)?.find(clip)?;
        let end = self.profile.frame_rate.quantize(c.position() + length);
        let mut length = end - c.position();
        if let Some(source_end) = c.source().end() {
            length = length.min((source_end - c.start()) / c.speed());
        }
        self.check_placement(track, |o| o.id() == clip, c.position(), length)
            .then_some(length)
    }

    /// Position `clip` would get when its start is dragged to `pos` with
    /// its end held at `end`, clamped to the source start.
    pub fn can_resize_start(&self, clip: ClipId, pos: Pts, end: Pts, track: usize) -> Option<Pts> {
        let c = self.tracks.get(track)?.find(clip)?;
        let earliest = c.position() - (c.start() - c.source().start()) / c.speed();
        let pos = self
            .profile
            .frame_rate
            .quantize(pos)
            .max(earliest)
            .max(0.0);
        self.check_placement(track, |o| o.id() == clip, pos, end - pos)
            .then_some(pos)
    }

    // ── Mutators ──────────────────────────────────────────────────

    /// Place a new clip on `track`.
    pub fn add_clip(&mut self, clip: Clip, track: usize) -> Result<()> {
        let (begin, end) = (clip.position(), clip.end());
        let t = self.track_mut(track)?;
        t.insert(clip);
        t.update_transitions();
        self.touch(begin, end);
        Ok(())
    }

    /// Remove `clip` from whichever track holds it.
    pub fn remove_clip(&mut self, clip: ClipId) -> Option<Clip> {
        let track = self.find(clip)?.0;
        let t = &mut self.tracks[track];
        let removed = t.take(clip)?;
        t.update_transitions();
        self.touch(removed.position(), removed.end());
        Some(removed)
    }

    pub fn move_clip(&mut self, clip: ClipId, track: usize, pos: Pts, new_track: usize) -> Result<()> {
        if new_track >= self.tracks.len() {
            return Err(MontageError::NotFound(format!("track {}", new_track)));
        }
        let mut c = self
            .track_mut(track)?
            .take(clip)
            .ok_or_else(|| MontageError::NotFound(format!("clip {} on track {}", clip, track)))?;
        self.touch(c.position(), c.end());
        c.position = pos;
        self.touch(c.position(), c.end());
        self.tracks[track].update_transitions();
        let t = &mut self.tracks[new_track];
        t.insert(c);
        t.update_transitions();
        Ok(())
    }

    /// Move `clip` and every clip after it on `track` by the same amount.
    pub fn move_multi(&mut self, clip: ClipId, track: usize, pos: Pts) -> Result<()> {
        let from = self.clip_on(clip, track)?.position();
        let delta = pos - from;
        let end = self.tracks[track].duration();
        self.touch(from.min(pos), end.max(end + delta));
        let t = &mut self.tracks[track];
        for c in t.clips.iter_mut().filter(|c| c.position() >= from - PTS_EPSILON) {
            c.position += delta;
        }
        t.update_transitions();
        Ok(())
    }

    pub fn resize(&mut self, clip: ClipId, length: Pts, track: usize) -> Result<()> {
        let c = self.clip_on(clip, track)?;
        let (begin, old_end) = (c.position(), c.end());
        self.touch(begin, old_end.max(begin + length));
        let t = &mut self.tracks[track];
        if let Some(c) = t.find_mut(clip) {
            c.length = length;
        }
        t.update_transitions();
        Ok(())
    }

    /// Move the start of `clip` to `pos` with new `length`, shifting its
    /// source start so the frames under the end stay put.
    pub fn resize_start(&mut self, clip: ClipId, pos: Pts, length: Pts, track: usize) -> Result<()> {
        let c = self.clip_on(clip, track)?;
        let (old_pos, end) = (c.position(), c.end());
        self.touch(old_pos.min(pos), end);
        let t = &mut self.tracks[track];
        if let Some(c) = t.find_mut(clip) {
            c.start += (pos - c.position) * c.speed;
            c.position = pos;
            c.length = length;
        }
        t.update_transitions();
        Ok(())
    }

    /// Cut `clip` at timeline `pts`. Returns the id of the new tail clip.
    pub fn split_clip(&mut self, clip: ClipId, track: usize, pts: Pts) -> Result<ClipId> {
        let c = self.clip_on(clip, track)?;
        if pts <= c.position() + PTS_EPSILON || pts >= c.end() - PTS_EPSILON {
            return Err(MontageError::InvalidParameter(format!(
                "split point {:.0} outside clip [{:.0}, {:.0})",
                pts,
                c.position(),
                c.end()
            )));
        }
        let t = &mut self.tracks[track];
        let tail = match t.find_mut(clip) {
            Some(c) => c.split_off(pts),
            None => return Err(MontageError::Internal("clip vanished during split".into())),
        };
        let id = tail.id();
        t.insert(tail);
        t.update_transitions();
        self.touch(pts, pts);
        debug!("Split clip {} at {:.0}", clip, pts);
        Ok(id)
    }

    // ── Queries ───────────────────────────────────────────────────

    /// Active clips on every visible track at `pts`, front track first.
    pub fn active_clips(&self, pts: Pts) -> ActiveClips<'_> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.hidden)
            .filter_map(|(i, t)| t.active_at(pts).map(|a| (i, a)))
            .collect()
    }

    /// Clips on any track starting in `[from, to)`.
    pub fn clips_starting_within(&self, from: Pts, to: Pts) -> Vec<&Clip> {
        self.tracks
            .iter()
            .flat_map(|t| t.starting_within(from, to))
            .collect()
    }
}
