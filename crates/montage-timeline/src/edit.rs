//! Structural edits coming from the editor.
//!
//! Every edit is validated against the placement rules before it touches
//! the scene; a rejected edit returns [`MontageError::Placement`] and
//! leaves the scene unchanged.

use crate::clip::{Clip, ClipId, PlacedFilter};
use crate::scene::Scene;
use crate::track::TrackMix;
use montage_core::{MontageError, Pts, Result};
use montage_effects::{TransitionCurve, TransitionStyle};
use tracing::{debug, warn};

/// Which filter chain of a clip an edit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Video,
    Audio,
}

#[derive(Debug, Clone)]
pub enum SceneEdit {
    /// Place a new clip; its position may be snapped.
    AddClip { clip: Clip, track: usize },
    RemoveClip { clip: ClipId },
    /// Move a clip, possibly to another track.
    Move {
        clip: ClipId,
        track: usize,
        position: Pts,
        new_track: usize,
    },
    /// Move a clip and every clip after it on its track.
    MoveMulti {
        clip: ClipId,
        track: usize,
        position: Pts,
    },
    /// Drag the end of a clip.
    Resize {
        clip: ClipId,
        track: usize,
        length: Pts,
    },
    /// Drag the start of a clip, keeping its end.
    ResizeStart {
        clip: ClipId,
        track: usize,
        position: Pts,
    },
    Split { clip: ClipId, track: usize, pts: Pts },
    SetSpeed { clip: ClipId, speed: f64 },
    AddFilter {
        clip: ClipId,
        chain: Chain,
        filter: PlacedFilter,
    },
    RemoveFilter {
        clip: ClipId,
        chain: Chain,
        index: usize,
    },
    /// Restyle the transition at the head of a clip.
    SetTransition {
        clip: ClipId,
        style: TransitionStyle,
        curve: TransitionCurve,
    },
    AddTrack { index: usize },
    RemoveTrack { index: usize },
    SetTrackMix { track: usize, mix: TrackMix },
    /// Edits applied together; if one is rejected none take effect.
    Batch(Vec<SceneEdit>),
}

fn rejected(what: impl Into<String>) -> MontageError {
    MontageError::Placement(what.into())
}

fn missing(clip: ClipId) -> MontageError {
    MontageError::NotFound(format!("clip {}", clip))
}

impl SceneEdit {
    /// Validate and apply to `scene`. The caller holds the scene lock.
    pub fn apply(self, scene: &mut Scene) -> Result<()> {
        debug!("Apply {}", self.kind());
        match self {
            Self::AddClip { mut clip, track } => {
                let pos = scene
                    .can_move(clip.id(), clip.length(), clip.position(), track)
                    .ok_or_else(|| rejected(format!("clip does not fit on track {}", track)))?;
                clip.position = pos;
                scene.add_clip(clip, track)
            }
            Self::RemoveClip { clip } => scene.remove_clip(clip).map(|_| ()).ok_or_else(|| missing(clip)),
            Self::Move {
                clip,
                track,
                position,
                new_track,
            } => {
                let length = scene.find(clip).ok_or_else(|| missing(clip))?.1.length();
                let pos = scene
                    .can_move(clip, length, position, new_track)
                    .ok_or_else(|| rejected(format!("cannot move to {:.0} on track {}", position, new_track)))?;
                scene.move_clip(clip, track, pos, new_track)
            }
            Self::MoveMulti {
                clip,
                track,
                position,
            } => {
                let length = scene.find(clip).ok_or_else(|| missing(clip))?.1.length();
                let pos = scene
                    .can_move_multi(clip, length, position, track)
                    .ok_or_else(|| rejected(format!("cannot move clips to {:.0}", position)))?;
                scene.move_multi(clip, track, pos)
            }
            Self::Resize {
                clip,
                track,
                length,
            } => {
                let length = scene
                    .can_resize(clip, length, track)
                    .ok_or_else(|| rejected(format!("cannot resize to {:.0}", length)))?;
                scene.resize(clip, length, track)
            }
            Self::ResizeStart {
                clip,
                track,
                position,
            } => {
                let end = scene.find(clip).ok_or_else(|| missing(clip))?.1.end();
                let pos = scene
                    .can_resize_start(clip, position, end, track)
                    .ok_or_else(|| rejected(format!("cannot start at {:.0}", position)))?;
                scene.resize_start(clip, pos, end - pos, track)
            }
            Self::Split { clip, track, pts } => scene.split_clip(clip, track, pts).map(|_| ()),
            Self::SetSpeed { clip, speed } => {
                if speed <= 0.0 {
                    return Err(MontageError::InvalidParameter(format!("speed {}", speed)));
                }
                let (_, c) = scene.find(clip).ok_or_else(|| missing(clip))?;
                if let Some(end) = c.source().end() {
                    if c.start() + c.length() * speed > end {
                        return Err(rejected("speed runs past the end of the source"));
                    }
                }
                scene.clip_mut(clip).ok_or_else(|| missing(clip))?.set_speed(speed);
                scene.request_update();
                Ok(())
            }
            Self::AddFilter {
                clip,
                chain,
                filter,
            } => {
                if (chain == Chain::Video) != filter.filter.is_video() {
                    return Err(MontageError::InvalidParameter(format!(
                        "{} does not belong in the {:?} chain",
                        filter.filter.name(),
                        chain
                    )));
                }
                let c = scene.clip_mut(clip).ok_or_else(|| missing(clip))?;
                match chain {
                    Chain::Video => c.video_filters.push(filter),
                    Chain::Audio => c.audio_filters.push(filter),
                }
                scene.request_update();
                Ok(())
            }
            Self::RemoveFilter {
                clip,
                chain,
                index,
            } => {
                let c = scene.clip_mut(clip).ok_or_else(|| missing(clip))?;
                let filters = match chain {
                    Chain::Video => &mut c.video_filters,
                    Chain::Audio => &mut c.audio_filters,
                };
                if index >= filters.len() {
                    return Err(MontageError::NotFound(format!("filter {}", index)));
                }
                filters.remove(index);
                scene.request_update();
                Ok(())
            }
            Self::SetTransition { clip, style, curve } => {
                let t = scene
                    .clip_mut(clip)
                    .ok_or_else(|| missing(clip))?
                    .transition_mut()
                    .ok_or_else(|| MontageError::NotFound(format!("transition on clip {}", clip)))?;
                t.style = style;
                t.curve = curve;
                scene.request_update();
                Ok(())
            }
            Self::AddTrack { index } => scene
                .add_track(index)
                .then_some(())
                .ok_or_else(|| MontageError::NotFound(format!("track {}", index))),
            Self::RemoveTrack { index } => scene
                .remove_track(index)
                .then_some(())
                .ok_or_else(|| rejected(format!("track {} is missing or not empty", index))),
            Self::SetTrackMix { track, mix } => {
                if !(mix.volume >= 0.0 && (-1.0..=1.0).contains(&mix.pan)) {
                    return Err(MontageError::InvalidParameter(format!(
                        "volume {} pan {}",
                        mix.volume, mix.pan
                    )));
                }
                scene
                    .set_mix(track, mix)
                    .then_some(())
                    .ok_or_else(|| MontageError::NotFound(format!("track {}", track)))
            }
            Self::Batch(edits) => {
                let saved = scene.clone();
                for edit in edits {
                    if let Err(e) = edit.apply(scene) {
                        warn!("Batch edit rejected, rolling back: {}", e);
                        *scene = saved;
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::AddClip { .. } => "add clip",
            Self::RemoveClip { .. } => "remove clip",
            Self::Move { .. } => "move",
            Self::MoveMulti { .. } => "move multi",
            Self::Resize { .. } => "resize",
            Self::ResizeStart { .. } => "resize start",
            Self::Split { .. } => "split",
            Self::SetSpeed { .. } => "set speed",
            Self::AddFilter { .. } => "add filter",
            Self::RemoveFilter { .. } => "remove filter",
            Self::SetTransition { .. } => "set transition",
            Self::AddTrack { .. } => "add track",
            Self::RemoveTrack { .. } => "remove track",
            Self::SetTrackMix { .. } => "set track mix",
            Self::Batch(_) => "batch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_source;
    use montage_core::{seconds, FrameRate, PipelineConfig, Profile};
    use montage_effects::{BlendMode, Filter, Gain, Opacity};

    fn scene() -> Scene {
        Scene::with_tracks(
            Profile::project(1280, 720, FrameRate::FPS_25),
            &PipelineConfig::default(),
            2,
        )
    }

    fn add(scene: &mut Scene, pos: f64, len: f64) -> ClipId {
        let clip = scene.create_clip(test_source(60.0), seconds(pos), 0.0, seconds(len));
        let id = clip.id();
        SceneEdit::AddClip { clip, track: 0 }.apply(scene).unwrap();
        id
    }

    #[test]
    fn test_rejected_move_leaves_scene() {
        let mut s = scene();
        add(&mut s, 0.0, 10.0);
        let b = add(&mut s, 10.0, 10.0);
        let err = SceneEdit::Move {
            clip: b,
            track: 0,
            position: seconds(5.0),
            new_track: 0,
        }
        .apply(&mut s)
        .unwrap_err();
        assert!(matches!(err, MontageError::Placement(_)));
        assert_eq!(s.find(b).unwrap().1.position(), seconds(10.0));
    }

    #[test]
    fn test_add_overlapping_clip_rejected() {
        let mut s = scene();
        add(&mut s, 0.0, 10.0);
        let clip = s.create_clip(test_source(60.0), seconds(3.0), 0.0, seconds(2.0));
        assert!(SceneEdit::AddClip { clip, track: 0 }.apply(&mut s).is_err());
        assert_eq!(s.track(0).unwrap().clip_count(), 1);
    }

    #[test]
    fn test_batch_rolls_back() {
        let mut s = scene();
        let a = add(&mut s, 0.0, 10.0);
        let err = SceneEdit::Batch(vec![
            SceneEdit::Resize {
                clip: a,
                track: 0,
                length: seconds(4.0),
            },
            SceneEdit::RemoveTrack { index: 0 },
        ])
        .apply(&mut s);
        assert!(err.is_err());
        assert_eq!(s.find(a).unwrap().1.length(), seconds(10.0));
    }

    #[test]
    fn test_filter_chain_checked() {
        let mut s = scene();
        let a = add(&mut s, 0.0, 10.0);
        let wrong = SceneEdit::AddFilter {
            clip: a,
            chain: Chain::Audio,
            filter: PlacedFilter::whole(Filter::video(Opacity::new(0.5))),
        };
        assert!(matches!(
            wrong.apply(&mut s),
            Err(MontageError::InvalidParameter(_))
        ));
        SceneEdit::AddFilter {
            clip: a,
            chain: Chain::Audio,
            filter: PlacedFilter::whole(Filter::audio(Gain::new(0.5))),
        }
        .apply(&mut s)
        .unwrap();
        assert_eq!(s.find(a).unwrap().1.audio_filters.len(), 1);
        SceneEdit::RemoveFilter {
            clip: a,
            chain: Chain::Audio,
            index: 0,
        }
        .apply(&mut s)
        .unwrap();
        assert!(s.find(a).unwrap().1.audio_filters.is_empty());
    }

    #[test]
    fn test_transition_style_survives_moves() {
        let mut s = scene();
        add(&mut s, 0.0, 10.0);
        let b = add(&mut s, 9.0, 5.0);
        SceneEdit::SetTransition {
            clip: b,
            style: TransitionStyle::Blend(BlendMode::Screen),
            curve: TransitionCurve::smooth(),
        }
        .apply(&mut s)
        .unwrap();
        SceneEdit::Move {
            clip: b,
            track: 0,
            position: seconds(9.6),
            new_track: 0,
        }
        .apply(&mut s)
        .unwrap();
        let t = s.find(b).unwrap().1.transition().unwrap().clone();
        assert_eq!(t.length, seconds(0.4));
        assert_eq!(t.style, TransitionStyle::Blend(BlendMode::Screen));
    }

    #[test]
    fn test_speed_limited_by_source() {
        let mut s = scene();
        let a = add(&mut s, 0.0, 20.0);
        assert!(SceneEdit::SetSpeed { clip: a, speed: 4.0 }.apply(&mut s).is_err());
        SceneEdit::SetSpeed { clip: a, speed: 2.0 }.apply(&mut s).unwrap();
        assert_eq!(s.find(a).unwrap().1.speed(), 2.0);
    }

    #[test]
    fn test_track_mix_is_validated() {
        let mut s = scene();
        let mix = TrackMix {
            volume: 0.5,
            pan: -0.25,
            solo: true,
        };
        SceneEdit::SetTrackMix { track: 1, mix }.apply(&mut s).unwrap();
        assert_eq!(s.track(1).unwrap().mix, mix);

        let loud_left = TrackMix { pan: -2.0, ..mix };
        assert!(SceneEdit::SetTrackMix { track: 0, mix: loud_left }.apply(&mut s).is_err());
        assert!(SceneEdit::SetTrackMix { track: 5, mix }.apply(&mut s).is_err());
        assert_eq!(s.track(0).unwrap().mix, TrackMix::default());
    }
}
