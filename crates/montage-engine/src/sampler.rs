//! Feeds the composer with decoded frames for the clips under the
//! playhead.
//!
//! Each clip gets its own [`Input`]. Inputs are opened when a clip becomes
//! active, or ahead of time when it starts within the forward lookup
//! window, and closed once the clip leaves both. Inputs deliver frames on
//! the project frame grid in source time; the sampler maps timeline
//! timestamps through the clip's offset and speed, holding a frame when
//! the clip plays slower and skipping frames when it plays faster.

use crate::plan::LayerPlan;
use montage_core::{BufferPool, Frame, PipelineConfig, Profile, Pts, PTS_EPSILON};
use montage_media::Input;
use montage_timeline::{Clip, ClipId};
use std::collections::HashMap;
use tracing::debug;

/// Frames pulled at most for one output frame before giving up on
/// catching up with a fast clip.
const MAX_PULLS: usize = 64;

/// Position, source start and speed of a clip when its input was seeked.
type Placement = (Pts, Pts, f64);

fn placement(clip: &Clip) -> Placement {
    (clip.position(), clip.start(), clip.speed())
}

struct ClipInput {
    input: Input,
    placement: Placement,
    /// Seeked for the current direction and placement.
    seeked: bool,
    /// Last picture pulled, shown again while it is still current.
    held: Option<Frame>,
}

/// Transient copy sharing `frame`'s picture.
fn share(frame: &Frame) -> Frame {
    let mut f = Frame::transient(frame.buffer_pool());
    f.share_video(frame);
    f.pts = frame.pts;
    f.marker = frame.marker;
    f.is_duplicate = frame.is_duplicate;
    f
}

pub struct Sampler {
    profile: Profile,
    config: PipelineConfig,
    buffers: BufferPool,
    inputs: HashMap<ClipId, ClipInput>,
    backward: bool,
}

impl Sampler {
    pub fn new(profile: &Profile, config: &PipelineConfig, buffers: &BufferPool) -> Self {
        Self {
            profile: profile.clone(),
            config: config.clone(),
            buffers: buffers.clone(),
            inputs: HashMap::new(),
            backward: false,
        }
    }

    #[inline]
    pub fn is_backward(&self) -> bool {
        self.backward
    }

    /// Number of open inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn has_input(&self, clip: ClipId) -> bool {
        self.inputs.contains_key(&clip)
    }

    /// Switch every input to `profile`. Sources are reopened on the next
    /// frame request.
    pub fn set_profile(&mut self, profile: &Profile) {
        if self.profile == *profile {
            return;
        }
        self.profile = profile.clone();
        for entry in self.inputs.values_mut() {
            entry.input.set_profile(profile);
            entry.seeked = false;
            entry.held = None;
        }
    }

    /// Forget decode positions; every input seeks again before its next
    /// frame.
    pub fn seek(&mut self, backward: bool) {
        self.backward = backward;
        for entry in self.inputs.values_mut() {
            entry.seeked = false;
            entry.held = None;
        }
    }

    /// Open and position inputs for the clips in `plan`, plus `upcoming`
    /// clips when playing forward. Inputs of every other clip are closed.
    pub fn prepare(&mut self, plan: &[LayerPlan], upcoming: &[Clip], pts: Pts) {
        let mut wanted: Vec<(&Clip, Pts)> = Vec::new();
        for layer in plan {
            wanted.push((&layer.clip, pts));
            if let Some(out) = &layer.outgoing {
                wanted.push((out, pts));
            }
        }
        if !self.backward {
            for clip in upcoming {
                if !wanted.iter().any(|(c, _)| c.id() == clip.id()) {
                    wanted.push((clip, clip.position()));
                }
            }
        }

        self.inputs.retain(|id, _| {
            let keep = wanted.iter().any(|(c, _)| c.id() == *id);
            if !keep {
                debug!("Closing input of clip {}", id);
            }
            keep
        });
        for (clip, at) in wanted {
            self.ensure(clip, at);
        }
    }

    /// Make sure `clip` has an input positioned for timeline `pts`.
    fn ensure(&mut self, clip: &Clip, pts: Pts) {
        let backward = self.backward;
        let half = self.profile.frame_duration() / 2.0;
        let entry = self.inputs.entry(clip.id()).or_insert_with(|| ClipInput {
            input: Input::new(&self.profile, &self.config, &self.buffers),
            placement: placement(clip),
            seeked: false,
            held: None,
        });
        if entry.seeked && entry.placement == placement(clip) {
            return;
        }
        let source_pts = clip.source_pts(pts);
        // Backward windows end before their bound; keep the frame at
        // `source_pts` inside the first one.
        let target = if backward { source_pts + half } else { source_pts };
        debug!(
            "Positioning {} for clip {} at {:.0}",
            clip.source().name(),
            clip.id(),
            target
        );
        entry
            .input
            .open_seek_play(clip.source().media(), target, backward);
        entry.placement = placement(clip);
        entry.seeked = true;
        entry.held = None;
    }

    /// Picture of `clip` at timeline `pts`, or `None` when the clip has no
    /// video or no input was prepared for it.
    pub fn video_frame(&mut self, clip: &Clip, pts: Pts) -> Option<Frame> {
        let wanted = clip.source_pts(pts);
        let half = self.profile.frame_duration() / 2.0;
        let dir = if self.backward { -1.0 } else { 1.0 };
        let entry = self.inputs.get_mut(&clip.id())?;

        for _ in 0..MAX_PULLS {
            let current = entry
                .held
                .as_ref()
                .is_some_and(|h| dir * (h.pts - wanted) >= -half - PTS_EPSILON);
            if current {
                break;
            }
            let Some(next) = entry.input.get_video_frame() else {
                break;
            };
            // End of video serves the last picture forever.
            let stalled = next.is_duplicate
                && entry
                    .held
                    .as_ref()
                    .is_some_and(|h| (h.pts - next.pts).abs() <= PTS_EPSILON);
            entry.held = Some(share(&next));
            next.release();
            if stalled {
                break;
            }
        }
        entry.held.as_ref().map(share)
    }

    /// `samples` samples of `clip`'s audio, silence-padded at end of
    /// stream. `None` when the clip has no audio left.
    pub fn audio_frame(&mut self, clip: &Clip, samples: usize) -> Option<Frame> {
        self.inputs.get(&clip.id())?.input.get_audio_frame(samples)
    }

    /// Close every input.
    pub fn clear(&mut self) {
        self.inputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_layers;
    use montage_core::{seconds, FrameRate};
    use montage_media::{frame_tag, SyntheticSource};
    use montage_timeline::{Scene, SceneEdit, Source};
    use std::sync::Arc;

    fn profile() -> Profile {
        Profile {
            sample_rate: 8000,
            ..Profile::project(4, 4, FrameRate::FPS_25)
        }
    }

    fn scene_with_clip(duration: f64, speed: f64) -> (Scene, ClipId) {
        let media = SyntheticSource::new("sampled", seconds(duration)).with_video(4, 4, FrameRate::FPS_25);
        let source = Source::probe(Arc::new(media)).unwrap();
        let mut scene = Scene::with_tracks(profile(), &PipelineConfig::default(), 1);
        let clip = scene.create_clip(source, 0.0, 0.0, seconds(duration / speed));
        let id = clip.id();
        SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene).unwrap();
        SceneEdit::SetSpeed { clip: id, speed }.apply(&mut scene).unwrap();
        (scene, id)
    }

    fn tags(scene: &Scene, sampler: &mut Sampler, frames: usize) -> Vec<u32> {
        let d = profile().frame_duration();
        (0..frames)
            .map(|i| {
                let pts = i as f64 * d;
                let plan = plan_layers(scene, pts);
                sampler.prepare(&plan, &[], pts);
                let frame = sampler.video_frame(&plan[0].clip, pts).unwrap();
                frame_tag(&frame).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_normal_speed_plays_every_frame() {
        let (scene, _) = scene_with_clip(2.0, 1.0);
        let mut sampler = Sampler::new(&profile(), &PipelineConfig::default(), &BufferPool::default());
        assert_eq!(tags(&scene, &mut sampler, 10), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_double_speed_skips_frames() {
        let (scene, _) = scene_with_clip(2.0, 2.0);
        let mut sampler = Sampler::new(&profile(), &PipelineConfig::default(), &BufferPool::default());
        assert_eq!(tags(&scene, &mut sampler, 5), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_half_speed_holds_frames() {
        let (scene, _) = scene_with_clip(2.0, 0.5);
        let mut sampler = Sampler::new(&profile(), &PipelineConfig::default(), &BufferPool::default());
        let t = tags(&scene, &mut sampler, 8);
        assert_eq!(t.len(), 8);
        assert!(t.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
        assert_eq!(t[7], 3);
    }

    #[test]
    fn test_inputs_follow_active_and_upcoming_clips() {
        let media = Arc::new(SyntheticSource::new("s", seconds(60.0)).with_video(4, 4, FrameRate::FPS_25));
        let source = Source::probe(media).unwrap();
        let mut scene = Scene::with_tracks(profile(), &PipelineConfig::default(), 1);
        let mut ids = Vec::new();
        for pos in [0.0, 10.0, 20.0] {
            let clip = scene.create_clip(Arc::clone(&source), seconds(pos), 0.0, seconds(10.0));
            ids.push(clip.id());
            SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene).unwrap();
        }
        let mut sampler = Sampler::new(&profile(), &PipelineConfig::default(), &BufferPool::default());

        let prepare = |sampler: &mut Sampler, pts: Pts| {
            let plan = plan_layers(&scene, pts);
            let lookup = PipelineConfig::default().forward_lookup_us;
            let upcoming: Vec<Clip> = scene
                .clips_starting_within(pts, pts + lookup)
                .into_iter()
                .cloned()
                .collect();
            sampler.prepare(&plan, &upcoming, pts);
        };

        prepare(&mut sampler, seconds(1.0));
        assert_eq!(sampler.input_count(), 1);
        prepare(&mut sampler, seconds(9.0));
        assert!(sampler.has_input(ids[0]) && sampler.has_input(ids[1]));
        prepare(&mut sampler, seconds(12.0));
        assert_eq!(sampler.input_count(), 1);
        assert!(sampler.has_input(ids[1]));

        sampler.seek(true);
        prepare(&mut sampler, seconds(19.0));
        assert_eq!(sampler.input_count(), 1);
    }

    #[test]
    fn test_backward_plays_in_reverse() {
        let (scene, _) = scene_with_clip(2.0, 1.0);
        let mut sampler = Sampler::new(&profile(), &PipelineConfig::default(), &BufferPool::default());
        sampler.seek(true);
        let d = profile().frame_duration();
        let got: Vec<u32> = (0..5)
            .map(|i| {
                let pts = (20 - i) as f64 * d;
                let plan = plan_layers(&scene, pts);
                sampler.prepare(&plan, &[], pts);
                frame_tag(&sampler.video_frame(&plan[0].clip, pts).unwrap()).unwrap()
            })
            .collect();
        assert_eq!(got, vec![20, 19, 18, 17, 16]);
    }
}
