//! Turns the scene at the playhead into output frames.
//!
//! For every frame the composer snapshots the active clips under the scene
//! lock, pulls pictures and samples through the [`Sampler`], builds a
//! render graph and hands it to the injected [`GraphExecutor`]. Audio
//! bypasses the graph: each clip's samples are filtered, weighted by its
//! transition and mixed per track.

use crate::cadence::AudioCadence;
use crate::plan::{build_render_graph, plan_layers, Pictures, Plan};
use crate::sampler::Sampler;
use montage_audio::convert::{from_f32, to_f32};
use montage_audio::Mixer;
use montage_core::{
    BufferPool, Frame, FramePool, MediaMarker, MontageError, PipelineConfig, Profile, Pts, Result,
};
use montage_effects::{audio_gains, Filter};
use montage_gpu::GraphExecutor;
use montage_timeline::{Clip, SharedScene, TrackMix};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, trace};

/// Nearest-sample resize of interleaved `input` to `frames` frames.
fn stretch(input: &[f32], channels: usize, frames: usize) -> Vec<f32> {
    let channels = channels.max(1);
    let have = input.len() / channels;
    if have == frames {
        return input.to_vec();
    }
    let mut out = vec![0.0; frames * channels];
    if have == 0 {
        return out;
    }
    for (i, dst) in out.chunks_exact_mut(channels).enumerate() {
        let src = (i * have / frames.max(1)).min(have - 1) * channels;
        dst.copy_from_slice(&input[src..src + channels]);
    }
    out
}

pub struct Composer {
    scene: SharedScene,
    config: PipelineConfig,
    profile: Profile,
    sampler: Sampler,
    executor: Option<Box<dyn GraphExecutor>>,
    video_pool: FramePool,
    audio_pool: FramePool,
    mixer: Mixer,
    cadence: AudioCadence,
    marker: MediaMarker,
    /// Timestamp of the next frame to render.
    pts: Pts,
    /// Timestamp of the last rendered picture.
    shown: Option<Pts>,
    backward: bool,
    running: Arc<AtomicBool>,
    scratch: Vec<f32>,
}

impl Composer {
    pub fn new(scene: SharedScene, config: &PipelineConfig, buffers: &BufferPool) -> Self {
        let profile = scene.lock().profile().clone();
        let frames = config.output_frames.max(1);
        Self {
            sampler: Sampler::new(&profile, config, buffers),
            video_pool: FramePool::new("composer video", frames, buffers),
            audio_pool: FramePool::new("composer audio", frames, buffers),
            mixer: Mixer::new(0),
            cadence: AudioCadence::new(&profile),
            marker: MediaMarker {
                provider: MediaMarker::new_provider(),
                marker: 0,
            },
            pts: 0.0,
            shown: None,
            backward: false,
            running: Arc::new(AtomicBool::new(true)),
            scratch: Vec::new(),
            scene,
            config: config.clone(),
            profile,
            executor: None,
        }
    }

    /// Inject the render backend. Composing without one fails with
    /// [`MontageError::NotInitialized`].
    pub fn set_executor(&mut self, executor: Box<dyn GraphExecutor>) {
        info!("Composer renders with the {} backend", executor.name());
        self.executor = Some(executor);
    }

    pub fn with_executor(mut self, executor: Box<dyn GraphExecutor>) -> Self {
        self.set_executor(executor);
        self
    }

    /// Flag that keeps blocking waits alive; cleared to stop the composer.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    #[inline]
    pub fn pts(&self) -> Pts {
        self.pts
    }

    #[inline]
    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.config.poll_interval()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Move the playhead. The timestamp snaps to the frame grid.
    pub fn seek(&mut self, pts: Pts, backward: bool) {
        let pts = self.profile.frame_rate.quantize(pts).max(0.0);
        info!(
            "Composer seek to {:.0} ({})",
            pts,
            if backward { "backward" } else { "forward" }
        );
        self.pts = pts;
        self.shown = None;
        self.backward = backward;
        self.marker.marker += 1;
        self.sampler.seek(backward);
        self.cadence.reset();
        let mut scene = self.scene.lock();
        scene.current_pts = pts;
        scene.current_pts_audio = pts;
    }

    /// Whether the playhead left the timeline in the playing direction.
    pub fn at_end(&self) -> bool {
        if self.backward {
            self.pts < 0.0
        } else {
            self.pts >= self.scene.lock().duration()
        }
    }

    /// Whether an edit touched the picture on screen since the last call.
    pub fn take_update(&self) -> bool {
        self.scene.lock().take_update()
    }

    fn apply_profile(&mut self, profile: Profile) {
        info!("Composer profile changed to {}", profile);
        self.sampler.set_profile(&profile);
        self.cadence = AudioCadence::new(&profile);
        self.pts = profile.frame_rate.quantize(self.pts);
        self.profile = profile;
    }

    /// Snapshot the scene at `pts` and position the inputs for it.
    fn plan(&mut self, pts: Pts) -> Plan {
        let (plan, upcoming, profile) = {
            let mut scene = self.scene.lock();
            scene.current_pts = pts;
            let plan = plan_layers(&scene, pts);
            let upcoming: Vec<Clip> = if self.backward {
                Vec::new()
            } else {
                scene
                    .clips_starting_within(pts, pts + self.config.forward_lookup_us)
                    .into_iter()
                    .cloned()
                    .collect()
            };
            let profile = (*scene.profile() != self.profile).then(|| scene.profile().clone());
            (plan, upcoming, profile)
        };
        if let Some(profile) = profile {
            self.apply_profile(profile);
        }
        self.sampler.prepare(&plan, &upcoming, pts);
        plan
    }

    /// Wait for a free frame from `pool`. An empty pool is backpressure;
    /// only stopping the composer ends the wait.
    fn acquire(&self, pool: &FramePool) -> Result<Frame> {
        loop {
            if let Some(f) = pool.acquire() {
                return Ok(f);
            }
            if !self.running.load(Ordering::Acquire) {
                return Err(MontageError::Internal(format!("{} stopped", pool.label())));
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    fn render_video(&mut self, plan: &Plan, pts: Pts) -> Result<Frame> {
        if self.executor.is_none() {
            return Err(MontageError::NotInitialized("no render backend injected".into()));
        }
        let mut layers: SmallVec<[Frame; 4]> = SmallVec::new();
        let mut pictures: SmallVec<[Pictures; 4]> = SmallVec::new();
        for layer in plan.iter() {
            let mut pics = Pictures::default();
            if let Some(f) = self.sampler.video_frame(&layer.clip, pts) {
                pics.clip = Some(layers.len());
                layers.push(f);
            }
            if let Some(out) = &layer.outgoing {
                if let Some(f) = self.sampler.video_frame(out, pts) {
                    pics.outgoing = Some(layers.len());
                    layers.push(f);
                }
            }
            pictures.push(pics);
        }

        let graph = build_render_graph(plan, &pictures, pts, &self.profile);
        trace!("Frame {:.0}: {} layers, {} nodes", pts, layers.len(), graph.node_count());

        let mut target = self.acquire(&self.video_pool)?;
        target.profile = self.profile.clone();
        target.pts = pts;
        let refs: SmallVec<[&Frame; 4]> = layers.iter().collect();
        let executor = self
            .executor
            .as_mut()
            .ok_or_else(|| MontageError::NotInitialized("no render backend injected".into()))?;
        executor.execute(&graph, &refs, &mut target)?;
        target.pts = pts;
        target.marker = self.marker;
        self.marker.marker += 1;
        target.mark_delivered();
        self.shown = Some(pts);
        Ok(target)
    }

    /// `samples` frames of `clip`'s audio at timeline `pts` as interleaved
    /// f32, resampled for the clip speed and run through its filters.
    fn clip_audio(&mut self, clip: &Clip, pts: Pts, samples: usize) -> Option<Vec<f32>> {
        let channels = self.profile.channels.max(1) as usize;
        let wanted = ((samples as f64) * clip.speed()).round().max(1.0) as usize;
        let frame = self.sampler.audio_frame(clip, wanted)?;
        to_f32(frame.data(), frame.profile.sample_format, &mut self.scratch);
        frame.release();
        let mut block = stretch(&self.scratch, channels, samples);
        let source_pts = clip.source_pts(pts);
        let sample_duration = self.profile.samples_duration(1) * clip.speed();
        for filter in clip.audio_filters_at(pts) {
            if let Filter::Audio(f) = filter {
                f.process(source_pts, &mut block, channels, sample_duration);
            }
        }
        Some(block)
    }

    fn render_audio(&mut self, plan: &Plan, pts: Pts) -> Result<Frame> {
        let samples = self.cadence.next_count();
        let channels = self.profile.channels.max(1) as usize;
        let mixes: Vec<(TrackMix, bool)> = self
            .scene
            .lock()
            .tracks()
            .iter()
            .map(|t| (t.mix, t.muted))
            .collect();
        let tracks = mixes.len();
        self.mixer.set_channel_count(tracks);
        for (index, (mix, muted)) in mixes.into_iter().enumerate() {
            if let Some(ch) = self.mixer.channel_mut(index) {
                ch.volume = mix.volume;
                ch.pan = mix.pan;
                ch.solo = mix.solo;
                ch.muted = muted;
            }
        }

        let mut blocks: Vec<Option<Vec<f32>>> = vec![None; tracks];
        for layer in plan.iter() {
            if layer.muted {
                continue;
            }
            let (gain_out, gain_in) = match &layer.transition {
                Some(t) => audio_gains(t.progress(pts)),
                None => (0.0, 1.0),
            };
            let mut block: Option<Vec<f32>> = None;
            let mut add = |samples: Vec<f32>, gain: f32| {
                let dst = block.get_or_insert_with(|| vec![0.0; samples.len()]);
                for (d, s) in dst.iter_mut().zip(&samples) {
                    *d += s * gain;
                }
            };
            if let Some(s) = self.clip_audio(&layer.clip, pts, samples) {
                add(s, gain_in);
            }
            if let (Some(out), Some(_)) = (&layer.outgoing, &layer.transition) {
                if let Some(s) = self.clip_audio(out, pts, samples) {
                    add(s, gain_out);
                }
            }
            if let Some(slot) = blocks.get_mut(layer.track) {
                *slot = block;
            }
        }

        let sources: Vec<Option<&[f32]>> = blocks.iter().map(|b| b.as_deref()).collect();
        let mut mixed = vec![0.0; samples * channels];
        self.mixer.mix(&sources, channels, &mut mixed);

        let mut frame = self.acquire(&self.audio_pool)?;
        frame.set_audio_frame(&self.profile, samples, pts);
        from_f32(&mixed, self.profile.sample_format, frame.data_mut());
        frame.marker = self.marker;
        frame.audio_reversed = self.backward;
        frame.mark_delivered();
        Ok(frame)
    }

    /// Render the picture and sound at the playhead, then advance it one
    /// frame in the playing direction.
    pub fn render(&mut self) -> Result<(Frame, Frame)> {
        let pts = self.pts;
        let plan = self.plan(pts);
        let video = self.render_video(&plan, pts)?;
        let audio = self.render_audio(&plan, pts)?;
        self.scene.lock().current_pts_audio = pts;
        let step = self.profile.frame_duration();
        self.pts = if self.backward { pts - step } else { pts + step };
        Ok((video, audio))
    }

    /// Render a single picture at `pts` without playing, as for scrubbing
    /// or thumbnails. The playhead moves to `pts`.
    pub fn run_one_shot(&mut self, pts: Pts) -> Result<Frame> {
        let pts = self.profile.frame_rate.quantize(pts).max(0.0);
        if self.shown.map_or(true, |s| (s - pts).abs() > self.profile.frame_duration() / 2.0) {
            self.seek(pts, self.backward);
        }
        let plan = self.plan(pts);
        let frame = self.render_video(&plan, pts)?;
        debug!("One-shot frame at {:.0}", pts);
        Ok(frame)
    }

    /// Render the picture on screen again, after an edit touched it.
    pub fn refresh(&mut self) -> Result<Frame> {
        let pts = self.shown.unwrap_or(self.pts);
        let plan = self.plan(pts);
        self.render_video(&plan, pts)
    }

    /// Close every input.
    pub fn close_inputs(&mut self) {
        self.sampler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::{seconds, FrameRate};
    use montage_effects::Gain;
    use montage_gpu::CpuExecutor;
    use montage_media::{audio_sample, SyntheticSource};
    use montage_timeline::{Chain, PlacedFilter, Scene, SceneEdit, Source};

    fn profile() -> Profile {
        Profile {
            sample_rate: 8000,
            ..Profile::project(8, 8, FrameRate::FPS_25)
        }
    }

    fn composer(scene: Scene) -> Composer {
        Composer::new(scene.into_shared(), &PipelineConfig::default(), &BufferPool::default())
            .with_executor(Box::new(CpuExecutor::new()))
    }

    fn source(duration: f64) -> Arc<Source> {
        let media = SyntheticSource::new("composed", seconds(duration))
            .with_video(8, 8, FrameRate::FPS_25)
            .with_audio();
        Source::probe(Arc::new(media)).unwrap()
    }

    fn scene_with(clips: &[(usize, f64, f64)]) -> Scene {
        let mut scene = Scene::with_tracks(profile(), &PipelineConfig::default(), 2);
        for &(track, pos, len) in clips {
            let clip = scene.create_clip(source(30.0), seconds(pos), 0.0, seconds(len));
            SceneEdit::AddClip { clip, track }.apply(&mut scene).unwrap();
        }
        scene
    }

    #[test]
    fn test_stretch_nearest() {
        let input = [1.0, 10.0, 2.0, 20.0];
        assert_eq!(stretch(&input, 2, 4), vec![1.0, 10.0, 1.0, 10.0, 2.0, 20.0, 2.0, 20.0]);
        assert_eq!(stretch(&input, 2, 2), input.to_vec());
        assert_eq!(stretch(&[], 2, 2), vec![0.0; 4]);
    }

    #[test]
    fn test_no_backend_is_an_initialization_error() {
        let scene = scene_with(&[(0, 0.0, 2.0)]);
        let mut c = Composer::new(scene.into_shared(), &PipelineConfig::default(), &BufferPool::default());
        assert!(matches!(c.render(), Err(MontageError::NotInitialized(_))));
    }

    #[test]
    fn test_playback_steps_one_frame() {
        let mut c = composer(scene_with(&[(0, 0.0, 2.0)]));
        let d = profile().frame_duration();
        for i in 0..10 {
            let (video, audio) = c.render().unwrap();
            assert_eq!(video.pts, i as f64 * d);
            assert_eq!(video.width(), 8);
            assert_eq!(audio.audio_samples(), 320);
            assert_eq!(audio.pts, video.pts);
        }
        assert_eq!(c.pts(), 10.0 * d);
    }

    #[test]
    fn test_audio_follows_source() {
        let mut c = composer(scene_with(&[(0, 0.0, 2.0)]));
        let (_, audio) = c.render().unwrap();
        let mut samples = Vec::new();
        to_f32(audio.data(), audio.profile.sample_format, &mut samples);
        // Two channels at unity gain.
        for i in 0..320 {
            assert!((samples[i * 2] - audio_sample(i as u64)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_audio_filters_apply() {
        let mut scene = scene_with(&[(0, 0.0, 2.0)]);
        let id = scene.track(0).unwrap().clips()[0].id();
        SceneEdit::AddFilter {
            clip: id,
            chain: Chain::Audio,
            filter: PlacedFilter::whole(Filter::audio(Gain::new(0.0))),
        }
        .apply(&mut scene)
        .unwrap();
        let mut c = composer(scene);
        let (_, audio) = c.render().unwrap();
        let mut samples = Vec::new();
        to_f32(audio.data(), audio.profile.sample_format, &mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_muted_track_is_silent() {
        let mut scene = scene_with(&[(0, 0.0, 2.0)]);
        assert!(scene.set_muted(0, true));
        let mut c = composer(scene);
        let (_, audio) = c.render().unwrap();
        let mut samples = Vec::new();
        to_f32(audio.data(), audio.profile.sample_format, &mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_track_mix_reaches_output() {
        let mut scene = scene_with(&[(0, 0.0, 2.0), (1, 0.0, 2.0)]);
        let mix = TrackMix {
            volume: 0.5,
            solo: true,
            ..TrackMix::default()
        };
        SceneEdit::SetTrackMix { track: 1, mix }.apply(&mut scene).unwrap();
        let mut c = composer(scene);
        let (_, audio) = c.render().unwrap();
        let mut samples = Vec::new();
        to_f32(audio.data(), audio.profile.sample_format, &mut samples);
        // Only the soloed track sounds, at half level.
        for i in 0..320 {
            assert!((samples[i * 2] - 0.5 * audio_sample(i as u64)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_end_of_timeline() {
        let mut c = composer(scene_with(&[(0, 0.0, 0.2)]));
        let mut frames = 0;
        while !c.at_end() {
            c.render().unwrap();
            frames += 1;
        }
        assert_eq!(frames, 5);
    }

    #[test]
    fn test_one_shot_renders_requested_frame() {
        let mut c = composer(scene_with(&[(0, 0.0, 2.0)]));
        let frame = c.run_one_shot(seconds(1.0)).unwrap();
        assert_eq!(frame.pts, seconds(1.0));
        assert_eq!(c.sampler().input_count(), 1);
    }

    #[test]
    fn test_empty_scene_renders_black() {
        let mut c = composer(scene_with(&[]));
        let frame = c.run_one_shot(0.0).unwrap();
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_output_pool_is_backpressure() {
        let mut c = composer(scene_with(&[(0, 0.0, 2.0)]));
        let held: Vec<Frame> = (0..4).map(|_| c.render().unwrap().0).collect();
        let flag = c.running_flag();
        flag.store(false, Ordering::Release);
        assert!(c.render().is_err());
        drop(held);
        flag.store(true, Ordering::Release);
        assert!(c.render().is_ok());
    }
}
