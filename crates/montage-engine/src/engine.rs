//! The composer thread and its control surface.

use crate::composer::Composer;
use crate::sink::FrameSink;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use montage_core::{Frame, MontageError, Profile, Pts, Result};
use montage_media::MediaSource;
use montage_timeline::{SceneEdit, SharedScene};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

enum Control {
    Seek { pts: Pts, backward: bool },
    Play(bool),
    OneShot { pts: Pts, reply: Sender<Result<Frame>> },
}

/// Runs a [`Composer`] on its own thread, pushing frames to a sink while
/// playing and re-rendering the picture on screen when an edit touches it
/// while paused. Render backends only ever run on that thread.
pub struct Engine {
    scene: SharedScene,
    control: Sender<Control>,
    sink: Arc<dyn FrameSink>,
    running: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Start the composer thread, paused at the composer's playhead.
    pub fn start(composer: Composer, sink: Arc<dyn FrameSink>) -> Result<Self> {
        let scene = Arc::clone(composer.scene());
        let running = composer.running_flag();
        running.store(true, Ordering::Release);
        let playing = Arc::new(AtomicBool::new(false));
        let (control, rx) = crossbeam_channel::unbounded();
        let worker = ComposerLoop {
            composer,
            sink: Arc::clone(&sink),
            rx,
            running: Arc::clone(&running),
            playing: Arc::clone(&playing),
        };
        let thread = thread::Builder::new()
            .name("montage-composer".into())
            .spawn(move || worker.run())?;
        info!("Engine started");
        Ok(Self {
            scene,
            control,
            sink,
            running,
            playing,
            thread: Some(thread),
        })
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    fn send(&self, msg: Control) -> Result<()> {
        self.control
            .send(msg)
            .map_err(|_| MontageError::Internal("composer thread is gone".into()))
    }

    /// Move the playhead and set the direction of playback.
    pub fn seek(&self, pts: Pts, backward: bool) -> Result<()> {
        self.send(Control::Seek { pts, backward })
    }

    pub fn play(&self, on: bool) -> Result<()> {
        self.send(Control::Play(on))
    }

    /// Whether the composer is playing. Turns false at either end of the
    /// timeline.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Render one picture at `pts` on the composer thread and wait for it.
    pub fn render_one_shot(&self, pts: Pts) -> Result<Frame> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.send(Control::OneShot { pts, reply })?;
        rx.recv()
            .map_err(|_| MontageError::Internal("composer thread is gone".into()))?
    }

    /// Apply a structural edit under the scene lock.
    pub fn apply(&self, edit: SceneEdit) -> Result<()> {
        edit.apply(&mut self.scene.lock())
    }

    /// Change the project format; inputs reopen for it on the next frame.
    pub fn set_profile(&self, profile: Profile) {
        self.scene.lock().set_profile(profile);
    }

    /// Describe a source without touching playback state.
    pub fn probe(source: &dyn MediaSource) -> Result<Profile> {
        source.probe()
    }

    /// Stop the composer thread and close its inputs.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.sink.close();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Composer thread panicked");
            }
            info!("Engine stopped");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ComposerLoop {
    composer: Composer,
    sink: Arc<dyn FrameSink>,
    rx: Receiver<Control>,
    running: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
}

impl ComposerLoop {
    fn handle(&mut self, msg: Control) {
        match msg {
            Control::Seek { pts, backward } => self.composer.seek(pts, backward),
            Control::Play(on) => {
                info!("Composer {}", if on { "playing" } else { "paused" });
                self.playing.store(on, Ordering::Release);
            }
            Control::OneShot { pts, reply } => {
                let _ = reply.send(self.composer.run_one_shot(pts));
            }
        }
    }

    /// Next control message; waits up to `wait` when given.
    fn next(&self, wait: Option<Duration>) -> Option<Control> {
        match wait {
            Some(wait) => match self.rx.recv_timeout(wait) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.running.store(false, Ordering::Release);
                    None
                }
            },
            None => match self.rx.try_recv() {
                Ok(msg) => Some(msg),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::Release);
                    None
                }
            },
        }
    }

    fn run(mut self) {
        let poll = self.composer.poll_interval();
        while self.running.load(Ordering::Acquire) {
            let playing = self.playing.load(Ordering::Acquire);
            let wait = (!playing).then_some(poll);
            if let Some(msg) = self.next(wait) {
                self.handle(msg);
                continue;
            }

            if playing {
                self.play_one();
            } else if self.composer.take_update() {
                debug!("Scene changed under the playhead, refreshing");
                match self.composer.refresh() {
                    Ok(frame) => self.sink.video_frame(frame),
                    Err(e) => warn!("Refresh failed: {}", e),
                }
            }
        }
        self.composer.close_inputs();
    }

    fn play_one(&mut self) {
        if self.composer.at_end() {
            info!("Reached end of timeline at {:.0}", self.composer.pts());
            self.playing.store(false, Ordering::Release);
            self.sink.end_of_stream();
            return;
        }
        match self.composer.render() {
            Ok((video, audio)) => {
                self.sink.video_frame(video);
                self.sink.audio_frame(audio);
            }
            Err(e) => {
                warn!("Composition failed, pausing: {}", e);
                self.playing.store(false, Ordering::Release);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, SinkEvent};
    use montage_core::{seconds, BufferPool, FrameRate, PipelineConfig};
    use montage_gpu::CpuExecutor;
    use montage_media::SyntheticSource;
    use montage_timeline::{Scene, Source};

    fn profile() -> Profile {
        Profile {
            sample_rate: 8000,
            ..Profile::project(8, 8, FrameRate::FPS_25)
        }
    }

    fn engine(clip_secs: f64) -> (Engine, Receiver<SinkEvent>) {
        engine_with_sink(clip_secs, 8)
    }

    fn engine_with_sink(clip_secs: f64, capacity: usize) -> (Engine, Receiver<SinkEvent>) {
        let media = SyntheticSource::new("engine", seconds(10.0))
            .with_video(8, 8, FrameRate::FPS_25)
            .with_audio();
        let source = Source::probe(Arc::new(media)).unwrap();
        let mut scene = Scene::with_tracks(profile(), &PipelineConfig::default(), 1);
        let clip = scene.create_clip(source, 0.0, 0.0, seconds(clip_secs));
        SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene).unwrap();
        scene.take_update();

        let composer = Composer::new(scene.into_shared(), &PipelineConfig::default(), &BufferPool::default())
            .with_executor(Box::new(CpuExecutor::new()));
        let (sink, rx) = ChannelSink::new(capacity);
        (Engine::start(composer, Arc::new(sink)).unwrap(), rx)
    }

    #[test]
    fn test_plays_to_end_of_timeline() {
        let (engine, rx) = engine(0.4);
        engine.play(true).unwrap();
        let mut video = Vec::new();
        let mut audio = 0;
        loop {
            match rx.recv_timeout(Duration::from_secs(10)).unwrap() {
                SinkEvent::Video(f) => video.push(f.pts),
                SinkEvent::Audio(_) => audio += 1,
                SinkEvent::EndOfStream => break,
            }
        }
        let d = profile().frame_duration();
        assert_eq!(video, (0..10).map(|i| i as f64 * d).collect::<Vec<_>>());
        assert_eq!(audio, 10);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_stop_with_unread_sink() {
        let (engine, rx) = engine_with_sink(2.0, 1);
        engine.play(true).unwrap();
        // The first picture fills the channel; its sound blocks behind it.
        while rx.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        let (done, stopped) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            drop(engine);
            let _ = done.send(());
        });
        assert!(stopped.recv_timeout(Duration::from_secs(10)).is_ok());
        drop(rx);
    }

    #[test]
    fn test_one_shot_round_trip() {
        let (engine, _rx) = engine(2.0);
        let frame = engine.render_one_shot(seconds(1.0)).unwrap();
        assert_eq!(frame.pts, seconds(1.0));
    }

    #[test]
    fn test_edit_under_playhead_refreshes() {
        let (engine, rx) = engine(2.0);
        let id = engine.scene().lock().track(0).unwrap().clips()[0].id();
        engine
            .apply(SceneEdit::Resize {
                clip: id,
                track: 0,
                length: seconds(1.0),
            })
            .unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(10)),
            Ok(SinkEvent::Video(_))
        ));
    }

    #[test]
    fn test_rejected_edit_reports_placement() {
        let (engine, _rx) = engine(2.0);
        let source = Arc::clone(engine.scene().lock().track(0).unwrap().clips()[0].source());
        let inside = engine
            .scene()
            .lock()
            .create_clip(source, seconds(0.5), 0.0, seconds(1.0));
        let err = engine
            .apply(SceneEdit::AddClip {
                clip: inside,
                track: 0,
            })
            .unwrap_err();
        assert!(matches!(err, MontageError::Placement(_)));
    }
}
