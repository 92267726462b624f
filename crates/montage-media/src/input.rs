//! Per-source decode thread with forward and backward playback.
//!
//! The control side calls [`Input::open_seek_play`], which takes the seek
//! gate before handing the request to a fresh decode thread; the thread
//! releases the gate once the seek is done. Frame requests pass through the
//! same gate, so a consumer never sees frames from before the latest seek.
//!
//! Forward playback decodes into a fixed pool of frames and retimes video
//! to the output rate. Backward playback decodes one-second windows in
//! forward order, then reverses them into the output queues.

use crate::decoder::{MediaDecoder, MediaSource};
use crate::resampler::{Resample, VideoResampler};
use crossbeam_channel::{Receiver, Sender};
use montage_audio::{AudioFrame, AudioFrameList};
use montage_core::{
    BufferPool, Frame, FramePool, MediaMarker, PipelineConfig, Profile, Pts, MICROSECOND,
    PTS_EPSILON,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Marker jump applied on every seek.
const SEEK_MARKER_STEP: u64 = 1000;

/// Binary semaphore ordering seeks before frame requests. Unlike a mutex
/// it may be released by a thread other than the one that acquired it.
struct SeekGate {
    busy: Mutex<bool>,
    cv: Condvar,
}

impl SeekGate {
    fn new() -> Self {
        Self {
            busy: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.cv.wait(&mut busy);
        }
        *busy = true;
    }

    fn release(&self) {
        *self.busy.lock() = false;
        self.cv.notify_one();
    }

    /// Acquire for the lifetime of the returned guard.
    fn enter(&self) -> GateGuard<'_> {
        self.acquire();
        GateGuard(self)
    }
}

struct GateGuard<'a>(&'a SeekGate);

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// State shared between the control side, the consumer and the decode
/// thread.
struct Shared {
    gate: SeekGate,
    running: AtomicBool,
    backward: AtomicBool,
    have_video: AtomicBool,
    have_audio: AtomicBool,
    eof_video: AtomicBool,
    eof_audio: AtomicBool,
    video_tx: Sender<Frame>,
    video_rx: Receiver<Frame>,
    /// Reversed backward-playback frames, not pooled.
    reordered: Mutex<VecDeque<Frame>>,
    /// Last decoded picture, served again once video has ended.
    last_frame: Mutex<Option<Frame>>,
    video_pool: FramePool,
    audio_pool: FramePool,
    audio: AudioFrameList,
    out_profile: Mutex<Profile>,
    in_profile: Mutex<Option<Profile>>,
    source_name: Mutex<Option<String>>,
    config: PipelineConfig,
}

impl Shared {
    fn set_eof(&self, video: bool, audio: bool) {
        self.eof_video.store(video, Ordering::Release);
        self.eof_audio.store(audio, Ordering::Release);
    }

    /// Block until the pool hands out a frame, or give up once decoding
    /// stopped and nothing can come back.
    fn acquire_free(&self, pool: &FramePool) -> Option<Frame> {
        loop {
            if let Some(f) = pool.acquire() {
                return Some(f);
            }
            if !self.running.load(Ordering::Acquire) {
                return None;
            }
            thread::sleep(self.config.poll_interval());
        }
    }
}

struct SeekRequest {
    source: Arc<dyn MediaSource>,
    pts: Pts,
    backward: bool,
}

/// Outcome of one decode call.
enum Decoded<T> {
    Got(T),
    /// The decoder reached the end of the file.
    End,
    /// The decoder failed; the stream is over for this input.
    Failed,
}

/// One backward-playback window, decoded in forward order.
#[derive(Default)]
struct Window {
    start: Pts,
    video_end: Pts,
    audio_end: Pts,
    video: Vec<Frame>,
    audio: Vec<AudioFrame>,
    video_done: bool,
    audio_done: bool,
    /// The window reaches the start of the stream.
    last: bool,
}

/// Decode-thread state. Moved into the thread while it runs and handed
/// back on join.
struct Worker {
    shared: Arc<Shared>,
    buffers: BufferPool,
    source: Option<Arc<dyn MediaSource>>,
    decoder: Option<Box<dyn MediaDecoder>>,
    /// Output profile the decoder was opened for.
    opened_for: Option<Profile>,
    request: Option<SeekRequest>,
    resampler: VideoResampler,
    marker: MediaMarker,
    video_ended: bool,
    audio_ended: bool,
    window: Window,
}

/// Releases the seek gate when the request has been handled, even if the
/// decoder panicked.
struct GateRelease(Arc<Shared>);

impl Drop for GateRelease {
    fn drop(&mut self) {
        self.0.gate.release();
    }
}

impl Worker {
    fn new(shared: Arc<Shared>, buffers: BufferPool) -> Self {
        let duration = shared.out_profile.lock().frame_duration();
        Self {
            shared,
            buffers,
            source: None,
            decoder: None,
            opened_for: None,
            request: None,
            resampler: VideoResampler::new(duration, true),
            marker: MediaMarker {
                provider: MediaMarker::new_provider(),
                marker: 0,
            },
            video_ended: false,
            audio_ended: false,
            window: Window::default(),
        }
    }

    fn source_name(&self) -> &str {
        self.source.as_ref().map(|s| s.name()).unwrap_or("<none>")
    }

    fn run(mut self: Box<Self>) -> Box<Self> {
        if let Some(request) = self.request.take() {
            let _release = GateRelease(Arc::clone(&self.shared));
            self.seek_and_play(request);
        }
        if self.decoder.is_none() {
            self.shared.set_eof(true, true);
            self.shared.running.store(false, Ordering::Release);
            return self;
        }
        if self.shared.backward.load(Ordering::Acquire) {
            self.run_backward();
        } else {
            self.run_forward();
        }
        self.shared.running.store(false, Ordering::Release);
        self
    }

    fn seek_and_play(&mut self, request: SeekRequest) {
        let out = self.shared.out_profile.lock().clone();
        let same_source = self
            .source
            .as_ref()
            .is_some_and(|s| s.name() == request.source.name());
        if !same_source || self.decoder.is_none() || self.opened_for.as_ref() != Some(&out) {
            self.open(request.source, &out);
        }
        self.seek(request.pts, request.backward);
    }

    fn open(&mut self, source: Arc<dyn MediaSource>, out: &Profile) {
        self.decoder = None;
        self.flush();
        match source.open(out) {
            Ok(decoder) => {
                let profile = decoder.profile().clone();
                info!("Opened {}: {}", source.name(), profile);
                self.shared.have_video.store(profile.has_video, Ordering::Release);
                self.shared.have_audio.store(profile.has_audio, Ordering::Release);
                self.resampler = VideoResampler::new(
                    out.frame_duration(),
                    profile.frame_rate == out.frame_rate,
                );
                *self.shared.in_profile.lock() = Some(profile);
                self.decoder = Some(decoder);
            }
            Err(e) => {
                warn!("Cannot open {}: {}", source.name(), e);
                self.shared.have_video.store(false, Ordering::Release);
                self.shared.have_audio.store(false, Ordering::Release);
                *self.shared.in_profile.lock() = None;
            }
        }
        *self.shared.source_name.lock() = Some(source.name().to_string());
        self.source = Some(source);
        self.opened_for = Some(out.clone());
    }

    /// Drop every frame produced under the previous seek target.
    fn flush(&mut self) {
        let shared = &self.shared;
        shared.video_rx.try_iter().for_each(Frame::release);
        shared.reordered.lock().clear();
        *shared.last_frame.lock() = None;
        let out = shared.out_profile.lock().clone();
        shared.audio.reset(&out, shared.config.audio_list_seconds);
        self.window = Window::default();
        self.resampler.reset();
        self.video_ended = false;
        self.audio_ended = false;
        shared.set_eof(false, false);
    }

    fn seek(&mut self, pts: Pts, backward: bool) {
        self.flush();
        self.marker.marker += SEEK_MARKER_STEP;
        info!(
            "Seek {} to {:.0} ({})",
            self.source_name(),
            pts,
            if backward { "backward" } else { "forward" }
        );
        if backward {
            if self.decoder.is_none() {
                self.shared.set_eof(true, true);
            } else {
                self.start_window(pts, pts);
            }
            return;
        }
        let result = match self.decoder.as_mut() {
            Some(decoder) => decoder.seek(pts),
            None => {
                self.shared.set_eof(true, true);
                return;
            }
        };
        if let Err(e) = result {
            warn!("Seek failed in {}: {}", self.source_name(), e);
            self.shared.set_eof(true, true);
        }
    }

    fn next_marker(&mut self) -> MediaMarker {
        let m = self.marker;
        self.marker.marker += 1;
        m
    }

    fn streams(&self) -> (bool, bool) {
        (
            self.shared.have_video.load(Ordering::Acquire),
            self.shared.have_audio.load(Ordering::Acquire),
        )
    }

    fn run_forward(&mut self) {
        let shared = Arc::clone(&self.shared);
        let (has_video, has_audio) = self.streams();
        while shared.running.load(Ordering::Acquire) {
            let mut idle = true;

            if has_video && !shared.eof_video.load(Ordering::Acquire) {
                if let Some(frame) = shared.video_pool.acquire() {
                    self.forward_video(frame);
                    if self.video_ended && self.resampler.pending_repeats() == 0 {
                        shared.eof_video.store(true, Ordering::Release);
                    }
                    idle = false;
                }
            }

            if has_audio && !shared.eof_audio.load(Ordering::Acquire) && shared.audio.writable() {
                let mut af = AudioFrame::new(shared.audio.bytes_per_sample(), &self.buffers);
                if !matches!(self.decode_audio(&mut af), Decoded::Got(())) {
                    self.audio_ended = true;
                }
                shared.audio.append(af);
                if self.audio_ended {
                    shared.eof_audio.store(true, Ordering::Release);
                }
                idle = false;
            }

            let video_done = !has_video || shared.eof_video.load(Ordering::Acquire);
            let audio_done = !has_audio || shared.eof_audio.load(Ordering::Acquire);
            if video_done && audio_done {
                debug!("{} reached end of stream", self.source_name());
                break;
            }
            if idle {
                thread::sleep(shared.config.poll_interval());
            }
        }
    }

    fn forward_video(&mut self, mut frame: Frame) {
        if let Some(pts) = self.resampler.next_repeat() {
            let held = self.shared.last_frame.lock();
            match held.as_ref() {
                Some(last) => {
                    frame.share_video(last);
                    frame.pts = pts;
                    frame.marker = last.marker;
                    frame.is_duplicate = true;
                    drop(held);
                    self.queue_video(frame);
                }
                None => frame.release(),
            }
            return;
        }

        frame.marker = self.next_marker();
        let duration = match self.decode_video(&mut frame) {
            Decoded::Got(duration) => duration,
            Decoded::End | Decoded::Failed => {
                self.video_ended = true;
                frame.release();
                return;
            }
        };
        let pts = match self.resampler.push(frame.pts, duration) {
            Resample::Pass => frame.pts,
            Resample::Emit { pts, .. } => pts,
            Resample::Drop => {
                frame.release();
                return;
            }
        };
        frame.pts = pts;
        let mut hold = Frame::transient(&self.buffers);
        hold.share_video(&frame);
        hold.pts = pts;
        hold.marker = frame.marker;
        *self.shared.last_frame.lock() = Some(hold);
        self.queue_video(frame);
    }

    fn queue_video(&self, frame: Frame) {
        if let Err(e) = self.shared.video_tx.send(frame) {
            e.into_inner().release();
        }
    }

    /// Decode one video frame. A decode error ends the video stream.
    fn decode_video(&mut self, frame: &mut Frame) -> Decoded<Pts> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Decoded::Failed;
        };
        match decoder.decode_video(frame) {
            Ok(Some(duration)) => Decoded::Got(duration),
            Ok(None) => Decoded::End,
            Err(e) => {
                warn!("Video decode error in {}, ending video: {}", self.source_name(), e);
                self.video_ended = true;
                Decoded::Failed
            }
        }
    }

    /// Decode one audio chunk. A decode error ends the audio stream.
    fn decode_audio(&mut self, af: &mut AudioFrame) -> Decoded<()> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Decoded::Failed;
        };
        match decoder.decode_audio(af) {
            Ok(true) => Decoded::Got(()),
            Ok(false) => Decoded::End,
            Err(e) => {
                warn!("Audio decode error in {}, ending audio: {}", self.source_name(), e);
                self.audio_ended = true;
                Decoded::Failed
            }
        }
    }

    /// Seek to one second before `audio_end` and start collecting a window.
    fn start_window(&mut self, video_end: Pts, audio_end: Pts) {
        let (has_video, has_audio) = self.streams();
        let stream_start = self
            .shared
            .in_profile
            .lock()
            .as_ref()
            .map_or(0.0, |p| p.stream_start_time);
        let start = (video_end.min(audio_end) - MICROSECOND).max(stream_start);
        self.window = Window {
            start,
            video_end,
            audio_end,
            video_done: !has_video || self.video_ended,
            audio_done: !has_audio || self.audio_ended,
            last: start <= stream_start + PTS_EPSILON,
            ..Window::default()
        };
        debug!(
            "Backward window [{:.0}, {:.0}) in {}",
            start,
            video_end.max(audio_end),
            self.source_name()
        );
        let result = match self.decoder.as_mut() {
            Some(decoder) => decoder.seek(start),
            None => return,
        };
        if let Err(e) = result {
            warn!("Backward seek failed in {}: {}", self.source_name(), e);
            self.window.video_done = true;
            self.window.audio_done = true;
            self.window.last = true;
        }
    }

    fn run_backward(&mut self) {
        let shared = Arc::clone(&self.shared);
        while shared.running.load(Ordering::Acquire) {
            let mut idle = true;

            if !self.window.video_done {
                self.window_video();
                idle = false;
            }
            if !self.window.audio_done {
                self.window_audio();
                idle = false;
            }

            let drained = !shared.audio.readable(shared.config.backward_audio_low_water)
                && shared.reordered.lock().len() < shared.config.input_frames;
            if self.window.video_done && self.window.audio_done && drained {
                if self.feed_window() {
                    debug!("{} reached start of stream", self.source_name());
                    break;
                }
                idle = false;
            }
            if idle {
                thread::sleep(shared.config.poll_interval());
            }
        }
    }

    fn window_video(&mut self) {
        let mut frame = Frame::transient(&self.buffers);
        frame.marker = self.next_marker();
        // End of file only closes this window; earlier windows still play.
        match self.decode_video(&mut frame) {
            Decoded::Got(_) if frame.pts + PTS_EPSILON < self.window.video_end => {
                self.window.video.push(frame);
            }
            _ => self.window.video_done = true,
        }
    }

    fn window_audio(&mut self) {
        let bps = self.shared.audio.bytes_per_sample();
        let mut af = AudioFrame::new(bps, &self.buffers);
        if !matches!(self.decode_audio(&mut af), Decoded::Got(())) {
            self.window.audio_done = true;
            return;
        }
        let out = self.shared.out_profile.lock().clone();
        let span = out.samples_duration(af.available());
        if af.pts + span > self.window.audio_end - PTS_EPSILON {
            let keep = out.samples_in(self.window.audio_end - af.pts);
            af.truncate(keep);
            self.window.audio_done = true;
        }
        if af.available() > 0 {
            self.window.audio.push(af);
        }
    }

    /// Reverse the finished window into the output queues and start the
    /// next one. Returns true once the start of the stream was delivered.
    fn feed_window(&mut self) -> bool {
        let shared = Arc::clone(&self.shared);
        let window = std::mem::take(&mut self.window);
        let first_video = window.video.first().map(|f| f.pts);
        debug!(
            "Reversing window at {:.0}: {} frames, {} audio chunks",
            window.start,
            window.video.len(),
            window.audio.len()
        );

        shared.reordered.lock().extend(window.video.into_iter().rev());
        let sample_duration = shared.out_profile.lock().samples_duration(1);
        for mut af in window.audio.into_iter().rev() {
            af.reverse(sample_duration);
            shared.audio.append(af);
        }

        let stream_start = shared
            .in_profile
            .lock()
            .as_ref()
            .map_or(0.0, |p| p.stream_start_time);
        let at_start = window.last
            || first_video.is_some_and(|pts| pts <= stream_start + PTS_EPSILON);
        let (has_video, has_audio) = self.streams();
        let video_over = !has_video || self.video_ended;
        let audio_over = !has_audio || self.audio_ended;
        if at_start || (video_over && audio_over) {
            shared.set_eof(true, true);
            return true;
        }
        if video_over {
            shared.eof_video.store(true, Ordering::Release);
        }
        if audio_over {
            shared.eof_audio.store(true, Ordering::Release);
        }
        self.start_window(first_video.unwrap_or(window.start), window.start);
        false
    }
}

enum WorkerSlot {
    Idle(Box<Worker>),
    Running(JoinHandle<Box<Worker>>),
    Lost,
}

/// Decode engine for one source.
pub struct Input {
    shared: Arc<Shared>,
    buffers: BufferPool,
    worker: WorkerSlot,
}

impl Input {
    /// An idle input producing frames for `profile`.
    pub fn new(profile: &Profile, config: &PipelineConfig, buffers: &BufferPool) -> Self {
        let (video_tx, video_rx) = crossbeam_channel::unbounded();
        let frames = config.input_frames.max(1);
        let shared = Arc::new(Shared {
            gate: SeekGate::new(),
            running: AtomicBool::new(false),
            backward: AtomicBool::new(false),
            have_video: AtomicBool::new(false),
            have_audio: AtomicBool::new(false),
            eof_video: AtomicBool::new(true),
            eof_audio: AtomicBool::new(true),
            video_tx,
            video_rx,
            reordered: Mutex::new(VecDeque::new()),
            last_frame: Mutex::new(None),
            video_pool: FramePool::new("input video", frames, buffers),
            audio_pool: FramePool::new("input audio", frames, buffers),
            audio: AudioFrameList::new(profile, config.audio_list_seconds),
            out_profile: Mutex::new(profile.clone()),
            in_profile: Mutex::new(None),
            source_name: Mutex::new(None),
            config: config.clone(),
        });
        let worker = Box::new(Worker::new(Arc::clone(&shared), buffers.clone()));
        Self {
            shared,
            buffers: buffers.clone(),
            worker: WorkerSlot::Idle(worker),
        }
    }

    /// Stop the decode thread and take its state back.
    fn take_worker(&mut self) -> Box<Worker> {
        self.shared.running.store(false, Ordering::Release);
        match std::mem::replace(&mut self.worker, WorkerSlot::Lost) {
            WorkerSlot::Idle(w) => w,
            WorkerSlot::Running(handle) => match handle.join() {
                Ok(w) => w,
                Err(_) => {
                    warn!("Decode thread panicked, starting fresh");
                    Box::new(Worker::new(Arc::clone(&self.shared), self.buffers.clone()))
                }
            },
            WorkerSlot::Lost => {
                Box::new(Worker::new(Arc::clone(&self.shared), self.buffers.clone()))
            }
        }
    }

    fn spawn(&mut self, worker: Box<Worker>, holds_gate: bool) {
        self.shared.running.store(true, Ordering::Release);
        let name = format!("montage-input-{}", worker.marker.provider);
        match thread::Builder::new().name(name).spawn(move || worker.run()) {
            Ok(handle) => self.worker = WorkerSlot::Running(handle),
            Err(e) => {
                warn!("Cannot start decode thread: {}", e);
                self.shared.running.store(false, Ordering::Release);
                self.shared.set_eof(true, true);
                if holds_gate {
                    self.shared.gate.release();
                }
            }
        }
    }

    /// Open `source` if needed, seek to `pts` and start decoding in the
    /// given direction. Returns without waiting for the seek; frame
    /// requests block until it has completed.
    pub fn open_seek_play(&mut self, source: Arc<dyn MediaSource>, pts: Pts, backward: bool) {
        self.shared.gate.acquire();
        let mut worker = self.take_worker();
        self.shared.backward.store(backward, Ordering::Release);
        worker.request = Some(SeekRequest {
            source,
            pts,
            backward,
        });
        self.spawn(worker, true);
    }

    /// Resume or pause decoding without seeking.
    pub fn play(&mut self, on: bool) {
        if !on {
            let worker = self.take_worker();
            self.worker = WorkerSlot::Idle(worker);
        } else if !matches!(self.worker, WorkerSlot::Running(_)) {
            let worker = self.take_worker();
            self.spawn(worker, false);
        }
    }

    /// Change the output profile. The source is reopened on the next seek.
    pub fn set_profile(&mut self, profile: &Profile) {
        let mut worker = self.take_worker();
        let changed = *self.shared.out_profile.lock() != *profile;
        if changed {
            info!("Output profile changed to {}", profile);
            *self.shared.out_profile.lock() = profile.clone();
            worker.flush();
        }
        self.worker = WorkerSlot::Idle(worker);
    }

    /// Next video frame, blocking while the decoder catches up. `None`
    /// once video has ended and no frame can be held.
    pub fn get_video_frame(&self) -> Option<Frame> {
        let _gate = self.shared.gate.enter();
        let shared = &self.shared;
        if !shared.have_video.load(Ordering::Acquire) {
            return None;
        }
        if shared.backward.load(Ordering::Acquire) {
            return self.backward_video_frame();
        }
        loop {
            if let Ok(mut f) = shared.video_rx.try_recv() {
                f.mark_delivered();
                return Some(f);
            }
            let ended = shared.eof_video.load(Ordering::Acquire);
            if ended || !shared.running.load(Ordering::Acquire) {
                // The last frames may have landed just before the flag.
                if let Ok(mut f) = shared.video_rx.try_recv() {
                    f.mark_delivered();
                    return Some(f);
                }
                return if ended { self.hold_last_frame() } else { None };
            }
            thread::sleep(shared.config.poll_interval());
        }
    }

    fn hold_last_frame(&self) -> Option<Frame> {
        let shared = &self.shared;
        let last = shared.last_frame.lock().as_ref().map(|l| {
            let mut f = Frame::transient(&self.buffers);
            f.share_video(l);
            f.pts = l.pts;
            f.marker = l.marker;
            f
        })?;
        let mut f = shared.acquire_free(&shared.video_pool)?;
        f.share_video(&last);
        f.pts = last.pts;
        f.marker = last.marker;
        f.is_duplicate = true;
        f.mark_delivered();
        Some(f)
    }

    fn backward_video_frame(&self) -> Option<Frame> {
        let shared = &self.shared;
        loop {
            let next = shared.reordered.lock().pop_front();
            if let Some(src) = next {
                let mut f = shared.acquire_free(&shared.video_pool)?;
                f.share_video(&src);
                f.pts = src.pts;
                f.marker = src.marker;
                f.mark_delivered();
                return Some(f);
            }
            if shared.eof_video.load(Ordering::Acquire) || !shared.running.load(Ordering::Acquire) {
                return shared.reordered.lock().pop_front().and_then(|src| {
                    let mut f = shared.acquire_free(&shared.video_pool)?;
                    f.share_video(&src);
                    f.pts = src.pts;
                    f.marker = src.marker;
                    f.mark_delivered();
                    Some(f)
                });
            }
            thread::sleep(shared.config.poll_interval());
        }
    }

    /// Exactly `samples` samples of audio in the output format. At end of
    /// stream the available samples are padded with silence; `None` once
    /// nothing is left.
    pub fn get_audio_frame(&self, samples: usize) -> Option<Frame> {
        let _gate = self.shared.gate.enter();
        let shared = &self.shared;
        if !shared.have_audio.load(Ordering::Acquire) || samples == 0 {
            return None;
        }
        let mut f = shared.acquire_free(&shared.audio_pool)?;
        let out = shared.out_profile.lock().clone();
        let bps = out.bytes_per_sample();
        loop {
            if shared.audio.wait_readable(samples, shared.config.audio_wait()) {
                break;
            }
            if shared.eof_audio.load(Ordering::Acquire) || !shared.running.load(Ordering::Acquire) {
                if shared.audio.readable(samples) {
                    break;
                }
                f.set_audio_frame(&out, samples, shared.audio.read_pts());
                let got = shared.audio.read(f.data_mut(), samples);
                if got == 0 {
                    f.release();
                    return None;
                }
                f.data_mut()[got * bps..].fill(0);
                f.audio_reversed = shared.backward.load(Ordering::Acquire);
                f.mark_delivered();
                return Some(f);
            }
        }
        f.set_audio_frame(&out, samples, shared.audio.read_pts());
        shared.audio.read(f.data_mut(), samples);
        f.audio_reversed = shared.backward.load(Ordering::Acquire);
        f.mark_delivered();
        Some(f)
    }

    /// Format of the opened source, if it opened.
    pub fn source_profile(&self) -> Option<Profile> {
        self.shared.in_profile.lock().clone()
    }

    pub fn profile(&self) -> Profile {
        self.shared.out_profile.lock().clone()
    }

    pub fn has_video(&self) -> bool {
        self.shared.have_video.load(Ordering::Acquire)
    }

    pub fn has_audio(&self) -> bool {
        self.shared.have_audio.load(Ordering::Acquire)
    }

    pub fn eof_video(&self) -> bool {
        self.shared.eof_video.load(Ordering::Acquire)
    }

    pub fn eof_audio(&self) -> bool {
        self.shared.eof_audio.load(Ordering::Acquire)
    }

    pub fn is_backward(&self) -> bool {
        self.shared.backward.load(Ordering::Acquire)
    }

    /// Whether the decode thread is active.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Name of the source the decode thread last opened.
    pub fn source_name(&self) -> Option<String> {
        self.shared.source_name.lock().clone()
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        let mut worker = self.take_worker();
        worker.flush();
    }
}
