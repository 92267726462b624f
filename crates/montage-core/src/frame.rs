//! Pooled audio and video frames.
//!
//! Each pipeline stage owns a [`FramePool`] with a fixed number of frames.
//! A frame moves between queues by value and [`Frame::release`] sends it
//! back to the free queue it came from. Frames created with
//! [`Frame::transient`] have no origin and are simply dropped.

use crate::buffer::{Buffer, BufferPool};
use crate::profile::Profile;
use crate::time::Pts;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Payload carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameKind {
    #[default]
    None,
    /// YUV 4:2:0 planar
    Yuv420P,
    /// YUV 4:2:2 planar
    Yuv422P,
    /// 8-bit RGBA packed
    Rgba,
    /// 8-bit RGB packed
    Rgb,
    /// Pixels live in a GPU texture
    Texture,
    /// Interleaved audio samples
    Audio,
}

impl FrameKind {
    /// Bytes needed for a `width` x `height` picture.
    pub fn video_size(self, width: u32, height: u32) -> usize {
        let px = width as usize * height as usize;
        match self {
            Self::Yuv420P => px * 3 / 2,
            Self::Yuv422P => px * 2,
            Self::Rgba => px * 4,
            Self::Rgb => px * 3,
            Self::None | Self::Texture | Self::Audio => 0,
        }
    }

    #[inline]
    pub fn is_video(self) -> bool {
        matches!(
            self,
            Self::Yuv420P | Self::Yuv422P | Self::Rgba | Self::Rgb | Self::Texture
        )
    }
}

/// Lifecycle of a pooled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Free,
    InFlight,
    Delivered,
}

static NEXT_PROVIDER: AtomicU64 = AtomicU64::new(1);

/// Discontinuity tag. `provider` identifies the input that produced the
/// frame, `marker` advances with every real frame and jumps on seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MediaMarker {
    pub provider: u64,
    pub marker: u64,
}

impl MediaMarker {
    /// Allocate a process-unique provider id.
    pub fn new_provider() -> u64 {
        NEXT_PROVIDER.fetch_add(1, Ordering::Relaxed)
    }
}

/// Completion handle for GPU work that produced a frame's texture.
pub trait GpuFence: Send + Sync {
    /// Block until the GPU work has finished.
    fn wait(&self);
    fn is_signaled(&self) -> bool;
}

/// A texture borrowed from a GPU texture pool. Dropping the lease hands the
/// texture back.
pub struct TextureLease {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    on_release: Option<Box<dyn FnOnce(u64) + Send>>,
}

impl TextureLease {
    pub fn new(id: u64, width: u32, height: u32, on_release: Box<dyn FnOnce(u64) + Send>) -> Self {
        Self {
            id,
            width,
            height,
            on_release: Some(on_release),
        }
    }
}

impl Drop for TextureLease {
    fn drop(&mut self) {
        if let Some(f) = self.on_release.take() {
            f(self.id);
        }
    }
}

impl fmt::Debug for TextureLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureLease")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A decoded or composited unit of audio or video.
pub struct Frame {
    kind: FrameKind,
    buffer: Option<Buffer>,
    texture: Option<TextureLease>,
    fence: Option<Arc<dyn GpuFence>>,
    /// Format the payload is in.
    pub profile: Profile,
    pub pts: Pts,
    pub marker: MediaMarker,
    audio_samples: usize,
    /// Sample order was reversed for backward playback.
    pub audio_reversed: bool,
    /// Shares its picture with the previous frame.
    pub is_duplicate: bool,
    state: FrameState,
    slot: usize,
    origin: Option<Weak<FreeQueue>>,
    buffers: BufferPool,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("pts", &self.pts)
            .field("marker", &self.marker)
            .field("state", &self.state)
            .field("slot", &self.slot)
            .field("buffer", &self.buffer)
            .field("texture", &self.texture)
            .field("audio_samples", &self.audio_samples)
            .finish()
    }
}

impl Frame {
    fn blank(buffers: BufferPool, slot: usize, origin: Option<Weak<FreeQueue>>) -> Self {
        Self {
            kind: FrameKind::None,
            buffer: None,
            texture: None,
            fence: None,
            profile: Profile::default(),
            pts: 0.0,
            marker: MediaMarker::default(),
            audio_samples: 0,
            audio_reversed: false,
            is_duplicate: false,
            state: FrameState::Free,
            slot,
            origin,
            buffers,
        }
    }

    /// A frame with no origin queue, dropped on release.
    pub fn transient(buffers: &BufferPool) -> Self {
        let mut frame = Self::blank(buffers.clone(), usize::MAX, None);
        frame.state = FrameState::InFlight;
        frame
    }

    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Index of this frame in its pool.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        self.origin.is_none()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.profile.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.profile.height
    }

    /// Duration covered by this frame, microseconds.
    pub fn duration(&self) -> Pts {
        match self.kind {
            FrameKind::Audio => self.profile.samples_duration(self.audio_samples),
            FrameKind::None => 0.0,
            _ => self.profile.frame_duration(),
        }
    }

    pub fn mark_delivered(&mut self) {
        self.state = FrameState::Delivered;
    }

    /// Prepare a video payload.
    ///
    /// The buffer is only allocated when none is attached, so a frame keeps
    /// its storage across reseeks. An attached buffer that is too small is
    /// enlarged.
    pub fn set_video_frame(&mut self, kind: FrameKind, profile: &Profile, pts: Pts) {
        let size = kind.video_size(profile.width, profile.height);
        self.kind = kind;
        self.profile = profile.clone();
        self.pts = pts;
        self.audio_samples = 0;
        self.state = FrameState::InFlight;
        match self.buffer.as_mut() {
            Some(b) => {
                if b.len() < size {
                    self.buffers.enlarge_buffer(b, size);
                }
            }
            None => {
                if size > 0 {
                    self.buffer = Some(self.buffers.get_buffer(size));
                }
            }
        }
    }

    /// Prepare an audio payload of `samples` interleaved samples.
    /// Any previously attached buffer is released first.
    pub fn set_audio_frame(&mut self, profile: &Profile, samples: usize, pts: Pts) {
        self.buffer = None;
        self.kind = FrameKind::Audio;
        self.profile = profile.clone();
        self.pts = pts;
        self.audio_samples = samples;
        self.audio_reversed = false;
        self.state = FrameState::InFlight;
        let size = samples * profile.bytes_per_sample();
        if size > 0 {
            self.buffer = Some(self.buffers.get_buffer(size));
        }
    }

    /// Attach a GPU texture as the payload.
    pub fn set_texture(&mut self, profile: &Profile, pts: Pts, texture: TextureLease) {
        self.buffer = None;
        self.kind = FrameKind::Texture;
        self.profile = profile.clone();
        self.pts = pts;
        self.texture = Some(texture);
        self.state = FrameState::InFlight;
    }

    /// Share another frame's picture without copying.
    pub fn share_video(&mut self, src: &Frame) {
        self.kind = src.kind;
        self.profile = src.profile.clone();
        self.buffer = src.buffer.clone();
        self.audio_samples = 0;
        self.state = FrameState::InFlight;
    }

    pub fn set_fence(&mut self, fence: Arc<dyn GpuFence>) {
        self.fence = Some(fence);
    }

    /// Block on the GPU fence, if any.
    pub fn wait_fence(&self) {
        if let Some(fence) = &self.fence {
            fence.wait();
        }
    }

    #[inline]
    pub fn texture(&self) -> Option<&TextureLease> {
        self.texture.as_ref()
    }

    #[inline]
    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Payload bytes, empty if none.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buffer.as_ref().map(Buffer::data).unwrap_or(&[])
    }

    /// Writable payload bytes. A shared buffer is detached first.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            Some(b) => b.make_mut(),
            None => &mut [],
        }
    }

    #[inline]
    pub fn audio_samples(&self) -> usize {
        self.audio_samples
    }

    #[inline]
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffers
    }

    /// Drop every owned resource and reset per-use flags.
    fn clear(&mut self) {
        self.buffer = None;
        self.texture = None;
        self.fence = None;
        self.kind = FrameKind::None;
        self.audio_samples = 0;
        self.audio_reversed = false;
        self.is_duplicate = false;
        self.marker = MediaMarker::default();
        self.state = FrameState::Free;
    }

    /// Clear the frame and return it to its origin queue. Transient frames
    /// are dropped.
    pub fn release(mut self) {
        self.clear();
        if let Some(queue) = self.origin.as_ref().and_then(Weak::upgrade) {
            // A full or closed queue hands the frame back; it is dropped.
            let _ = queue.tx.try_send(self);
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // A pooled frame dropped without release would shrink its pool.
        if self.state != FrameState::Free {
            if let Some(origin) = self.origin.take() {
                if let Some(queue) = origin.upgrade() {
                    let blank = Frame::blank(self.buffers.clone(), self.slot, Some(origin));
                    let _ = queue.tx.try_send(blank);
                }
            }
        }
    }
}

struct FreeQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Fixed-capacity free queue of frames for one pipeline stage.
///
/// Frames refer back to the queue weakly, so dropping every pool handle
/// frees the idle frames and later releases become plain drops.
#[derive(Clone)]
pub struct FramePool {
    label: Arc<str>,
    capacity: usize,
    queue: Arc<FreeQueue>,
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

impl FramePool {
    pub fn new(label: &str, capacity: usize, buffers: &BufferPool) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let queue = Arc::new(FreeQueue { tx, rx });
        for slot in 0..capacity {
            let frame = Frame::blank(buffers.clone(), slot, Some(Arc::downgrade(&queue)));
            let _ = queue.tx.try_send(frame);
        }
        Self {
            label: label.into(),
            capacity,
            queue,
        }
    }

    /// Take a free frame, or `None` when every frame is in use.
    pub fn acquire(&self) -> Option<Frame> {
        self.queue.rx.try_recv().ok().map(|mut f| {
            f.state = FrameState::InFlight;
            f
        })
    }

    /// Number of free frames.
    #[inline]
    pub fn available(&self) -> usize {
        self.queue.rx.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether every frame has been returned.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.available() == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FrameRate;
    use std::sync::atomic::AtomicBool;

    fn small_profile() -> Profile {
        Profile::project(8, 4, FrameRate::FPS_25)
    }

    #[test]
    fn test_video_sizes() {
        assert_eq!(FrameKind::Yuv420P.video_size(8, 4), 48);
        assert_eq!(FrameKind::Yuv422P.video_size(8, 4), 64);
        assert_eq!(FrameKind::Rgba.video_size(8, 4), 128);
        assert_eq!(FrameKind::Rgb.video_size(8, 4), 96);
    }

    #[test]
    fn test_acquire_release_cycle() {
        let buffers = BufferPool::default();
        let pool = FramePool::new("test", 2, &buffers);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(a.state(), FrameState::InFlight);
        a.release();
        assert_eq!(pool.available(), 1);
        b.release();
        assert!(pool.is_full());
    }

    #[test]
    fn test_release_clears_resources() {
        let buffers = BufferPool::default();
        let pool = FramePool::new("test", 1, &buffers);
        let mut f = pool.acquire().unwrap();
        f.set_video_frame(FrameKind::Rgba, &small_profile(), 40_000.0);
        f.is_duplicate = true;
        f.audio_reversed = true;
        f.release();
        let f = pool.acquire().unwrap();
        assert_eq!(f.kind(), FrameKind::None);
        assert!(f.buffer().is_none());
        assert!(!f.is_duplicate);
        assert!(!f.audio_reversed);
        assert_eq!(buffers.stats().idle_buffers, 1);
    }

    #[test]
    fn test_video_buffer_reused_across_reseek() {
        let buffers = BufferPool::default();
        let mut f = Frame::transient(&buffers);
        f.set_video_frame(FrameKind::Rgba, &small_profile(), 0.0);
        f.data_mut()[0] = 42;
        f.set_video_frame(FrameKind::Rgba, &small_profile(), 40_000.0);
        assert_eq!(f.data()[0], 42);
        assert_eq!(buffers.stats().allocations, 1);
    }

    #[test]
    fn test_audio_frame_allocates() {
        let buffers = BufferPool::default();
        let mut f = Frame::transient(&buffers);
        f.set_audio_frame(&Profile::default(), 1920, 0.0);
        assert_eq!(f.data().len(), 1920 * 8);
        assert_eq!(f.duration(), 40_000.0);
    }

    #[test]
    fn test_shared_picture_outlives_first_frame() {
        let buffers = BufferPool::default();
        let pool = FramePool::new("test", 2, &buffers);
        let mut a = pool.acquire().unwrap();
        a.set_video_frame(FrameKind::Rgb, &small_profile(), 0.0);
        a.data_mut().fill(3);
        let mut b = pool.acquire().unwrap();
        b.share_video(&a);
        b.is_duplicate = true;
        a.release();
        assert!(b.data().iter().all(|&x| x == 3));
        assert_eq!(b.buffer().unwrap().use_count(), 1);
    }

    #[test]
    fn test_dropped_frame_is_replaced() {
        let buffers = BufferPool::default();
        let pool = FramePool::new("test", 2, &buffers);
        let f = pool.acquire().unwrap();
        drop(f);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_texture_lease_returned_on_release() {
        let returned = Arc::new(AtomicBool::new(false));
        let flag = returned.clone();
        let buffers = BufferPool::default();
        let mut f = Frame::transient(&buffers);
        f.set_texture(
            &small_profile(),
            0.0,
            TextureLease::new(7, 8, 4, Box::new(move |_| flag.store(true, Ordering::SeqCst))),
        );
        assert_eq!(f.texture().unwrap().id, 7);
        f.release();
        assert!(returned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_marker_providers_are_unique() {
        assert_ne!(MediaMarker::new_provider(), MediaMarker::new_provider());
    }
}
