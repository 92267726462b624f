//! Sample-accurate accumulator between a decode thread and its consumer.

use crate::frame::AudioFrame;
use montage_core::{Profile, Pts};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

struct ListState {
    frames: VecDeque<AudioFrame>,
    /// Samples buffered across all frames.
    buffered: usize,
    /// Timestamp of the next sample to read, kept when the list drains.
    read_pts: Pts,
    capacity: usize,
    /// Samples a blocked reader is waiting for; may exceed `capacity`.
    wanted: usize,
    bytes_per_sample: usize,
    sample_duration: Pts,
}

/// Queue of decoded [`AudioFrame`]s read as a continuous sample stream.
///
/// The decode thread appends whole frames while [`writable`] holds; the
/// consumer reads exact sample counts that may straddle frames.
///
/// [`writable`]: AudioFrameList::writable
pub struct AudioFrameList {
    state: Mutex<ListState>,
    readable_cv: Condvar,
}

impl AudioFrameList {
    /// A list holding about `seconds` of audio in `profile`'s format.
    pub fn new(profile: &Profile, seconds: f64) -> Self {
        let list = Self {
            state: Mutex::new(ListState {
                frames: VecDeque::new(),
                buffered: 0,
                read_pts: 0.0,
                capacity: 0,
                wanted: 0,
                bytes_per_sample: 0,
                sample_duration: 0.0,
            }),
            readable_cv: Condvar::new(),
        };
        list.reset(profile, seconds);
        list
    }

    /// Drop all buffered audio and adopt a new output format.
    pub fn reset(&self, profile: &Profile, seconds: f64) {
        let mut state = self.state.lock();
        state.capacity = (profile.sample_rate as f64 * seconds).ceil().max(1.0) as usize;
        state.bytes_per_sample = profile.bytes_per_sample();
        state.sample_duration = profile.samples_duration(1);
        state.frames.clear();
        state.buffered = 0;
        state.wanted = 0;
        debug!(
            "Audio list reset: {} samples of {} bytes",
            state.capacity, state.bytes_per_sample
        );
    }

    /// Drop all buffered audio.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.frames.clear();
        state.buffered = 0;
        state.wanted = 0;
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.state.lock().bytes_per_sample
    }

    /// Capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Whether another frame may be appended. A pending larger read
    /// raises the limit until it is served.
    pub fn writable(&self) -> bool {
        let state = self.state.lock();
        state.buffered < state.capacity.max(state.wanted)
    }

    /// Queue a filled frame. Empty frames are ignored.
    pub fn append(&self, frame: AudioFrame) {
        if frame.available() == 0 {
            return;
        }
        let mut state = self.state.lock();
        if state.frames.is_empty() {
            state.read_pts = frame.pts;
        }
        state.buffered += frame.available();
        state.frames.push_back(frame);
        self.readable_cv.notify_all();
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.state.lock().buffered
    }

    /// Whether at least `n` samples are buffered.
    pub fn readable(&self, n: usize) -> bool {
        self.available() >= n
    }

    /// Wait up to `timeout` for `n` samples to be buffered. While waiting,
    /// the writer may fill past capacity to satisfy `n`.
    pub fn wait_readable(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.wanted = n;
        while state.buffered < n {
            if self.readable_cv.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        let ready = state.buffered >= n;
        if ready {
            state.wanted = 0;
        }
        ready
    }

    /// Timestamp of the next sample to be read.
    pub fn read_pts(&self) -> Pts {
        let state = self.state.lock();
        state.frames.front().map(|f| f.pts).unwrap_or(state.read_pts)
    }

    /// Copy up to `n` samples into `dst` and return how many were copied.
    /// `dst` must hold `n * bytes_per_sample()` bytes.
    pub fn read(&self, dst: &mut [u8], n: usize) -> usize {
        let mut state = self.state.lock();
        let bps = state.bytes_per_sample;
        let sample_duration = state.sample_duration;
        let n = n.min(dst.len() / bps.max(1));
        let mut copied = 0;
        while copied < n {
            let Some(front) = state.frames.front_mut() else {
                break;
            };
            let take = (n - copied).min(front.available());
            let src = &front.data()[..take * bps];
            dst[copied * bps..(copied + take) * bps].copy_from_slice(src);
            front.consume(take, sample_duration);
            copied += take;
            let next_pts = front.pts;
            if front.available() == 0 {
                state.frames.pop_front();
            }
            state.read_pts = next_pts;
        }
        state.buffered -= copied;
        copied
    }

    /// Copy everything buffered into `dst`, as far as it fits.
    pub fn read_all(&self, dst: &mut [u8]) -> usize {
        let n = self.available();
        self.read(dst, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::{BufferPool, SampleFormat};

    fn mono_s16() -> Profile {
        Profile {
            sample_rate: 1000,
            channels: 1,
            sample_format: SampleFormat::S16,
            ..Profile::default()
        }
    }

    fn chunk(pool: &BufferPool, pts: Pts, values: &[i16]) -> AudioFrame {
        let mut af = AudioFrame::new(2, pool);
        let dst = af.write(0, values.len()).unwrap();
        for (d, v) in dst.chunks_exact_mut(2).zip(values) {
            d.copy_from_slice(&v.to_le_bytes());
        }
        af.write_done(pts, values.len(), 0);
        af
    }

    fn decode(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_read_spans_frames_in_order() {
        let pool = BufferPool::default();
        let list = AudioFrameList::new(&mono_s16(), 1.0);
        list.append(chunk(&pool, 0.0, &[1, 2, 3]));
        list.append(chunk(&pool, 3000.0, &[4, 5]));
        assert!(list.readable(5));

        let mut dst = vec![0u8; 8];
        assert_eq!(list.read(&mut dst, 4), 4);
        assert_eq!(decode(&dst), vec![1, 2, 3, 4]);
        assert_eq!(list.read_pts(), 4000.0);
        assert_eq!(list.available(), 1);
    }

    #[test]
    fn test_read_past_end_returns_available() {
        let pool = BufferPool::default();
        let list = AudioFrameList::new(&mono_s16(), 1.0);
        list.append(chunk(&pool, 0.0, &[7, 8]));
        let mut dst = vec![0u8; 10];
        let n = list.read(&mut dst, 5);
        assert_eq!(n, 2);
        assert_eq!(decode(&dst), vec![7, 8, 0, 0, 0]);
    }

    #[test]
    fn test_writable_tracks_capacity() {
        let pool = BufferPool::default();
        let profile = Profile {
            sample_rate: 8,
            ..mono_s16()
        };
        let list = AudioFrameList::new(&profile, 0.5);
        assert_eq!(list.capacity(), 4);
        list.append(chunk(&pool, 0.0, &[1, 2, 3]));
        assert!(list.writable());
        list.append(chunk(&pool, 3000.0, &[4, 5]));
        assert!(!list.writable());
    }

    #[test]
    fn test_waiting_reader_raises_capacity() {
        let pool = BufferPool::default();
        let profile = Profile {
            sample_rate: 8,
            ..mono_s16()
        };
        let list = AudioFrameList::new(&profile, 0.5);
        list.append(chunk(&pool, 0.0, &[1, 2, 3, 4]));
        assert!(!list.writable());

        assert!(!list.wait_readable(6, Duration::from_millis(5)));
        assert!(list.writable());
        list.append(chunk(&pool, 4000.0, &[5, 6]));
        assert!(list.wait_readable(6, Duration::from_millis(5)));
        assert!(!list.writable());
    }

    #[test]
    fn test_wait_readable_times_out() {
        let list = AudioFrameList::new(&mono_s16(), 1.0);
        assert!(!list.wait_readable(1, Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_readable_wakes_on_append() {
        let pool = BufferPool::default();
        let list = std::sync::Arc::new(AudioFrameList::new(&mono_s16(), 1.0));
        let writer = list.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            writer.append(chunk(&pool, 0.0, &[1, 2]));
        });
        assert!(list.wait_readable(2, Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_reversed_frames_count_down() {
        let pool = BufferPool::default();
        let list = AudioFrameList::new(&mono_s16(), 1.0);
        let mut af = chunk(&pool, 0.0, &[1, 2, 3, 4]);
        af.reverse(1000.0);
        list.append(af);
        let mut dst = vec![0u8; 4];
        list.read(&mut dst, 2);
        assert_eq!(decode(&dst), vec![4, 3]);
        assert_eq!(list.read_pts(), 2000.0);
    }

    #[test]
    fn test_clear_empties() {
        let pool = BufferPool::default();
        let list = AudioFrameList::new(&mono_s16(), 1.0);
        list.append(chunk(&pool, 0.0, &[1]));
        list.clear();
        assert_eq!(list.available(), 0);
    }
}
