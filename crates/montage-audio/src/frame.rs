//! Decode-time audio accumulator.

use crate::convert::reverse_samples;
use montage_core::{Buffer, BufferPool, Pts};

/// Raw interleaved samples produced by one decode call.
///
/// The decoder asks for room with [`AudioFrame::write`], fills it, then
/// commits with [`AudioFrame::write_done`]. Filled frames are handed to an
/// [`AudioFrameList`](crate::AudioFrameList).
#[derive(Debug)]
pub struct AudioFrame {
    /// Timestamp of the next unread sample. Reversed frames count down
    /// from the end of their span.
    pub pts: Pts,
    buffer: Option<Buffer>,
    /// Read offset in bytes.
    offset: usize,
    /// Samples left from `offset`.
    available: usize,
    bytes_per_sample: usize,
    reversed: bool,
    pool: BufferPool,
}

impl AudioFrame {
    pub fn new(bytes_per_sample: usize, pool: &BufferPool) -> Self {
        Self {
            pts: 0.0,
            buffer: None,
            offset: 0,
            available: 0,
            bytes_per_sample,
            reversed: false,
            pool: pool.clone(),
        }
    }

    /// Room for `more` samples after `written` already stored ones. The
    /// buffer is grown as needed and existing samples are kept.
    pub fn write(&mut self, written: usize, more: usize) -> Option<&mut [u8]> {
        let size = (written + more) * self.bytes_per_sample;
        if size == 0 {
            return None;
        }
        match self.buffer.as_mut() {
            None => self.buffer = Some(self.pool.get_buffer(size)),
            Some(b) => {
                if b.len() < size {
                    self.pool.enlarge_buffer(b, size);
                }
            }
        }
        let start = written * self.bytes_per_sample;
        self.buffer
            .as_mut()
            .map(|b| &mut b.make_mut()[start..size])
    }

    /// Commit `samples` samples stamped `pts`, skipping the first
    /// `skip` of them.
    pub fn write_done(&mut self, pts: Pts, samples: usize, skip: usize) {
        self.pts = pts;
        self.available = samples.saturating_sub(skip);
        self.offset = skip * self.bytes_per_sample;
    }

    /// Keep at most `samples` unread samples.
    pub fn truncate(&mut self, samples: usize) {
        self.available = self.available.min(samples);
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Unread sample bytes.
    pub fn data(&self) -> &[u8] {
        match &self.buffer {
            Some(b) => {
                let end = self.offset + self.available * self.bytes_per_sample;
                &b.data()[self.offset..end]
            }
            None => &[],
        }
    }

    /// Mark `n` samples as read and move `pts` to the next unread one.
    pub(crate) fn consume(&mut self, n: usize, sample_duration: Pts) {
        let n = n.min(self.available);
        self.offset += n * self.bytes_per_sample;
        self.available -= n;
        let step = n as f64 * sample_duration;
        if self.reversed {
            self.pts -= step;
        } else {
            self.pts += step;
        }
    }

    /// Reverse the unread samples for backward playback. `pts` becomes the
    /// timestamp just past the last sample, and reading moves backward in
    /// time from there.
    pub fn reverse(&mut self, sample_duration: Pts) {
        let bps = self.bytes_per_sample;
        let (offset, available) = (self.offset, self.available);
        if let Some(b) = self.buffer.as_mut() {
            let data = b.make_mut();
            reverse_samples(&mut data[offset..offset + available * bps], bps);
        }
        self.pts += available as f64 * sample_duration;
        self.reversed = !self.reversed;
    }

    /// Drop the payload, keeping the frame reusable.
    pub fn clear(&mut self) {
        self.buffer = None;
        self.offset = 0;
        self.available = 0;
        self.reversed = false;
    }
}
