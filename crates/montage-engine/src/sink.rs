//! Consumers of finished frames.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use montage_core::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often a blocked send rechecks whether the sink was closed.
const SEND_POLL: Duration = Duration::from_millis(10);

/// Receives composed frames in presentation order.
///
/// Frames come from the composer's fixed pools; a sink that holds on to
/// them stalls composition until they are released or dropped.
pub trait FrameSink: Send + Sync {
    fn video_frame(&self, frame: Frame);

    fn audio_frame(&self, frame: Frame);

    /// Playback ran off either end of the timeline.
    fn end_of_stream(&self) {}

    /// The engine is stopping. Blocked deliveries give up and release
    /// their frames.
    fn close(&self) {}
}

fn release(event: SinkEvent) {
    match event {
        SinkEvent::Video(f) | SinkEvent::Audio(f) => f.release(),
        SinkEvent::EndOfStream => {}
    }
}

#[derive(Debug)]
pub enum SinkEvent {
    Video(Frame),
    Audio(Frame),
    EndOfStream,
}

/// Pushes frames into a bounded channel for a pulling consumer. A full
/// channel blocks the composer until the consumer reads or the sink is
/// closed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    closed: Arc<AtomicBool>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let sink = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    fn send(&self, mut event: SinkEvent) {
        loop {
            if self.closed.load(Ordering::Acquire) {
                release(event);
                return;
            }
            match self.tx.send_timeout(event, SEND_POLL) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(e)) => event = e,
                Err(SendTimeoutError::Disconnected(e)) => {
                    release(e);
                    return;
                }
            }
        }
    }
}

impl FrameSink for ChannelSink {
    fn video_frame(&self, frame: Frame) {
        self.send(SinkEvent::Video(frame));
    }

    fn audio_frame(&self, frame: Frame) {
        self.send(SinkEvent::Audio(frame));
    }

    fn end_of_stream(&self) {
        self.send(SinkEvent::EndOfStream);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Releases every frame it gets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn video_frame(&self, frame: Frame) {
        frame.release();
    }

    fn audio_frame(&self, frame: Frame) {
        frame.release();
    }
}
