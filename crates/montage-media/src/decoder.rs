//! Decoder and source traits shared by every backend.

use montage_audio::AudioFrame;
use montage_core::{Frame, Profile, Pts, Result};
use std::fmt;

/// One opened source, decoding a video and/or an audio stream.
///
/// Video comes out in the stream's native format and timestamps. Audio is
/// delivered already converted to the output profile's sample rate,
/// channel count and sample format.
pub trait MediaDecoder: Send {
    /// Format of the source streams.
    fn profile(&self) -> &Profile;

    /// Position both streams so the next video frame is the one shown at
    /// `pts` and the next audio sample is the one at `pts`.
    fn seek(&mut self, pts: Pts) -> Result<()>;

    /// Decode the next video frame into `frame` and return its duration,
    /// or `None` at end of stream.
    fn decode_video(&mut self, frame: &mut Frame) -> Result<Option<Pts>>;

    /// Decode the next audio chunk into `frame`. Returns `false` at end of
    /// stream.
    fn decode_audio(&mut self, frame: &mut AudioFrame) -> Result<bool>;
}

/// Something that can be opened for decoding.
pub trait MediaSource: Send + Sync + fmt::Debug {
    /// Display name, usually the file path.
    fn name(&self) -> &str;

    /// Describe the source without touching playback state.
    fn probe(&self) -> Result<Profile>;

    /// Open a decoder producing audio in `output`'s format.
    fn open(&self, output: &Profile) -> Result<Box<dyn MediaDecoder>>;
}
