//! Montage Media - decoding and per-source input threads
//!
//! This crate handles:
//! - The decoder contract shared by every backend
//! - File decoding and probing through FFmpeg
//! - Generated sources for tests and smoke runs
//! - Frame-rate conversion to the output profile
//! - The `Input` decode thread with forward and backward playback

pub mod decoder;
pub mod ffmpeg;
pub mod input;
pub mod probe;
pub mod resampler;
pub mod synthetic;

pub use decoder::{MediaDecoder, MediaSource};
pub use ffmpeg::{ffmpeg_path, FfmpegDecoder, FileSource};
pub use input::Input;
pub use probe::{ffprobe_path, parse_probe, probe_file};
pub use resampler::{Resample, VideoResampler};
pub use synthetic::{audio_sample, frame_tag, SyntheticDecoder, SyntheticSource, SyntheticVideo};
