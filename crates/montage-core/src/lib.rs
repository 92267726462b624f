//! Montage Core - Foundation types for the media pipeline
//!
//! This crate provides the types every pipeline stage shares:
//! - Time representation (PTS in microseconds, rational FrameRate)
//! - Stream and project format descriptors (Profile)
//! - Pooled byte buffers and frames
//! - Pipeline configuration

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod profile;
pub mod time;

pub use buffer::{Buffer, BufferPool, PoolStats};
pub use config::PipelineConfig;
pub use error::{MontageError, Result};
pub use frame::{
    Frame, FrameKind, FramePool, FrameState, GpuFence, MediaMarker, TextureLease,
};
pub use profile::{
    AudioLayout, ChromaLocation, ColorPrimaries, ColorSpace, GammaCurve, Profile, SampleFormat,
};
pub use time::{pts_eq, seconds, FrameRate, Pts, MICROSECOND, PTS_EPSILON};
