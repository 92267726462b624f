//! Montage Audio - audio accumulation and mixing
//!
//! Architecture:
//! - `AudioFrame`: decode-time sample accumulator
//! - `AudioFrameList`: sample-accurate queue between a decode thread and
//!   the composer, with timed waits and silence padding left to the caller
//! - `Mixer`: combines per-track blocks with volume/pan/solo/mute
//! - `convert`: S16/F32 conversion and per-sample reversal

pub mod convert;
pub mod frame;
pub mod list;
pub mod mixer;

pub use frame::AudioFrame;
pub use list::AudioFrameList;
pub use mixer::{Mixer, MixerChannel};
