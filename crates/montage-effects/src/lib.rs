//! Montage Effects - filter contract and reference filters
//!
//! A video filter never renders by itself: it returns a small
//! [`GraphFragment`](montage_gpu::GraphFragment) that the composer splices
//! after the filter's input. Audio filters run in place on f32 samples.

pub mod audio;
pub mod filter;
pub mod param;
pub mod registry;
pub mod transition;
pub mod video;

pub use audio::Gain;
pub use filter::{AudioFilter, Filter, VideoFilter};
pub use montage_gpu::BlendMode;
pub use param::{AnimatedParam, CubicBezier, Easing, Key};
pub use registry::FilterRegistry;
pub use transition::{audio_gains, TransitionCurve, TransitionStyle};
pub use video::{BlurMask, Diffusion, Opacity};
