//! Montage Engine - playback scheduling and composition
//!
//! The [`Sampler`] keeps one decode input per clip near the playhead, the
//! [`Composer`] turns each frame of the scene into a render graph and a mixed
//! audio block, and the [`Engine`] runs the composer on its own thread,
//! pushing finished frames to a [`FrameSink`].

pub mod cadence;
pub mod composer;
pub mod engine;
pub mod factory;
pub mod plan;
pub mod sampler;
pub mod sink;

pub use cadence::AudioCadence;
pub use composer::Composer;
pub use engine::Engine;
pub use factory::{media_for, open_source};
pub use plan::{build_render_graph, plan_layers, LayerPlan, Pictures, Plan};
pub use sampler::Sampler;
pub use sink::{ChannelSink, FrameSink, NullSink, SinkEvent};
