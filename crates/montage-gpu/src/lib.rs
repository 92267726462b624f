//! Montage GPU - render graph and compositing backends
//!
//! Filters describe their work as graph fragments; the composer splices
//! them into a per-frame [`RenderGraph`] and hands it to a
//! [`GraphExecutor`]. Two executors exist: [`CpuExecutor`] writes RGBA
//! pixels, [`GpuExecutor`] delivers wgpu textures with a fence.

pub mod blend;
pub mod context;
pub mod cpu;
pub mod executor;
pub mod gpu_executor;
pub mod image;
pub mod render_graph;
pub mod texture;
pub mod texture_pool;

pub use blend::BlendMode;
pub use context::GpuContext;
pub use cpu::{CpuExecutor, CpuKernel};
pub use executor::GraphExecutor;
pub use gpu_executor::{GpuExecutor, SubmissionFence};
pub use image::Image;
pub use render_graph::{
    EffectParams, FragmentInput, FragmentNode, GraphFragment, NodeId, NodeOp, RenderGraph,
    RenderNode,
};
pub use texture::{FrameTexture, FRAME_FORMAT};
pub use texture_pool::{PooledTexture, TextureKey, TexturePool};
