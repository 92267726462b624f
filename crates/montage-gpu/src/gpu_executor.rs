//! Executor that delivers composited frames as GPU textures.
//!
//! Graph evaluation runs through the CPU kernels; the result is uploaded to
//! a pooled texture and the frame carries the texture lease plus a fence on
//! the upload submission. Consumers wait on the fence before sampling.

use crate::context::GpuContext;
use crate::cpu::CpuExecutor;
use crate::executor::GraphExecutor;
use crate::render_graph::RenderGraph;
use crate::texture::{FrameTexture, FRAME_FORMAT};
use crate::texture_pool::{TextureKey, TexturePool};
use montage_core::{Frame, GpuFence, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Fence on a queue submission.
pub struct SubmissionFence {
    device: Arc<wgpu::Device>,
    index: wgpu::SubmissionIndex,
}

impl GpuFence for SubmissionFence {
    fn wait(&self) {
        self.device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(self.index.clone()));
    }

    fn is_signaled(&self) -> bool {
        self.device.poll(wgpu::Maintain::Poll).is_queue_empty()
    }
}

pub struct GpuExecutor {
    context: Arc<GpuContext>,
    textures: TexturePool<FrameTexture>,
    kernels: CpuExecutor,
}

impl GpuExecutor {
    /// Bind to a shared context. `texture_budget` bounds idle texture memory.
    pub fn new(context: Arc<GpuContext>, texture_budget: u64) -> Self {
        info!("GPU executor on {}", context.adapter_name());
        Self {
            context,
            textures: TexturePool::new(texture_budget),
            kernels: CpuExecutor::new(),
        }
    }

    /// Pool that resolves frame texture ids to textures.
    pub fn textures(&self) -> &TexturePool<FrameTexture> {
        &self.textures
    }

    pub fn kernels_mut(&mut self) -> &mut CpuExecutor {
        &mut self.kernels
    }
}

impl GraphExecutor for GpuExecutor {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn execute(&mut self, graph: &RenderGraph, layers: &[&Frame], target: &mut Frame) -> Result<()> {
        let profile = target.profile.clone();
        self.context.check_frame_size(profile.width, profile.height)?;
        let image = self
            .kernels
            .render(graph, layers, profile.width, profile.height)?;

        let key = TextureKey {
            width: profile.width,
            height: profile.height,
            format: FRAME_FORMAT,
        };
        let device = Arc::clone(self.context.device());
        let (lease, texture) = self.textures.acquire(key, || {
            debug!("Creating {}x{} frame texture", key.width, key.height);
            FrameTexture::new(&device, key.width, key.height)
        });
        texture.write(self.context.queue(), &image)?;
        let index = self.context.queue().submit(std::iter::empty());

        let pts = target.pts;
        target.set_texture(&profile, pts, lease);
        target.set_fence(Arc::new(SubmissionFence { device, index }));
        Ok(())
    }
}
