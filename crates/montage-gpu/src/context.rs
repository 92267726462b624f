//! Device handle shared between the windowing layer and the composer.
//!
//! The embedding application either hands over the device it already
//! renders with, or asks for a headless one. Only the composer thread
//! records work on it.

use montage_core::{MontageError, Result};
use std::sync::Arc;
use tracing::info;

/// Largest frame edge a context is asked to support.
pub const MAX_FRAME_EDGE: u32 = 8192;

pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    max_edge: u32,
}

impl GpuContext {
    /// Adopt a device created elsewhere, typically by the display layer.
    pub fn from_shared(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, adapter_name: impl Into<String>) -> Self {
        let max_edge = device.limits().max_texture_dimension_2d;
        Self {
            device,
            queue,
            adapter_name: adapter_name.into(),
            max_edge,
        }
    }

    /// A device of our own with no surface attached.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| MontageError::Gpu("no adapter for headless composition".into()))?;
        let name = adapter.get_info().name;

        let limits = wgpu::Limits {
            max_texture_dimension_2d: MAX_FRAME_EDGE,
            ..wgpu::Limits::downlevel_defaults()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("montage composer"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| MontageError::Gpu(format!("{}: {}", name, e)))?;
        info!("Headless composer device on {}", name);

        Ok(Self::from_shared(Arc::new(device), Arc::new(queue), name))
    }

    pub fn headless_blocking() -> Result<Self> {
        pollster::block_on(Self::headless())
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Fail early for project sizes the device cannot hold.
    pub fn check_frame_size(&self, width: u32, height: u32) -> Result<()> {
        check_edge(self.max_edge, width, height)
    }
}

fn check_edge(max_edge: u32, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > max_edge || height > max_edge {
        return Err(MontageError::Gpu(format!(
            "{}x{} frames exceed the device limit of {}",
            width, height, max_edge
        )));
    }
    Ok(())
}
