//! Texture holding one composited frame.

use crate::image::Image;
use montage_core::{MontageError, Result};

/// Composited frames are 8-bit RGBA on the GPU as on the CPU.
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const BYTES_PER_PIXEL: u64 = 4;

pub struct FrameTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Bytes a `width` x `height` frame texture occupies.
pub fn frame_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL
}

impl FrameTexture {
    /// A frame-sized texture that can be written, sampled and read back.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("composited frame"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Queue a copy of `image`; it lands with the next submission.
    pub fn write(&self, queue: &wgpu::Queue, image: &Image) -> Result<()> {
        if (image.width, image.height) != (self.width, self.height) {
            return Err(MontageError::Gpu(format!(
                "{}x{} picture for a {}x{} frame texture",
                image.width, image.height, self.width, self.height
            )));
        }
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.row_bytes() as u32),
                rows_per_image: Some(self.height),
            },
            extent(self.width, self.height),
        );
        Ok(())
    }

    pub fn byte_size(&self) -> u64 {
        frame_bytes(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes() {
        assert_eq!(frame_bytes(1920, 1080), 8_294_400);
        assert_eq!(frame_bytes(0, 1080), 0);
    }
}
