//! RGBA8 working images for the CPU executor.

use montage_core::{ColorSpace, Frame, FrameKind, MontageError, Result};

/// Straight-alpha RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    /// Transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Single-colour image.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut img = Self::new(width, height);
        for px in img.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        img
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Convert a decoded frame to RGBA, scaling (nearest) to the target size.
    pub fn from_frame(frame: &Frame, width: u32, height: u32) -> Result<Self> {
        let (fw, fh) = (frame.width(), frame.height());
        let native = match frame.kind() {
            FrameKind::Rgba => Self {
                width: fw,
                height: fh,
                data: frame.data().to_vec(),
            },
            FrameKind::Rgb => {
                let mut img = Self::new(fw, fh);
                for (dst, src) in img.data.chunks_exact_mut(4).zip(frame.data().chunks_exact(3)) {
                    dst[..3].copy_from_slice(src);
                    dst[3] = 255;
                }
                img
            }
            FrameKind::Yuv420P | FrameKind::Yuv422P => yuv_to_rgba(frame)?,
            other => {
                return Err(MontageError::UnsupportedFormat(format!(
                    "{:?} frames cannot be read on the CPU",
                    other
                )))
            }
        };
        if native.data.len() < native.row_bytes() * native.height as usize {
            return Err(MontageError::InvalidParameter(format!(
                "Frame payload too small for {}x{}",
                fw, fh
            )));
        }
        Ok(native.scaled(width, height))
    }

    /// Nearest-neighbour resize.
    pub fn scaled(self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self;
        }
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height.max(1) as u64) as u32;
            for x in 0..width {
                let sx = (x as u64 * self.width as u64 / width.max(1) as u64) as u32;
                let i = (y as usize * width as usize + x as usize) * 4;
                out.data[i..i + 4].copy_from_slice(&self.pixel(sx, sy));
            }
        }
        out
    }
}

fn yuv_to_rgba(frame: &Frame) -> Result<Image> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let chroma_h = if frame.kind() == FrameKind::Yuv420P { h / 2 } else { h };
    let cw = w / 2;
    let data = frame.data();
    let needed = w * h + 2 * cw * chroma_h;
    if data.len() < needed {
        return Err(MontageError::InvalidParameter(format!(
            "YUV payload of {} bytes, need {}",
            data.len(),
            needed
        )));
    }
    let (y_plane, rest) = data.split_at(w * h);
    let (u_plane, v_plane) = rest.split_at(cw * chroma_h);

    // Kr/Kb per colour space.
    let (kr, kb) = match frame.profile.color_space {
        ColorSpace::Bt601_625 | ColorSpace::Bt601_525 => (0.299, 0.114),
        _ => (0.2126, 0.0722),
    };
    let kg = 1.0 - kr - kb;
    let full = frame.profile.full_range;

    let mut img = Image::new(w as u32, h as u32);
    for y in 0..h {
        let cy = if chroma_h == h { y } else { y / 2 };
        for x in 0..w {
            let cx = (x / 2).min(cw.saturating_sub(1));
            let yy = y_plane[y * w + x] as f32;
            let u = u_plane.get(cy * cw + cx).copied().unwrap_or(128) as f32 - 128.0;
            let v = v_plane.get(cy * cw + cx).copied().unwrap_or(128) as f32 - 128.0;
            let (luma, cscale) = if full {
                (yy / 255.0, 1.0 / 255.0)
            } else {
                ((yy - 16.0) / 219.0, 1.0 / 224.0)
            };
            let (pb, pr) = (u * cscale, v * cscale);
            let r = luma + 2.0 * (1.0 - kr) * pr;
            let b = luma + 2.0 * (1.0 - kb) * pb;
            let g = (luma - kr * r - kb * b) / kg;
            let i = (y * w + x) * 4;
            img.data[i] = to_u8(r);
            img.data[i + 1] = to_u8(g);
            img.data[i + 2] = to_u8(b);
            img.data[i + 3] = 255;
        }
    }
    Ok(img)
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
