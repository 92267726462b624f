//! Reference executor that evaluates render graphs on the CPU.

use crate::blend::BlendMode;
use crate::executor::GraphExecutor;
use crate::image::Image;
use crate::render_graph::{EffectParams, NodeOp, RenderGraph, RenderNode};
use montage_core::{Frame, FrameKind, MontageError, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::trace;

/// A single-input image operation.
pub trait CpuKernel: Send + Sync {
    fn apply(&self, input: &Image, params: &EffectParams) -> Image;
}

impl<F> CpuKernel for F
where
    F: Fn(&Image, &EffectParams) -> Image + Send + Sync,
{
    fn apply(&self, input: &Image, params: &EffectParams) -> Image {
        self(input, params)
    }
}

/// Evaluates graphs with rayon-parallel kernels.
pub struct CpuExecutor {
    kernels: HashMap<String, Box<dyn CpuKernel>>,
}

impl Default for CpuExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuExecutor {
    /// Executor with the built-in kernels (`blur`, `mask`, `opacity`).
    pub fn new() -> Self {
        let mut exec = Self {
            kernels: HashMap::new(),
        };
        exec.register("blur", box_blur);
        exec.register("mask", rect_mask);
        exec.register("opacity", opacity);
        exec
    }

    pub fn register(&mut self, name: &str, kernel: impl CpuKernel + 'static) {
        self.kernels.insert(name.to_string(), Box::new(kernel));
    }

    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Evaluate `graph` at `width` x `height` and return the output image.
    pub fn render(
        &self,
        graph: &RenderGraph,
        layers: &[&Frame],
        width: u32,
        height: u32,
    ) -> Result<Image> {
        let order = graph
            .topological_sort()
            .ok_or_else(|| MontageError::InvalidParameter("Render graph has a cycle".into()))?;
        let output = graph
            .output()
            .ok_or_else(|| MontageError::InvalidParameter("Render graph has no output".into()))?;

        let mut results: Vec<Option<Image>> = vec![None; graph.node_count()];
        for id in order {
            let Some(node) = graph.node(id) else { continue };
            let input = |k: usize| input_of(&results, node, k);
            let image = match &node.op {
                NodeOp::Source { layer } => match layers.get(*layer) {
                    Some(frame) => Image::from_frame(frame, width, height)?,
                    None => Image::new(width, height),
                },
                NodeOp::Effect { name, params } => {
                    let src = input(0)?;
                    match self.kernels.get(name) {
                        Some(kernel) => kernel.apply(src, params),
                        None => {
                            trace!("No CPU kernel for {}, passing through", name);
                            src.clone()
                        }
                    }
                }
                NodeOp::Mix { amount } => mix(input(0)?, input(1)?, *amount),
                NodeOp::Composite { blend, opacity } => {
                    composite(input(0)?, input(1)?, *blend, *opacity)
                }
                NodeOp::Output => input(0)?.clone(),
            };
            results[id.0 as usize] = Some(image);
        }

        results[output.0 as usize]
            .take()
            .ok_or_else(|| MontageError::Internal("Output node was not evaluated".into()))
    }
}

impl GraphExecutor for CpuExecutor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn execute(&mut self, graph: &RenderGraph, layers: &[&Frame], target: &mut Frame) -> Result<()> {
        let profile = target.profile.clone();
        let image = self.render(graph, layers, profile.width, profile.height)?;
        let pts = target.pts;
        target.set_video_frame(FrameKind::Rgba, &profile, pts);
        target.data_mut().copy_from_slice(&image.data);
        Ok(())
    }
}

fn input_of<'a>(results: &'a [Option<Image>], node: &RenderNode, k: usize) -> Result<&'a Image> {
    node.inputs
        .get(k)
        .and_then(|i| results.get(i.0 as usize))
        .and_then(Option::as_ref)
        .ok_or_else(|| {
            MontageError::InvalidParameter(format!("Node {} lacks input {}", node.id.0, k))
        })
}

/// Separable box blur; `radius` in pixels.
pub fn box_blur(src: &Image, params: &EffectParams) -> Image {
    let r = params.get_or("radius", 3.0).round().max(0.0) as usize;
    if r == 0 || src.width == 0 || src.height == 0 {
        return src.clone();
    }
    let (w, h) = (src.width as usize, src.height as usize);
    let row = w * 4;

    let mut horiz = vec![0u8; src.data.len()];
    horiz
        .par_chunks_mut(row)
        .zip(src.data.par_chunks(row))
        .for_each(|(dst, line)| {
            for x in 0..w {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(w - 1);
                let n = (hi - lo + 1) as u32;
                for c in 0..4 {
                    let sum: u32 = (lo..=hi).map(|i| line[i * 4 + c] as u32).sum();
                    dst[x * 4 + c] = ((sum + n / 2) / n) as u8;
                }
            }
        });

    let mut out = Image::new(src.width, src.height);
    out.data.par_chunks_mut(row).enumerate().for_each(|(y, dst)| {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(h - 1);
        let n = (hi - lo + 1) as u32;
        for x in 0..row {
            let sum: u32 = (lo..=hi).map(|j| horiz[j * row + x] as u32).sum();
            dst[x] = ((sum + n / 2) / n) as u8;
        }
    });
    out
}

/// Keep a rectangle (fractions of the frame) and fade alpha to zero
/// outside it over `feather`.
pub fn rect_mask(src: &Image, params: &EffectParams) -> Image {
    let left = params.get_or("left", 0.25);
    let right = params.get_or("right", 0.75);
    let top = params.get_or("top", 0.25);
    let bottom = params.get_or("bottom", 0.75);
    let feather = params.get_or("feather", 0.05).max(1e-4);
    let (w, h) = (src.width.max(1) as f32, src.height.max(1) as f32);
    let row = src.row_bytes();

    let mut out = src.clone();
    out.data.par_chunks_mut(row).enumerate().for_each(|(y, line)| {
        let fy = (y as f32 + 0.5) / h;
        let dy = (top - fy).max(fy - bottom).max(0.0);
        for (x, px) in line.chunks_exact_mut(4).enumerate() {
            let fx = (x as f32 + 0.5) / w;
            let dx = (left - fx).max(fx - right).max(0.0);
            let coverage = (1.0 - dx.max(dy) / feather).clamp(0.0, 1.0);
            px[3] = (px[3] as f32 * coverage).round() as u8;
        }
    });
    out
}

/// Scale alpha by `amount`.
pub fn opacity(src: &Image, params: &EffectParams) -> Image {
    let amount = params.get_or("amount", 1.0).clamp(0.0, 1.0);
    let mut out = src.clone();
    for px in out.data.chunks_exact_mut(4) {
        px[3] = (px[3] as f32 * amount).round() as u8;
    }
    out
}

/// Linear cross-fade; `amount` 0 yields `a`.
pub fn mix(a: &Image, b: &Image, amount: f32) -> Image {
    let t = amount.clamp(0.0, 1.0);
    let mut out = a.clone();
    out.data
        .par_iter_mut()
        .zip(b.data.par_iter())
        .for_each(|(d, s)| {
            *d = (*d as f32 * (1.0 - t) + *s as f32 * t).round() as u8;
        });
    out
}

/// `fg` over `bg` with straight alpha.
pub fn composite(bg: &Image, fg: &Image, blend: BlendMode, opacity: f32) -> Image {
    let mut out = bg.clone();
    out.data
        .par_chunks_mut(4)
        .zip(fg.data.par_chunks(4))
        .for_each(|(d, s)| {
            let fa = s[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
            let ba = d[3] as f32 / 255.0;
            for c in 0..3 {
                let b = d[c] as f32 / 255.0;
                let f = blend.apply(b, s[c] as f32 / 255.0);
                d[c] = ((b * (1.0 - fa) + f * fa) * 255.0).round() as u8;
            }
            d[3] = ((fa + ba * (1.0 - fa)) * 255.0).round() as u8;
        });
    out
}
