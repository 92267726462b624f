//! Reference video filters.

use crate::filter::VideoFilter;
use crate::param::AnimatedParam;
use montage_core::{Profile, Pts};
use montage_gpu::{BlendMode, EffectParams, FragmentInput, GraphFragment, NodeOp};

/// Blurs a rectangular region of the picture.
///
/// Contributes blur, then mask, then composites the masked blur over the
/// untouched input.
#[derive(Debug, Clone)]
pub struct BlurMask {
    pub radius: AnimatedParam,
    /// Normalised rectangle: left, right, top, bottom.
    pub rect: [f32; 4],
    pub feather: f32,
}

impl BlurMask {
    pub fn new(radius: f32, rect: [f32; 4]) -> Self {
        Self {
            radius: radius.into(),
            rect,
            feather: 0.05,
        }
    }
}

impl VideoFilter for BlurMask {
    fn name(&self) -> &str {
        "blur_mask"
    }

    fn graph(&self, pts: Pts, profile: &Profile) -> GraphFragment {
        // Radius is authored for 1080 lines.
        let scale = profile.height as f32 / 1080.0;
        let [left, right, top, bottom] = self.rect;
        let mut f = GraphFragment::new();
        let blur = f.push(
            NodeOp::effect(
                "blur",
                EffectParams::new().with("radius", self.radius.evaluate(pts) * scale),
            ),
            &[FragmentInput::Upstream],
        );
        let mask = f.push(
            NodeOp::effect(
                "mask",
                EffectParams::new()
                    .with("left", left)
                    .with("right", right)
                    .with("top", top)
                    .with("bottom", bottom)
                    .with("feather", self.feather),
            ),
            &[FragmentInput::Node(blur)],
        );
        f.push(
            NodeOp::Composite {
                blend: BlendMode::Normal,
                opacity: 1.0,
            },
            &[FragmentInput::Upstream, FragmentInput::Node(mask)],
        );
        f
    }
}

/// Soft glow: a blurred copy mixed back over the input.
#[derive(Debug, Clone)]
pub struct Diffusion {
    pub radius: AnimatedParam,
    pub amount: AnimatedParam,
}

impl Default for Diffusion {
    fn default() -> Self {
        Self {
            radius: AnimatedParam::constant(3.0),
            amount: AnimatedParam::constant(0.3),
        }
    }
}

impl VideoFilter for Diffusion {
    fn name(&self) -> &str {
        "diffusion"
    }

    fn graph(&self, pts: Pts, _profile: &Profile) -> GraphFragment {
        let amount = self.amount.evaluate(pts).clamp(0.0, 1.0);
        if amount <= 0.0 {
            return GraphFragment::new();
        }
        let mut f = GraphFragment::new();
        let blur = f.push(
            NodeOp::effect(
                "blur",
                EffectParams::new().with("radius", self.radius.evaluate(pts)),
            ),
            &[FragmentInput::Upstream],
        );
        f.push(
            NodeOp::Mix { amount },
            &[FragmentInput::Upstream, FragmentInput::Node(blur)],
        );
        f
    }
}

#[derive(Debug, Clone)]
pub struct Opacity {
    pub amount: AnimatedParam,
}

impl Opacity {
    pub fn new(amount: f32) -> Self {
        Self {
            amount: AnimatedParam::constant(amount),
        }
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl VideoFilter for Opacity {
    fn name(&self) -> &str {
        "opacity"
    }

    fn graph(&self, pts: Pts, _profile: &Profile) -> GraphFragment {
        let amount = self.amount.evaluate(pts).clamp(0.0, 1.0);
        if amount >= 1.0 {
            return GraphFragment::new();
        }
        GraphFragment::single(NodeOp::effect(
            "opacity",
            EffectParams::new().with("amount", amount),
        ))
    }
}
