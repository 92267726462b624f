//! Blends applied where two clips overlap.

use crate::param::{CubicBezier, Easing};
use montage_core::Pts;
use montage_gpu::{BlendMode, NodeOp};
use serde::{Deserialize, Serialize};

/// How the outgoing and incoming clips are combined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TransitionStyle {
    #[default]
    CrossFade,
    /// Incoming clip blended over the outgoing one, fading in.
    Blend(BlendMode),
}

impl TransitionStyle {
    pub fn name(self) -> &'static str {
        match self {
            Self::CrossFade => "Cross Fade",
            Self::Blend(mode) => mode.name(),
        }
    }

    /// Node combining (outgoing, incoming) at `progress`.
    pub fn node(self, progress: f32) -> NodeOp {
        let progress = progress.clamp(0.0, 1.0);
        match self {
            Self::CrossFade => NodeOp::Mix { amount: progress },
            Self::Blend(blend) => NodeOp::Composite {
                blend,
                opacity: progress,
            },
        }
    }
}

/// Timing of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionCurve {
    pub easing: Easing,
}

impl Default for TransitionCurve {
    fn default() -> Self {
        Self {
            easing: Easing::Linear,
        }
    }
}

impl TransitionCurve {
    pub fn smooth() -> Self {
        Self {
            easing: Easing::Bezier(CubicBezier::EASE_IN_OUT),
        }
    }

    /// Progress through `[start, start + length)` at `pts`, 0 at the start.
    pub fn progress(&self, pts: Pts, start: Pts, length: Pts) -> f32 {
        if length <= 0.0 {
            return 1.0;
        }
        let t = ((pts - start) / length).clamp(0.0, 1.0);
        let t = match self.easing {
            Easing::Hold => 0.0,
            Easing::Linear => t,
            Easing::Bezier(curve) => curve.evaluate(t),
        };
        t as f32
    }
}

/// Equal-power gains for (outgoing, incoming) audio.
pub fn audio_gains(progress: f32) -> (f32, f32) {
    let angle = progress.clamp(0.0, 1.0) * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_spans_window() {
        let curve = TransitionCurve::default();
        assert_eq!(curve.progress(9.0, 9.0, 1.0), 0.0);
        assert!((curve.progress(9.5, 9.0, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(curve.progress(12.0, 9.0, 1.0), 1.0);
        assert_eq!(curve.progress(0.0, 9.0, 0.0), 1.0);
    }

    #[test]
    fn test_crossfade_node() {
        assert_eq!(TransitionStyle::CrossFade.node(0.25), NodeOp::Mix { amount: 0.25 });
        assert!(matches!(
            TransitionStyle::Blend(BlendMode::Screen).node(2.0),
            NodeOp::Composite { blend: BlendMode::Screen, opacity } if opacity == 1.0
        ));
    }

    #[test]
    fn test_equal_power_gains() {
        let (a, b) = audio_gains(0.5);
        assert!((a - b).abs() < 1e-6);
        assert!((a * a + b * b - 1.0).abs() < 1e-5);
        assert_eq!(audio_gains(0.0), (1.0, 0.0));
    }
}
