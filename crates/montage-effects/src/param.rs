//! Animated filter parameters.
//!
//! Keys are placed in source time so a parameter keeps its shape when the
//! clip carrying it is split or trimmed.

use montage_core::Pts;
use serde::{Deserialize, Serialize};

/// Cubic Bézier easing from (0,0) to (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    pub const LINEAR: Self = Self::new(0.0, 0.0, 1.0, 1.0);
    pub const EASE_IN: Self = Self::new(0.42, 0.0, 1.0, 1.0);
    pub const EASE_OUT: Self = Self::new(0.0, 0.0, 0.58, 1.0);
    pub const EASE_IN_OUT: Self = Self::new(0.42, 0.0, 0.58, 1.0);

    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn curve(a: f64, b: f64, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * t * a + 3.0 * mt * t * t * b + t * t * t
    }

    fn slope(a: f64, b: f64, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * a + 6.0 * mt * t * (b - a) + 3.0 * t * t * (1.0 - b)
    }

    /// Eased progress for linear progress `x` in [0, 1].
    pub fn evaluate(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        // Newton-Raphson on x(t) = x.
        let mut t = x;
        for _ in 0..8 {
            let err = Self::curve(self.x1, self.x2, t) - x;
            if err.abs() < 1e-10 {
                break;
            }
            let dx = Self::slope(self.x1, self.x2, t);
            if dx.abs() < 1e-12 {
                break;
            }
            t = (t - err / dx).clamp(0.0, 1.0);
        }
        Self::curve(self.y1, self.y2, t)
    }
}

/// How a key interpolates toward the next one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Easing {
    Hold,
    #[default]
    Linear,
    Bezier(CubicBezier),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub pts: Pts,
    pub value: f32,
    pub easing: Easing,
}

/// A scalar that may vary over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatedParam {
    keys: Vec<Key>,
}

impl AnimatedParam {
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Key {
                pts: 0.0,
                value,
                easing: Easing::Hold,
            }],
        }
    }

    /// Insert a key, replacing one at the same time.
    pub fn set(&mut self, pts: Pts, value: f32, easing: Easing) {
        let key = Key { pts, value, easing };
        match self
            .keys
            .binary_search_by(|k| k.pts.total_cmp(&pts))
        {
            Ok(i) => self.keys[i] = key,
            Err(i) => self.keys.insert(i, key),
        }
    }

    pub fn remove(&mut self, pts: Pts) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k.pts != pts);
        self.keys.len() != before
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn is_animated(&self) -> bool {
        self.keys.len() > 1
    }

    /// Value at `pts`, clamped to the first and last keys.
    pub fn evaluate(&self, pts: Pts) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if pts <= first.pts {
            return first.value;
        }
        if pts >= last.pts {
            return last.value;
        }
        let i = self.keys.partition_point(|k| k.pts <= pts) - 1;
        let (a, b) = (&self.keys[i], &self.keys[i + 1]);
        let span = b.pts - a.pts;
        if span <= 0.0 {
            return a.value;
        }
        let t = ((pts - a.pts) / span).clamp(0.0, 1.0);
        let t = match a.easing {
            Easing::Hold => 0.0,
            Easing::Linear => t,
            Easing::Bezier(curve) => curve.evaluate(t),
        };
        a.value + (b.value - a.value) * t as f32
    }
}

impl From<f32> for AnimatedParam {
    fn from(value: f32) -> Self {
        Self::constant(value)
    }
}
