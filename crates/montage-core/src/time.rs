//! Time representation for the pipeline.
//!
//! Presentation timestamps are `f64` microseconds, matching what decoders
//! report. Rates are rational so that per-frame durations and samples per
//! frame stay exact for NTSC rates.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presentation timestamp in microseconds.
pub type Pts = f64;

/// Microseconds per second.
pub const MICROSECOND: f64 = 1_000_000.0;

/// Tolerance for timestamp equality. Decoders round to their time base,
/// so two stamps closer than this refer to the same instant.
pub const PTS_EPSILON: f64 = 1.0;

/// Compare two timestamps within [`PTS_EPSILON`].
#[inline]
pub fn pts_eq(a: Pts, b: Pts) -> bool {
    (a - b).abs() < PTS_EPSILON
}

/// Convert seconds to microseconds.
#[inline]
pub fn seconds(s: f64) -> Pts {
    s * MICROSECOND
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }

    /// The rate as an exact rational.
    #[inline]
    pub fn as_rational(self) -> Rational64 {
        Rational64::new(self.numerator as i64, self.denominator.max(1) as i64)
    }

    /// Duration of a single frame in microseconds.
    #[inline]
    pub fn frame_duration_us(self) -> Pts {
        if self.numerator == 0 {
            return 0.0;
        }
        MICROSECOND * self.denominator as f64 / self.numerator as f64
    }

    /// Exact number of audio samples spanned by one frame.
    pub fn samples_per_frame(self, sample_rate: u32) -> Rational64 {
        if self.numerator == 0 {
            return Rational64::from_integer(0);
        }
        Rational64::new(
            sample_rate as i64 * self.denominator as i64,
            self.numerator as i64,
        )
    }

    /// Index of the frame containing `pts`.
    #[inline]
    pub fn frame_index(self, pts: Pts) -> i64 {
        let dur = self.frame_duration_us();
        if dur <= 0.0 {
            return 0;
        }
        ((pts + PTS_EPSILON) / dur).floor() as i64
    }

    /// Snap `pts` to the nearest frame boundary.
    #[inline]
    pub fn quantize(self, pts: Pts) -> Pts {
        let dur = self.frame_duration_us();
        if dur <= 0.0 {
            return pts;
        }
        (pts / dur).round() * dur
    }

    /// Whether the rate is usable for timing.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}
