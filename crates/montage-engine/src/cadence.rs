//! Audio samples per video frame at fractional ratios.

use montage_core::Profile;
use num_rational::Rational64;

/// Splits the exact samples-per-frame ratio into whole per-frame counts,
/// carrying the remainder so no sample is lost or invented over time.
/// 48 kHz at 29.97 fps yields 1601 or 1602 samples, 8008 every 5 frames.
#[derive(Debug, Clone)]
pub struct AudioCadence {
    per_frame: Rational64,
    remainder: Rational64,
}

impl AudioCadence {
    pub fn new(profile: &Profile) -> Self {
        Self {
            per_frame: profile.frame_rate.samples_per_frame(profile.sample_rate),
            remainder: Rational64::from_integer(0),
        }
    }

    /// Samples for the next frame.
    pub fn next_count(&mut self) -> usize {
        let total = self.remainder + self.per_frame;
        let whole = total.floor();
        self.remainder = total - whole;
        whole.to_integer().max(0) as usize
    }

    /// Restart the cadence, as after a seek.
    pub fn reset(&mut self) {
        self.remainder = Rational64::from_integer(0);
    }
}
