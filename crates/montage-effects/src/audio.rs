//! Reference audio filters.

use crate::filter::AudioFilter;
use crate::param::AnimatedParam;
use montage_core::Pts;

/// Linear gain, ramped across each chunk when animated.
#[derive(Debug, Clone)]
pub struct Gain {
    pub gain: AnimatedParam,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self { gain: gain.into() }
    }

    /// Gain from decibels.
    pub fn from_db(db: f32) -> Self {
        Self::new(10f32.powf(db / 20.0))
    }
}

impl AudioFilter for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn process(&self, pts: Pts, samples: &mut [f32], channels: usize, sample_duration: Pts) {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        if frames == 0 {
            return;
        }
        let start = self.gain.evaluate(pts);
        let end = self.gain.evaluate(pts + sample_duration * frames as f64);
        let step = (end - start) / frames as f32;
        for (i, frame) in samples.chunks_exact_mut(channels).enumerate() {
            let g = start + step * i as f32;
            for s in frame {
                *s *= g;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Easing;

    #[test]
    fn test_constant_gain() {
        let mut buf = vec![0.5f32; 8];
        Gain::new(2.0).process(0.0, &mut buf, 2, 20.0);
        assert!(buf.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_db_conversion() {
        let g = Gain::from_db(-6.0).gain.evaluate(0.0);
        assert!((g - 0.501).abs() < 0.01);
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let mut gain = Gain::new(0.0);
        gain.gain.set(0.0, 0.0, Easing::Linear);
        gain.gain.set(100.0, 1.0, Easing::Linear);
        let mut buf = vec![1.0f32; 10];
        gain.process(0.0, &mut buf, 1, 10.0);
        assert_eq!(buf[0], 0.0);
        assert!(buf.windows(2).all(|w| w[1] > w[0]));
    }
}
