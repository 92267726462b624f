//! Frame-rate conversion by duplicating or dropping decoded frames.
//!
//! Decisions are made from timestamps rather than frame counts, so
//! irregular (VFR) sources convert as well as constant-rate ones. Every
//! emitted frame is restamped onto the output grid.

use montage_core::{Pts, PTS_EPSILON};
use tracing::debug;

/// What to do with a freshly decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resample {
    /// Rates match; keep the frame and its timestamp.
    Pass,
    /// Emit the frame at `pts`, then `repeats` duplicates of it.
    Emit { pts: Pts, repeats: u32 },
    /// The frame is ahead of schedule; release it.
    Drop,
}

#[derive(Debug, Clone)]
pub struct VideoResampler {
    output_duration: Pts,
    passthrough: bool,
    /// Start of the next output slot, set by the first frame after a reset.
    output_pts: Option<Pts>,
    repeats: u32,
}

impl VideoResampler {
    /// `passthrough` when the source and output rates are equal.
    pub fn new(output_duration: Pts, passthrough: bool) -> Self {
        Self {
            output_duration,
            passthrough,
            output_pts: None,
            repeats: 0,
        }
    }

    /// Forget timing state. The next frame anchors the output grid.
    pub fn reset(&mut self) {
        self.output_pts = None;
        self.repeats = 0;
    }

    #[inline]
    pub fn output_duration(&self) -> Pts {
        self.output_duration
    }

    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Duplicates still owed for the last emitted frame.
    #[inline]
    pub fn pending_repeats(&self) -> u32 {
        self.repeats
    }

    /// Decide the fate of a frame at `pts` lasting `duration`.
    pub fn push(&mut self, pts: Pts, duration: Pts) -> Resample {
        if self.passthrough {
            return Resample::Pass;
        }
        let out = self.output_duration;
        let slot = *self.output_pts.get_or_insert(pts);
        let delta = (pts + duration) - (slot + out);
        // A frame ending on the slot start does not cover the slot.
        if delta <= PTS_EPSILON - out {
            debug!("Drop frame {:.0}, delta {:.0}, output {:.0}", pts, delta, slot);
            return Resample::Drop;
        }
        let repeats = if delta >= out {
            // The +1 keeps a frame ending exactly on a slot boundary from
            // falling one duplicate short.
            let n = ((delta + 1.0) / out).round() as u32;
            debug!("Duplicate frame {:.0} x{}, delta {:.0}, output {:.0}", pts, n, delta, slot);
            n
        } else {
            0
        };
        self.repeats = repeats;
        self.output_pts = Some(slot + out);
        Resample::Emit { pts: slot, repeats }
    }

    /// Timestamp for the next owed duplicate, if any.
    pub fn next_repeat(&mut self) -> Option<Pts> {
        if self.repeats == 0 {
            return None;
        }
        let slot = self.output_pts?;
        self.repeats -= 1;
        self.output_pts = Some(slot + self.output_duration);
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::{FrameRate, MICROSECOND};
    use proptest::prelude::*;

    /// Push `frames` evenly spaced source frames and collect output stamps.
    fn convert(input: FrameRate, output: FrameRate, frames: usize) -> Vec<Pts> {
        let d = input.frame_duration_us();
        let mut r = VideoResampler::new(output.frame_duration_us(), input == output);
        let mut out = Vec::new();
        for i in 0..frames {
            let pts = i as f64 * d;
            match r.push(pts, d) {
                Resample::Pass => out.push(pts),
                Resample::Emit { pts, .. } => {
                    out.push(pts);
                    while let Some(p) = r.next_repeat() {
                        out.push(p);
                    }
                }
                Resample::Drop => {}
            }
        }
        out
    }

    #[test]
    fn test_30_to_25_drops_one_in_six() {
        let out = convert(FrameRate::FPS_30, FrameRate::FPS_25, 30);
        assert_eq!(out.len(), 25);
        assert!(out.iter().all(|&p| p < MICROSECOND));
        for w in out.windows(2) {
            assert!((w[1] - w[0] - 40_000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_25_to_50_doubles() {
        let out = convert(FrameRate::FPS_25, FrameRate::FPS_50, 25);
        assert_eq!(out.len(), 50);
        assert_eq!(out[1], 20_000.0);
    }

    #[test]
    fn test_same_rate_passes() {
        let mut r = VideoResampler::new(40_000.0, true);
        assert_eq!(r.push(123.0, 40_000.0), Resample::Pass);
        assert_eq!(r.next_repeat(), None);
    }

    #[test]
    fn test_reset_reanchors() {
        let mut r = VideoResampler::new(40_000.0, false);
        r.push(0.0, 33_333.0);
        r.reset();
        assert_eq!(
            r.push(5_000_000.0, 33_333.0),
            Resample::Emit {
                pts: 5_000_000.0,
                repeats: 0
            }
        );
    }

    #[test]
    fn test_vfr_gap_is_filled() {
        let mut r = VideoResampler::new(40_000.0, false);
        assert!(matches!(r.push(0.0, 40_000.0), Resample::Emit { repeats: 0, .. }));
        // Next frame lasts three output slots.
        assert_eq!(
            r.push(40_000.0, 120_000.0),
            Resample::Emit {
                pts: 40_000.0,
                repeats: 2
            }
        );
        assert_eq!(r.next_repeat(), Some(80_000.0));
        assert_eq!(r.next_repeat(), Some(120_000.0));
        assert_eq!(r.next_repeat(), None);
    }

    proptest! {
        #[test]
        fn prop_output_is_fixed_step(
            durations in proptest::collection::vec(10_000.0f64..90_000.0, 1..120)
        ) {
            let mut r = VideoResampler::new(40_000.0, false);
            let mut pts = 0.0;
            let mut out: Vec<Pts> = Vec::new();
            for d in durations {
                if let Resample::Emit { pts: p, .. } = r.push(pts, d) {
                    out.push(p);
                    while let Some(p) = r.next_repeat() {
                        out.push(p);
                    }
                }
                pts += d;
            }
            for w in out.windows(2) {
                prop_assert!((w[1] - w[0] - 40_000.0).abs() < 1e-6);
            }
        }
    }
}
