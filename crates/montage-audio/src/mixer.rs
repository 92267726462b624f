//! Track mixer: sums per-track sample blocks into one output block.

/// Per-track mixer channel configuration.
#[derive(Debug, Clone)]
pub struct MixerChannel {
    /// Volume (0.0 to 1.0).
    pub volume: f32,
    /// Pan (-1.0 = full left, 0.0 = center, 1.0 = full right).
    pub pan: f32,
    /// Whether this channel is muted.
    pub muted: bool,
    /// Whether this channel is soloed.
    pub solo: bool,
}

impl Default for MixerChannel {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
        }
    }
}

impl MixerChannel {
    /// Left/right gain from volume and pan (constant-power panning),
    /// normalized so a centred channel passes at unity.
    pub fn stereo_gain(&self) -> (f32, f32) {
        if self.muted {
            return (0.0, 0.0);
        }
        let angle = (self.pan + 1.0) * 0.25 * std::f32::consts::PI;
        let norm = std::f32::consts::SQRT_2;
        (
            self.volume * angle.cos() * norm,
            self.volume * angle.sin() * norm,
        )
    }
}

/// Combines per-track interleaved `f32` blocks. The sum is clipped to
/// full scale.
pub struct Mixer {
    channels: Vec<MixerChannel>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Mixer {
    pub fn new(num_channels: usize) -> Self {
        Self {
            channels: (0..num_channels).map(|_| MixerChannel::default()).collect(),
        }
    }

    pub fn channel(&self, index: usize) -> Option<&MixerChannel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut MixerChannel> {
        self.channels.get_mut(index)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Grow or shrink to `count` channels, keeping existing settings.
    pub fn set_channel_count(&mut self, count: usize) {
        self.channels.resize_with(count, MixerChannel::default);
    }

    fn any_solo(&self) -> bool {
        self.channels.iter().any(|c| c.solo)
    }

    /// Mix `sources` (one block per channel, `None` for silent tracks) into
    /// `out`, which holds interleaved samples with `layout_channels`
    /// channels. Pan only applies to stereo output.
    pub fn mix(&self, sources: &[Option<&[f32]>], layout_channels: usize, out: &mut [f32]) {
        out.fill(0.0);
        let has_solo = self.any_solo();
        let stereo = layout_channels == 2;

        for (idx, source) in sources.iter().enumerate() {
            let Some(source) = source else { continue };
            let default = MixerChannel::default();
            let channel = self.channels.get(idx).unwrap_or(&default);
            if has_solo && !channel.solo {
                continue;
            }
            if stereo {
                let (gain_l, gain_r) = channel.stereo_gain();
                for (dst, src) in out.chunks_exact_mut(2).zip(source.chunks_exact(2)) {
                    dst[0] += src[0] * gain_l;
                    dst[1] += src[1] * gain_r;
                }
            } else {
                let gain = if channel.muted { 0.0 } else { channel.volume };
                for (dst, src) in out.iter_mut().zip(source.iter()) {
                    *dst += src * gain;
                }
            }
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_gain_center_is_unity() {
        let ch = MixerChannel::default();
        let (l, r) = ch.stereo_gain();
        assert!((l - 1.0).abs() < 1e-5);
        assert!((r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stereo_gain_muted() {
        let ch = MixerChannel {
            muted: true,
            ..Default::default()
        };
        assert_eq!(ch.stereo_gain(), (0.0, 0.0));
    }

    #[test]
    fn test_stereo_gain_pan_left() {
        let ch = MixerChannel {
            pan: -1.0,
            ..Default::default()
        };
        let (l, r) = ch.stereo_gain();
        assert!(l > r);
        assert!(r.abs() < 0.01);
    }

    #[test]
    fn test_mix_sums_tracks() {
        let mixer = Mixer::new(2);
        let a = vec![0.25f32; 8];
        let b = vec![0.5f32; 8];
        let mut out = vec![0.0f32; 8];
        mixer.mix(&[Some(a.as_slice()), Some(b.as_slice())], 2, &mut out);
        for s in &out {
            assert!((s - 0.75).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mix_skips_silent_tracks() {
        let mixer = Mixer::new(2);
        let b = vec![0.5f32; 4];
        let mut out = vec![1.0f32; 4];
        mixer.mix(&[None, Some(b.as_slice())], 1, &mut out);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_mix_solo() {
        let mut mixer = Mixer::new(2);
        mixer.channel_mut(1).unwrap().solo = true;
        let a = vec![1.0f32; 8];
        let b = vec![0.5f32; 8];
        let mut out = vec![0.0f32; 8];
        mixer.mix(&[Some(a.as_slice()), Some(b.as_slice())], 2, &mut out);
        for s in &out {
            assert!((s - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mix_clips_to_full_scale() {
        let mixer = Mixer::new(2);
        let loud = vec![0.75f32; 8];
        let mut out = vec![0.0f32; 8];
        mixer.mix(&[Some(loud.as_slice()), Some(loud.as_slice())], 2, &mut out);
        assert!(out.iter().all(|&s| s == 1.0));
    }
}
