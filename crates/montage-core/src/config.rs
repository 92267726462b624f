//! Pipeline tuning knobs.

use crate::error::Result;
use crate::time::{Pts, MICROSECOND};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Sizes and timings shared by the decode and compose stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Free video frames per input.
    pub input_frames: usize,
    /// Free frames in the composer output pool.
    pub output_frames: usize,
    /// Back-off when a loop has nothing to do.
    pub poll_interval_us: u64,
    /// Capacity of each input's audio list, in seconds of audio.
    pub audio_list_seconds: f64,
    /// Backward playback decodes a new window only when fewer samples
    /// than this remain buffered.
    pub backward_audio_low_water: usize,
    /// Largest overlap allowed between neighbouring clips.
    pub transition_margin_us: Pts,
    /// Inputs for clips starting this far ahead of the playhead are
    /// opened early.
    pub forward_lookup_us: Pts,
    /// Idle bytes the buffer pool keeps for reuse.
    pub buffer_pool_budget: usize,
    /// Bytes of GPU textures the texture pool may keep alive.
    pub gpu_texture_budget: u64,
    /// How long a frame request waits for audio before padding with silence.
    pub audio_wait_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_frames: 8,
            output_frames: 4,
            poll_interval_us: 1000,
            audio_list_seconds: 1.0,
            backward_audio_low_water: 2000,
            transition_margin_us: MICROSECOND,
            forward_lookup_us: 2.0 * MICROSECOND,
            buffer_pool_budget: 256 * 1024 * 1024,
            gpu_texture_budget: 512 * 1024 * 1024,
            audio_wait_ms: 20,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us.max(1))
    }

    #[inline]
    pub fn audio_wait(&self) -> Duration {
        Duration::from_millis(self.audio_wait_ms)
    }
}
