//! The contract a filter satisfies to take part in composition.

use montage_core::{Profile, Pts};
use montage_gpu::GraphFragment;
use std::fmt;
use std::sync::Arc;

/// A video filter contributes graph nodes after its input.
///
/// `pts` is source time (after clip offset and speed), so animated
/// parameters follow the material rather than the timeline position.
pub trait VideoFilter: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Nodes to splice in for the frame at `pts`. An empty fragment
    /// passes the input through.
    fn graph(&self, pts: Pts, profile: &Profile) -> GraphFragment;
}

/// An audio filter processes interleaved f32 samples in place.
pub trait AudioFilter: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// `pts` is the source time of the first sample; `sample_duration` the
    /// spacing between consecutive samples.
    fn process(&self, pts: Pts, samples: &mut [f32], channels: usize, sample_duration: Pts);
}

/// A filter attached to a clip.
#[derive(Debug, Clone)]
pub enum Filter {
    Video(Arc<dyn VideoFilter>),
    Audio(Arc<dyn AudioFilter>),
}

impl Filter {
    pub fn video(filter: impl VideoFilter + 'static) -> Self {
        Self::Video(Arc::new(filter))
    }

    pub fn audio(filter: impl AudioFilter + 'static) -> Self {
        Self::Audio(Arc::new(filter))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Video(f) => f.name(),
            Self::Audio(f) => f.name(),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }
}
