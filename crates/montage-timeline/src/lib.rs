//! Montage Timeline - the scene model
//!
//! Implements the timeline the composer renders from:
//! - Sources shared between clips
//! - Clips with speed, placed filters and head transitions
//! - Tracks ordered front to back
//! - The scene with its placement rules and validated edits

pub mod clip;
pub mod edit;
pub mod scene;
pub mod source;
pub mod track;
pub mod transition;

pub use clip::{Clip, ClipId, PlacedFilter};
pub use edit::{Chain, SceneEdit};
pub use scene::{ActiveClips, Scene, SharedScene};
pub use source::Source;
pub use track::{ActiveClip, Track, TrackMix};
pub use transition::Transition;

#[cfg(test)]
pub(crate) fn test_source(duration_secs: f64) -> std::sync::Arc<Source> {
    use montage_core::{seconds, Profile};
    use montage_media::SyntheticSource;

    let media = std::sync::Arc::new(SyntheticSource::new("test", seconds(duration_secs)));
    let profile = Profile {
        stream_duration: seconds(duration_secs),
        ..Profile::default()
    };
    Source::with_profile(media, profile)
}
