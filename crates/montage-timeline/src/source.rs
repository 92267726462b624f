//! Media referenced by clips.

use montage_core::{Profile, Pts, Result};
use montage_media::MediaSource;
use std::sync::Arc;
use tracing::info;

/// A probed media source shared by every clip cut from it.
#[derive(Debug, Clone)]
pub struct Source {
    media: Arc<dyn MediaSource>,
    profile: Profile,
}

impl Source {
    /// Probe `media` and keep its profile.
    pub fn probe(media: Arc<dyn MediaSource>) -> Result<Arc<Self>> {
        let profile = media.probe()?;
        info!("Source {}: {}", media.name(), profile);
        Ok(Arc::new(Self { media, profile }))
    }

    /// A source whose profile is already known.
    pub fn with_profile(media: Arc<dyn MediaSource>, profile: Profile) -> Arc<Self> {
        Arc::new(Self { media, profile })
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.media.name()
    }

    #[inline]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn media(&self) -> Arc<dyn MediaSource> {
        Arc::clone(&self.media)
    }

    /// First timestamp in the source.
    #[inline]
    pub fn start(&self) -> Pts {
        self.profile.stream_start_time
    }

    /// End of the source, or `None` when its duration is unknown.
    pub fn end(&self) -> Option<Pts> {
        (self.profile.stream_duration > 0.0).then(|| self.profile.stream_end())
    }
}
