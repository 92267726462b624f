//! Opening sources by name.

use montage_core::{seconds, FrameRate, MontageError, Result};
use montage_media::{FileSource, MediaSource, SyntheticSource};
use montage_timeline::Source;
use std::sync::Arc;

const SYNTHETIC_PREFIX: &str = "synthetic:";

/// Media for `name`: `synthetic:<seconds>` is a generated 1280x720 25 fps
/// source with audio, anything else a file decoded through FFmpeg.
pub fn media_for(name: &str) -> Result<Arc<dyn MediaSource>> {
    if let Some(secs) = name.strip_prefix(SYNTHETIC_PREFIX) {
        let secs: f64 = secs
            .parse()
            .map_err(|_| MontageError::InvalidParameter(format!("bad synthetic duration in {}", name)))?;
        if secs <= 0.0 {
            return Err(MontageError::InvalidParameter(format!("{} has no duration", name)));
        }
        let media = SyntheticSource::new(name, seconds(secs))
            .with_video(1280, 720, FrameRate::FPS_25)
            .with_audio();
        return Ok(Arc::new(media));
    }
    let path = std::path::Path::new(name);
    if !path.exists() {
        return Err(MontageError::NotFound(name.to_string()));
    }
    Ok(Arc::new(FileSource::new(path)))
}

/// Open and probe the source called `name`.
pub fn open_source(name: &str) -> Result<Arc<Source>> {
    Source::probe(media_for(name)?)
}
