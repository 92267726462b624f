//! Shared fixtures.

use montage_core::{seconds, BufferPool, FrameRate, PipelineConfig, Profile};
use montage_engine::Composer;
use montage_gpu::CpuExecutor;
use montage_media::SyntheticSource;
use montage_timeline::{Scene, SceneEdit, Source};
use std::sync::Arc;

/// 8x8 project at `rate` with 8 kHz stereo audio.
pub fn project(rate: FrameRate) -> Profile {
    Profile {
        sample_rate: 8000,
        ..Profile::project(8, 8, rate)
    }
}

pub fn media(name: &str, secs: f64, rate: FrameRate) -> SyntheticSource {
    SyntheticSource::new(name, seconds(secs))
        .with_video(8, 8, rate)
        .with_audio()
}

/// One track holding a clip over the whole of `media`.
pub fn single_clip_scene(media: SyntheticSource, profile: Profile) -> Scene {
    let length = media.duration;
    let source = Source::probe(Arc::new(media)).unwrap();
    let mut scene = Scene::with_tracks(profile, &PipelineConfig::default(), 1);
    let clip = scene.create_clip(source, 0.0, 0.0, length);
    SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene).unwrap();
    scene.take_update();
    scene
}

pub fn cpu_composer(scene: Scene) -> Composer {
    Composer::new(scene.into_shared(), &PipelineConfig::default(), &BufferPool::default())
        .with_executor(Box::new(CpuExecutor::new()))
}
