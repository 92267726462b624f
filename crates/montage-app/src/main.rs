//! Montage - headless timeline player.
//!
//! Builds a one-clip scene from a media file or a synthetic source, plays
//! it through the composer and reports what comes out.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, PlayArgs};
use montage_core::{seconds, BufferPool, FrameRate, PipelineConfig, Profile, MICROSECOND};
use montage_effects::FilterRegistry;
use montage_engine::{open_source, ChannelSink, Composer, Engine, SinkEvent};
use montage_gpu::{CpuExecutor, EffectParams, GpuContext, GpuExecutor, GraphExecutor};
use montage_timeline::{Chain, ClipId, PlacedFilter, Scene, SceneEdit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long the player waits for the composer before giving up.
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Probe { path } => probe(&path),
        Command::Play(args) => play(&args, &config),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("montage").join("pipeline.json"))
}

/// An explicit `--config` must exist; the per-user file is optional.
fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => PipelineConfig::load(&path)
            .with_context(|| format!("reading config {}", path.display())),
        _ => Ok(PipelineConfig::default()),
    }
}

fn probe(name: &str) -> Result<()> {
    let media = montage_engine::media_for(name)?;
    let profile = Engine::probe(media.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn executor(gpu: bool, config: &PipelineConfig) -> Box<dyn GraphExecutor> {
    if gpu {
        match GpuContext::headless_blocking() {
            Ok(context) => {
                info!("Rendering on {}", context.adapter_name());
                return Box::new(GpuExecutor::new(Arc::new(context), config.gpu_texture_budget));
            }
            Err(e) => warn!("No GPU available, rendering on the CPU: {}", e),
        }
    }
    Box::new(CpuExecutor::new())
}

/// Project profile for a source: its geometry, at `fps` when given.
fn project_profile(source: &Profile, fps: Option<u32>) -> Profile {
    let rate = fps.map(|f| FrameRate::new(f, 1)).unwrap_or(source.frame_rate);
    let (width, height) = if source.has_video {
        (source.width, source.height)
    } else {
        (1280, 720)
    };
    Profile::project(width, height, rate)
}

/// Attach built-in filters, with their default parameters, to `clip`.
fn add_filters(scene: &mut Scene, clip: ClipId, names: &[String]) -> Result<()> {
    let registry = FilterRegistry::new();
    for name in names {
        let filter = registry.create(name, &EffectParams::new()).with_context(|| {
            let known: Vec<&str> = registry.names().collect();
            format!("known filters: {}", known.join(", "))
        })?;
        let chain = if filter.is_video() { Chain::Video } else { Chain::Audio };
        SceneEdit::AddFilter {
            clip,
            chain,
            filter: PlacedFilter::whole(filter),
        }
        .apply(scene)?;
        info!("Added {} filter", name);
    }
    Ok(())
}

fn play(args: &PlayArgs, config: &PipelineConfig) -> Result<()> {
    let source = open_source(&args.source)?;
    let profile = project_profile(source.profile(), args.fps);
    let length = args
        .seconds
        .map(seconds)
        .unwrap_or(source.profile().stream_duration)
        .min(source.profile().stream_duration);
    anyhow::ensure!(length > 0.0, "{} has nothing to play", args.source);

    let mut scene = Scene::with_tracks(profile.clone(), config, 1);
    let clip = scene.create_clip(source, 0.0, 0.0, length);
    let id = clip.id();
    SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene)?;
    add_filters(&mut scene, id, &args.filters)?;
    scene.take_update();

    let buffers = BufferPool::new(config.buffer_pool_budget);
    let composer = Composer::new(scene.into_shared(), config, &buffers).with_executor(executor(args.gpu, config));
    let (sink, events) = ChannelSink::new(config.output_frames.max(1));
    let engine = Engine::start(composer, Arc::new(sink))?;

    // Backward playback without --from starts on the last frame.
    let start = if args.backward && args.from <= 0.0 {
        length - profile.frame_duration()
    } else {
        seconds(args.from)
    };
    engine.seek(start, args.backward)?;
    engine.play(true)?;
    info!(
        "Playing {} at {}x{} {:.3} fps{}",
        args.source,
        profile.width,
        profile.height,
        profile.frame_rate.to_fps_f64(),
        if args.backward { " backward" } else { "" }
    );

    let began = Instant::now();
    let mut frames = 0usize;
    let mut samples = 0usize;
    let mut first = None;
    let mut last = None;
    loop {
        match events.recv_timeout(STALL_TIMEOUT) {
            Ok(SinkEvent::Video(frame)) => {
                frames += 1;
                first.get_or_insert(frame.pts);
                last = Some(frame.pts);
            }
            Ok(SinkEvent::Audio(frame)) => samples += frame.audio_samples(),
            Ok(SinkEvent::EndOfStream) => break,
            Err(_) => {
                warn!("Composer stalled after {} frames", frames);
                break;
            }
        }
    }
    drop(engine);

    let channels = profile.channels.max(1) as usize;
    info!(
        "Composed {} frames from {:.3}s to {:.3}s, {} audio samples per channel in {:.2?}",
        frames,
        first.unwrap_or(0.0) / MICROSECOND,
        last.unwrap_or(0.0) / MICROSECOND,
        samples / channels,
        began.elapsed()
    );
    Ok(())
}
