//! Source probing through ffprobe's JSON output.

use montage_core::{
    AudioLayout, ChromaLocation, ColorPrimaries, ColorSpace, FrameRate, GammaCurve, MontageError,
    Profile, Result, SampleFormat, MICROSECOND,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeStream {
    codec_type: String,
    codec_name: String,
    width: u32,
    height: u32,
    avg_frame_rate: String,
    r_frame_rate: String,
    sample_aspect_ratio: Option<String>,
    field_order: Option<String>,
    color_space: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_range: Option<String>,
    chroma_location: Option<String>,
    sample_rate: Option<String>,
    channels: u16,
    channel_layout: Option<String>,
    sample_fmt: Option<String>,
    start_time: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeFormat {
    start_time: Option<String>,
    duration: Option<String>,
}

/// Locate ffprobe: PATH first, then the ffmpeg-sidecar download location.
pub fn ffprobe_path() -> PathBuf {
    which::which("ffprobe").unwrap_or_else(|_| ffmpeg_sidecar::ffprobe::ffprobe_path())
}

/// Probe `path` into a stream profile.
pub fn probe_file(path: &Path) -> Result<Profile> {
    if !path.exists() {
        return Err(MontageError::NotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }
    let output = Command::new(ffprobe_path())
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()?;
    if !output.status.success() {
        return Err(MontageError::Source(format!(
            "{}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let profile = parse_probe(&String::from_utf8_lossy(&output.stdout))?;
    info!("Probed {}: {}", path.display(), profile);
    Ok(profile)
}

/// Build a profile from ffprobe's JSON.
pub fn parse_probe(json: &str) -> Result<Profile> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");
    if video.is_none() && audio.is_none() {
        return Err(MontageError::Source("No audio or video stream".into()));
    }

    let mut p = Profile {
        has_video: video.is_some(),
        has_audio: audio.is_some(),
        ..Profile::default()
    };

    if let Some(v) = video {
        p.width = v.width;
        p.height = v.height;
        p.frame_rate = parse_rate(&v.avg_frame_rate)
            .or_else(|| parse_rate(&v.r_frame_rate))
            .unwrap_or_default();
        p.sar = v
            .sample_aspect_ratio
            .as_deref()
            .and_then(|s| parse_ratio(s, ':'))
            .filter(|r| *r > 0.0)
            .unwrap_or(1.0);
        match v.field_order.as_deref() {
            Some("tt") | Some("tb") => {
                p.interlaced = true;
                p.top_field_first = true;
            }
            Some("bb") | Some("bt") => {
                p.interlaced = true;
                p.top_field_first = false;
            }
            _ => p.interlaced = false,
        }
        p.color_space = match v.color_space.as_deref() {
            Some("bt709") => ColorSpace::Bt709,
            Some("bt470bg") => ColorSpace::Bt601_625,
            Some("smpte170m") => ColorSpace::Bt601_525,
            Some("gbr") => ColorSpace::Srgb,
            // Untagged SD material is assumed 601, HD 709.
            _ if v.height < 720 => ColorSpace::Bt601_625,
            _ => ColorSpace::Bt709,
        };
        p.color_primaries = match v.color_primaries.as_deref() {
            Some("bt709") => ColorPrimaries::Bt709,
            Some("bt470bg") => ColorPrimaries::Bt601_625,
            Some("smpte170m") => ColorPrimaries::Bt601_525,
            _ => ColorPrimaries::Undefined,
        };
        p.gamma = match v.color_transfer.as_deref() {
            Some("bt709") => GammaCurve::Bt709,
            Some("smpte170m") | Some("bt470bg") => GammaCurve::Bt601,
            Some("iec61966-2-1") => GammaCurve::Srgb,
            _ => GammaCurve::Undefined,
        };
        p.chroma_location = match v.chroma_location.as_deref() {
            Some("left") => ChromaLocation::Left,
            Some("center") => ChromaLocation::Center,
            Some("topleft") => ChromaLocation::TopLeft,
            _ => ChromaLocation::Undefined,
        };
        p.full_range = v.color_range.as_deref() == Some("pc");
        p.video_codec = v.codec_name.clone();
    }

    if let Some(a) = audio {
        p.sample_rate = a
            .sample_rate
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(p.sample_rate);
        p.channels = if a.channels > 0 { a.channels } else { p.channels };
        p.sample_format = match a.sample_fmt.as_deref() {
            Some("s16") | Some("s16p") => SampleFormat::S16,
            Some("flt") | Some("fltp") => SampleFormat::F32,
            _ => SampleFormat::Native,
        };
        p.layout = match (a.channel_layout.as_deref(), p.channels) {
            (Some("stereo"), _) | (None, 2) => AudioLayout::Stereo,
            (Some(l), _) if l.starts_with("5.1") => AudioLayout::Surround51,
            _ => AudioLayout::Native,
        };
        p.layout_name = a
            .channel_layout
            .clone()
            .unwrap_or_else(|| format!("{} channels", p.channels));
        p.audio_codec = a.codec_name.clone();
    }

    let primary = video.or(audio);
    let format = probe.format.unwrap_or_default();
    p.stream_start_time = primary
        .and_then(|s| s.start_time.as_deref())
        .or(format.start_time.as_deref())
        .and_then(parse_seconds)
        .unwrap_or(0.0);
    p.stream_duration = format
        .duration
        .as_deref()
        .or(primary.and_then(|s| s.duration.as_deref()))
        .and_then(parse_seconds)
        .unwrap_or(0.0);
    debug!("Probe profile {:?}", p);
    Ok(p)
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().map(|v| v * MICROSECOND)
}

fn parse_ratio(s: &str, sep: char) -> Option<f64> {
    let (n, d) = s.split_once(sep)?;
    let (n, d): (f64, f64) = (n.parse().ok()?, d.parse().ok()?);
    (d != 0.0).then(|| n / d)
}

fn parse_rate(s: &str) -> Option<FrameRate> {
    let (n, d) = s.split_once('/')?;
    let rate = FrameRate::new(n.parse().ok()?, d.parse().ok()?);
    rate.is_valid().then_some(rate)
}
