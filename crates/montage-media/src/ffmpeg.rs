//! File decoding through an FFmpeg subprocess (ffmpeg-sidecar).
//!
//! Video and audio are read from two child processes: one emitting raw
//! RGBA frames, one emitting interleaved PCM already converted to the
//! output rate, layout and sample format. Seeking restarts both children
//! with `-ss`.

use crate::decoder::{MediaDecoder, MediaSource};
use crate::probe::probe_file;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use ffmpeg_sidecar::iter::FfmpegIterator;
use montage_audio::AudioFrame;
use montage_core::{
    Frame, FrameKind, MontageError, Profile, Pts, Result, SampleFormat, MICROSECOND,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Samples requested per audio decode call.
const AUDIO_CHUNK_SAMPLES: usize = 1024;

/// Locate ffmpeg: PATH first, then the ffmpeg-sidecar download location.
pub fn ffmpeg_path() -> PathBuf {
    which::which("ffmpeg").unwrap_or_else(|_| ffmpeg_sidecar::paths::ffmpeg_path())
}

/// A media file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> Result<Profile> {
        probe_file(&self.path)
    }

    fn open(&self, output: &Profile) -> Result<Box<dyn MediaDecoder>> {
        Ok(Box::new(FfmpegDecoder::open(&self.path, output)?))
    }
}

/// One running FFmpeg child and its event stream.
struct Pipe {
    child: FfmpegChild,
    events: FfmpegIterator,
}

impl Pipe {
    fn spawn(mut command: FfmpegCommand) -> Result<Self> {
        let mut child = command
            .spawn()
            .map_err(|e| MontageError::Decoder(format!("Failed to start ffmpeg: {}", e)))?;
        let events = child
            .iter()
            .map_err(|e| MontageError::Decoder(format!("ffmpeg output unavailable: {}", e)))?;
        Ok(Self { child, events })
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct FfmpegDecoder {
    path: PathBuf,
    profile: Profile,
    output: Profile,
    video: Option<Pipe>,
    audio: Option<Pipe>,
    /// Where the current children started, stream time.
    base: Pts,
    samples_read: u64,
    /// Bytes of a partial sample carried between chunks.
    pending: Vec<u8>,
}

impl FfmpegDecoder {
    pub fn open(path: &Path, output: &Profile) -> Result<Self> {
        let profile = probe_file(path)?;
        info!("Opening {} ({})", path.display(), profile);
        let mut decoder = Self {
            path: path.to_path_buf(),
            profile,
            output: output.clone(),
            video: None,
            audio: None,
            base: 0.0,
            samples_read: 0,
            pending: Vec::new(),
        };
        let start = decoder.profile.stream_start_time;
        decoder.restart(start)?;
        Ok(decoder)
    }

    fn restart(&mut self, pts: Pts) -> Result<()> {
        self.video = None;
        self.audio = None;
        self.pending.clear();
        self.samples_read = 0;
        self.base = pts.max(self.profile.stream_start_time);
        let offset = format!("{:.6}", (self.base - self.profile.stream_start_time) / MICROSECOND);
        let input = self.path.to_string_lossy().to_string();

        if self.profile.has_video {
            let mut cmd = FfmpegCommand::new_with_path(ffmpeg_path());
            cmd.hide_banner()
                .args(["-ss", offset.as_str()])
                .input(&input)
                .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba"])
                .output("-");
            self.video = Some(Pipe::spawn(cmd)?);
        }
        if self.profile.has_audio {
            let format = match self.output.sample_format {
                SampleFormat::S16 => "s16le",
                SampleFormat::F32 | SampleFormat::Native => "f32le",
            };
            let rate = self.output.sample_rate.to_string();
            let channels = self.output.channels.to_string();
            let mut cmd = FfmpegCommand::new_with_path(ffmpeg_path());
            cmd.hide_banner()
                .args(["-ss", offset.as_str()])
                .input(&input)
                .args(["-vn", "-f", format, "-ar", rate.as_str(), "-ac", channels.as_str()])
                .output("-");
            self.audio = Some(Pipe::spawn(cmd)?);
        }
        debug!("ffmpeg restarted at {:.0}", self.base);
        Ok(())
    }
}

impl MediaDecoder for FfmpegDecoder {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    fn seek(&mut self, pts: Pts) -> Result<()> {
        self.restart(pts)
    }

    fn decode_video(&mut self, frame: &mut Frame) -> Result<Option<Pts>> {
        let Some(pipe) = self.video.as_mut() else {
            return Ok(None);
        };
        let duration = self.profile.frame_duration();
        for event in pipe.events.by_ref() {
            match event {
                FfmpegEvent::OutputFrame(out) => {
                    let mut profile = self.profile.clone();
                    profile.width = out.width;
                    profile.height = out.height;
                    let pts = self.base + out.frame_num as f64 * duration;
                    frame.set_video_frame(FrameKind::Rgba, &profile, pts);
                    let data = frame.data_mut();
                    let n = data.len().min(out.data.len());
                    data[..n].copy_from_slice(&out.data[..n]);
                    return Ok(Some(duration));
                }
                FfmpegEvent::Error(e) => {
                    return Err(MontageError::Decoder(format!("{}: {}", self.path.display(), e)))
                }
                FfmpegEvent::Done => break,
                _ => {}
            }
        }
        Ok(None)
    }

    fn decode_audio(&mut self, frame: &mut AudioFrame) -> Result<bool> {
        let Some(pipe) = self.audio.as_mut() else {
            return Ok(false);
        };
        let bps = frame.bytes_per_sample().max(1);
        let wanted = AUDIO_CHUNK_SAMPLES * bps;
        let mut done = false;
        while self.pending.len() < wanted {
            match pipe.events.next() {
                Some(FfmpegEvent::OutputChunk(bytes)) => self.pending.extend_from_slice(&bytes),
                Some(FfmpegEvent::Error(e)) => trace!("ffmpeg audio: {}", e),
                Some(FfmpegEvent::Done) | None => {
                    done = true;
                    break;
                }
                Some(_) => {}
            }
        }
        let samples = (self.pending.len() / bps).min(AUDIO_CHUNK_SAMPLES);
        if samples == 0 {
            if !self.pending.is_empty() {
                warn!("Dropping {} trailing audio bytes", self.pending.len());
                self.pending.clear();
            }
            return Ok(!done);
        }
        let Some(dst) = frame.write(0, samples) else {
            return Ok(false);
        };
        dst.copy_from_slice(&self.pending[..samples * bps]);
        self.pending.drain(..samples * bps);
        let pts = self.base + self.output.samples_duration(self.samples_read as usize);
        frame.write_done(pts, samples, 0);
        self.samples_read += samples as u64;
        Ok(true)
    }
}
