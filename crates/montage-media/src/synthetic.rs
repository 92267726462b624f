//! Generated sources for exercising the pipeline without media files.
//!
//! Every video frame carries its index in the first pixel and audio is a
//! deterministic ramp, so ordering can be checked after decode, resampling
//! and reversal.

use crate::decoder::{MediaDecoder, MediaSource};
use montage_audio::convert::from_f32;
use montage_audio::AudioFrame;
use montage_core::{
    Frame, FrameKind, FrameRate, MontageError, Profile, Pts, Result, MICROSECOND,
};

#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Frame start times relative to the stream start. Constant rate
    /// when `None`.
    pub timestamps: Option<Vec<Pts>>,
}

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub name: String,
    pub video: Option<SyntheticVideo>,
    pub audio: bool,
    pub start_time: Pts,
    pub duration: Pts,
    /// Video decode fails at this frame index and every call after it.
    pub fail_video_at: Option<usize>,
    pub fail_open: bool,
    /// Samples per decoded audio chunk.
    pub chunk_samples: usize,
}

impl SyntheticSource {
    pub fn new(name: &str, duration: Pts) -> Self {
        Self {
            name: name.to_string(),
            video: None,
            audio: false,
            start_time: 0.0,
            duration,
            fail_video_at: None,
            fail_open: false,
            chunk_samples: 1024,
        }
    }

    pub fn with_video(mut self, width: u32, height: u32, frame_rate: FrameRate) -> Self {
        self.video = Some(SyntheticVideo {
            width,
            height,
            frame_rate,
            timestamps: None,
        });
        self
    }

    /// Variable frame timing; `frame_rate` stays the nominal rate.
    pub fn with_timestamps(mut self, timestamps: Vec<Pts>) -> Self {
        if let Some(v) = self.video.as_mut() {
            v.timestamps = Some(timestamps);
        }
        self
    }

    pub fn with_audio(mut self) -> Self {
        self.audio = true;
        self
    }

    pub fn starting_at(mut self, start: Pts) -> Self {
        self.start_time = start;
        self
    }

    pub fn fail_video_at(mut self, index: usize) -> Self {
        self.fail_video_at = Some(index);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn stream_profile(&self, output: &Profile) -> Profile {
        let mut p = Profile {
            has_video: self.video.is_some(),
            has_audio: self.audio,
            sample_rate: output.sample_rate,
            channels: output.channels,
            sample_format: output.sample_format,
            layout: output.layout,
            layout_name: output.layout_name.clone(),
            audio_codec: "pcm".into(),
            video_codec: "synthetic".into(),
            stream_start_time: self.start_time,
            stream_duration: self.duration,
            ..Profile::default()
        };
        if let Some(v) = &self.video {
            p.width = v.width;
            p.height = v.height;
            p.frame_rate = v.frame_rate;
            p.full_range = true;
        }
        p
    }
}

impl MediaSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> Result<Profile> {
        if self.fail_open {
            return Err(MontageError::Source(format!("{}: unreadable", self.name)));
        }
        Ok(self.stream_profile(&Profile::default()))
    }

    fn open(&self, output: &Profile) -> Result<Box<dyn MediaDecoder>> {
        if self.fail_open {
            return Err(MontageError::Source(format!("{}: unreadable", self.name)));
        }
        Ok(Box::new(SyntheticDecoder::new(self.clone(), output)))
    }
}

/// Index written into the first pixel of a synthetic frame.
pub fn frame_tag(frame: &Frame) -> Option<u32> {
    match frame.data() {
        [r, g, b, ..] => Some(u32::from_le_bytes([*r, *g, *b, 0])),
        _ => None,
    }
}

/// Value of sample `index` on every channel.
pub fn audio_sample(index: u64) -> f32 {
    (index % 1000) as f32 / 1000.0 - 0.5
}

pub struct SyntheticDecoder {
    source: SyntheticSource,
    profile: Profile,
    frame_count: usize,
    next_video: usize,
    total_samples: u64,
    next_sample: u64,
    scratch: Vec<f32>,
}

impl SyntheticDecoder {
    pub fn new(source: SyntheticSource, output: &Profile) -> Self {
        let profile = source.stream_profile(output);
        let frame_count = match &source.video {
            Some(SyntheticVideo {
                timestamps: Some(ts),
                ..
            }) => ts.iter().filter(|&&t| t < source.duration).count(),
            Some(v) => (source.duration / v.frame_rate.frame_duration_us() - 1e-6)
                .ceil()
                .max(0.0) as usize,
            None => 0,
        };
        let total_samples = if source.audio {
            profile.samples_in(source.duration) as u64
        } else {
            0
        };
        Self {
            source,
            profile,
            frame_count,
            next_video: 0,
            total_samples,
            next_sample: 0,
            scratch: Vec::new(),
        }
    }

    /// Start time and duration of frame `index`, relative to stream start.
    fn frame_span(&self, index: usize) -> (Pts, Pts) {
        let d = self.profile.frame_duration();
        match self.source.video.as_ref().and_then(|v| v.timestamps.as_ref()) {
            Some(ts) => {
                let start = ts[index];
                let end = ts
                    .get(index + 1)
                    .copied()
                    .unwrap_or(self.source.duration)
                    .max(start + 1.0);
                (start, end - start)
            }
            None => (index as f64 * d, d),
        }
    }

    fn frame_at(&self, rel: Pts) -> usize {
        let index = match self.source.video.as_ref().and_then(|v| v.timestamps.as_ref()) {
            Some(ts) => ts.partition_point(|&t| t <= rel + 1e-6).saturating_sub(1),
            None => (rel / self.profile.frame_duration() + 1e-6).floor().max(0.0) as usize,
        };
        index.min(self.frame_count)
    }
}

impl MediaDecoder for SyntheticDecoder {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    fn seek(&mut self, pts: Pts) -> Result<()> {
        let rel = (pts - self.source.start_time).max(0.0);
        self.next_video = self.frame_at(rel);
        self.next_sample = (self.profile.samples_in(rel) as u64).min(self.total_samples);
        Ok(())
    }

    fn decode_video(&mut self, frame: &mut Frame) -> Result<Option<Pts>> {
        if self.next_video >= self.frame_count {
            return Ok(None);
        }
        if self.source.fail_video_at.is_some_and(|i| self.next_video >= i) {
            return Err(MontageError::Decoder(format!(
                "{}: corrupt video packet {}",
                self.source.name, self.next_video
            )));
        }
        let index = self.next_video;
        let (start, duration) = self.frame_span(index);
        frame.set_video_frame(FrameKind::Rgba, &self.profile, self.source.start_time + start);
        let tag = (index as u32).to_le_bytes();
        for px in frame.data_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[tag[0], tag[1], tag[2], 255]);
        }
        self.next_video += 1;
        Ok(Some(duration))
    }

    fn decode_audio(&mut self, frame: &mut AudioFrame) -> Result<bool> {
        if self.next_sample >= self.total_samples {
            return Ok(false);
        }
        let n = (self.total_samples - self.next_sample).min(self.source.chunk_samples as u64) as usize;
        let channels = self.profile.channels.max(1) as usize;
        self.scratch.clear();
        for i in 0..n as u64 {
            let v = audio_sample(self.next_sample + i);
            self.scratch.extend(std::iter::repeat(v).take(channels));
        }
        let Some(bytes) = frame.write(0, n) else {
            return Ok(false);
        };
        from_f32(&self.scratch, self.profile.sample_format, bytes);
        let pts = self.source.start_time + self.next_sample as f64 * MICROSECOND
            / self.profile.sample_rate as f64;
        frame.write_done(pts, n, 0);
        self.next_sample += n as u64;
        Ok(true)
    }
}
