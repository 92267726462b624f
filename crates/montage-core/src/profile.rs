//! Stream and project format descriptors.
//!
//! A [`Profile`] is a plain value. Inputs compare the profile they were
//! opened with against the current project profile and reopen on mismatch.

use crate::time::{FrameRate, Pts, MICROSECOND};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest project frame supported by the compositor.
pub const MAX_PROJECT_WIDTH: u32 = 3840;
pub const MAX_PROJECT_HEIGHT: u32 = 2160;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNELS: u16 = 2;

/// Audio sample storage format (always interleaved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Whatever the source decodes to. Treated as 32-bit float when stored.
    Native,
    S16,
    #[default]
    F32,
}

impl SampleFormat {
    /// Bytes used by one sample of one channel.
    pub fn bytes_per_channel(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::F32 | Self::Native => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioLayout {
    Native,
    #[default]
    Stereo,
    Surround51,
}

impl AudioLayout {
    /// Channel count implied by the layout, if fixed.
    pub fn channels(self) -> Option<u16> {
        match self {
            Self::Native => None,
            Self::Stereo => Some(2),
            Self::Surround51 => Some(6),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Undefined,
    Bt709,
    Bt601_625,
    Bt601_525,
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorPrimaries {
    #[default]
    Undefined,
    Bt709,
    Srgb,
    Bt601_625,
    Bt601_525,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChromaLocation {
    #[default]
    Undefined,
    Left,
    Center,
    TopLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GammaCurve {
    #[default]
    Undefined,
    Bt709,
    Bt601,
    Srgb,
}

/// Video and audio format of a stream or of the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    /// Sample aspect ratio.
    pub sar: f64,
    pub interlaced: bool,
    pub top_field_first: bool,
    pub color_space: ColorSpace,
    pub color_primaries: ColorPrimaries,
    pub chroma_location: ChromaLocation,
    pub gamma: GammaCurve,
    pub full_range: bool,
    pub video_codec: String,

    pub has_video: bool,
    pub has_audio: bool,

    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub layout: AudioLayout,
    pub layout_name: String,
    pub audio_codec: String,

    /// First timestamp of the stream, microseconds.
    pub stream_start_time: Pts,
    /// Stream duration, microseconds.
    pub stream_duration: Pts,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            frame_rate: FrameRate::FPS_25,
            width: 1920,
            height: 1080,
            sar: 1.0,
            interlaced: false,
            top_field_first: true,
            color_space: ColorSpace::Bt709,
            color_primaries: ColorPrimaries::Bt709,
            chroma_location: ChromaLocation::Left,
            gamma: GammaCurve::Bt709,
            full_range: false,
            video_codec: String::new(),
            has_video: true,
            has_audio: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            sample_format: SampleFormat::F32,
            layout: AudioLayout::Stereo,
            layout_name: "stereo".into(),
            audio_codec: String::new(),
            stream_start_time: 0.0,
            stream_duration: 0.0,
        }
    }
}

impl Profile {
    /// A project profile with the given geometry and rate.
    pub fn project(width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            width: width.min(MAX_PROJECT_WIDTH),
            height: height.min(MAX_PROJECT_HEIGHT),
            frame_rate,
            ..Self::default()
        }
    }

    /// Duration of one video frame in microseconds.
    #[inline]
    pub fn frame_duration(&self) -> Pts {
        self.frame_rate.frame_duration_us()
    }

    #[inline]
    pub fn bytes_per_channel(&self) -> usize {
        self.sample_format.bytes_per_channel()
    }

    /// Bytes of one interleaved sample across all channels.
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_channel() * self.channels.max(1) as usize
    }

    /// Duration of `samples` audio samples in microseconds.
    #[inline]
    pub fn samples_duration(&self, samples: usize) -> Pts {
        if self.sample_rate == 0 {
            return 0.0;
        }
        samples as f64 * MICROSECOND / self.sample_rate as f64
    }

    /// Number of whole samples spanned by `duration` microseconds.
    #[inline]
    pub fn samples_in(&self, duration: Pts) -> usize {
        (duration * self.sample_rate as f64 / MICROSECOND).round().max(0.0) as usize
    }

    /// End of the stream, microseconds.
    #[inline]
    pub fn stream_end(&self) -> Pts {
        self.stream_start_time + self.stream_duration
    }

    /// Whether the video format matches `other` closely enough that frames
    /// need no conversion (same geometry and rate).
    pub fn same_video_format(&self, other: &Profile) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.frame_rate == other.frame_rate
    }

    /// Whether the audio format matches `other` for direct copying.
    pub fn same_audio_format(&self, other: &Profile) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.sample_format == other.sample_format
    }

    pub fn color_space_name(&self) -> &'static str {
        match self.color_space {
            ColorSpace::Undefined => "Undefined",
            ColorSpace::Bt709 => "BT.709",
            ColorSpace::Bt601_625 => "BT.601 625 (PAL)",
            ColorSpace::Bt601_525 => "BT.601 525 (NTSC)",
            ColorSpace::Srgb => "sRGB",
        }
    }

    pub fn color_primaries_name(&self) -> &'static str {
        match self.color_primaries {
            ColorPrimaries::Undefined => "Undefined",
            ColorPrimaries::Bt709 => "BT.709",
            ColorPrimaries::Srgb => "sRGB",
            ColorPrimaries::Bt601_625 => "BT.601 625 (PAL)",
            ColorPrimaries::Bt601_525 => "BT.601 525 (NTSC)",
        }
    }

    pub fn gamma_curve_name(&self) -> &'static str {
        match self.gamma {
            GammaCurve::Undefined => "Undefined",
            GammaCurve::Bt709 => "BT.709",
            GammaCurve::Bt601 => "BT.601",
            GammaCurve::Srgb => "sRGB",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_video {
            write!(f, "{}x{} @ {}", self.width, self.height, self.frame_rate)?;
        }
        if self.has_audio {
            if self.has_video {
                write!(f, ", ")?;
            }
            write!(f, "{} Hz {}ch {:?}", self.sample_rate, self.channels, self.sample_format)?;
        }
        Ok(())
    }
}
