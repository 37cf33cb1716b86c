//! Pull-based encoding
//!
//! This module provides:
//! - The profile handed to a transcoding engine (MP4 container, BGRA8 video
//!   input, PCM audio input)
//! - The by-name sample request protocol engines drive ([`SampleSource`])
//! - [`Encoder`], which answers those requests from a capture session
//! - [`StatsEngine`], an engine that drains every stream and reports what it saw

mod adapter;
mod stats;

pub use adapter::{Encoder, EncoderStats};
pub use stats::{StatsEngine, StreamStats, TranscodeStats};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{CaptureConfig, VideoQuality, OUTPUT_FPS};
use crate::error::{Result, WincapError};
use crate::types::{AudioSample, Size, VideoSample};

/// Streams an engine can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Video, StreamKind::Audio];

    /// Name used in sample requests
    pub fn name(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for StreamKind {
    type Err = WincapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(WincapError::UnknownStream(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
}

/// Uncompressed pixel layout of the video samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra8,
}

/// Input description of the video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Numerator / denominator
    pub frame_rate: (u32, u32),
}

/// Input description of the audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u32,
}

/// Everything an engine needs to set up its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub container: Container,
    pub quality: VideoQuality,
    pub video: VideoDescriptor,
    pub audio: AudioDescriptor,
    pub hardware_acceleration: bool,
    /// Always transcode, even when the input already matches the output
    pub always_reencode: bool,
    /// How much media the engine may buffer ahead
    pub buffer_time: Duration,
}

impl EncodingProfile {
    /// MP4 profile for a capture of `size` with the configured audio format
    pub fn mp4(config: &CaptureConfig, size: Size) -> Self {
        Self {
            container: Container::Mp4,
            quality: config.quality,
            video: VideoDescriptor {
                pixel_format: PixelFormat::Bgra8,
                width: size.width,
                height: size.height,
                frame_rate: (OUTPUT_FPS, 1),
            },
            audio: AudioDescriptor {
                sample_rate: config.sample_rate,
                channels: config.channels,
                bits_per_sample: config.bits_per_sample,
            },
            hardware_acceleration: true,
            always_reencode: true,
            buffer_time: Duration::ZERO,
        }
    }

    /// Output resolution: the quality preset, or the input size for `Auto`
    pub fn output_size(&self) -> Size {
        self.quality
            .resolution()
            .unwrap_or(Size::new(self.video.width, self.video.height))
    }
}

impl std::fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {} ({}x{} BGRA8 @ {}/{} fps -> {}), PCM {} Hz {} ch {} bit",
            self.container,
            self.quality,
            self.video.width,
            self.video.height,
            self.video.frame_rate.0,
            self.video.frame_rate.1,
            self.output_size(),
            self.audio.sample_rate,
            self.audio.channels,
            self.audio.bits_per_sample
        )
    }
}

/// A sample answered to an engine request
#[derive(Debug)]
pub enum MediaSample<T> {
    Video(VideoSample<T>),
    Audio(AudioSample),
}

impl<T> MediaSample<T> {
    pub fn kind(&self) -> StreamKind {
        match self {
            Self::Video(_) => StreamKind::Video,
            Self::Audio(_) => StreamKind::Audio,
        }
    }

    pub fn timestamp(&self) -> Duration {
        match self {
            Self::Video(sample) => sample.timestamp(),
            Self::Audio(sample) => sample.timestamp(),
        }
    }
}

/// Blocking pull side of a capture session
pub trait SampleFeed<T>: Send + Sync {
    /// Next video sample, `None` once the session is shut down
    fn wait_for_video(&self) -> Option<VideoSample<T>>;

    /// Next audio sample, `None` once the session is shut down
    fn wait_for_audio(&self) -> Option<AudioSample>;

    /// Stop capturing. Must be idempotent.
    fn stop(&self);
}

/// What an engine calls while transcoding
pub trait SampleSource<T>: Send + Sync {
    /// Streams this source answers requests for
    fn streams(&self) -> &[StreamKind] {
        &StreamKind::ALL
    }

    /// Called once before the first request. Returns the start time of the
    /// media, or `None` if there is nothing to encode.
    fn on_starting(&self) -> Option<Duration>;

    /// Next sample of the named stream. `None` marks end of stream.
    fn on_sample_requested(&self, stream: &str) -> Option<MediaSample<T>>;
}

/// External transcoder driving a [`SampleSource`] to completion
pub trait TranscodeEngine<T> {
    fn transcode(&mut self, profile: &EncodingProfile, source: &dyn SampleSource<T>) -> Result<()>;
}
