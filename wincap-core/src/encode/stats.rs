//! Counting transcode engine
//!
//! Pulls every stream until end of stream, alternating video and audio the
//! way a muxer interleaves them, and records what it received. Used for dry
//! runs and to check the timing of a capture without writing a file.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{EncodingProfile, MediaSample, SampleSource, StreamKind, TranscodeEngine};
use crate::error::{Result, WincapError};

/// What one stream delivered
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub samples: u64,
    /// Payload bytes (audio only; video surfaces stay on the device)
    pub bytes: u64,
    /// First timestamp in seconds
    pub first_timestamp: Option<f64>,
    /// Last timestamp in seconds
    pub last_timestamp: Option<f64>,
    /// Timestamps never went backwards
    pub monotonic: bool,
    #[serde(skip)]
    last: Option<Duration>,
}

impl StreamStats {
    fn new() -> Self {
        Self {
            monotonic: true,
            ..Default::default()
        }
    }

    fn record(&mut self, timestamp: Duration, bytes: usize) {
        if let Some(last) = self.last {
            if timestamp < last {
                self.monotonic = false;
            }
        }
        self.samples += 1;
        self.bytes += bytes as u64;
        self.first_timestamp.get_or_insert(timestamp.as_secs_f64());
        self.last_timestamp = Some(timestamp.as_secs_f64());
        self.last = Some(timestamp);
    }

    /// Span between first and last sample in seconds
    pub fn duration(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// Result of one transcode run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscodeStats {
    pub profile: Option<EncodingProfile>,
    /// Answer to `on_starting`, in seconds
    pub start_time: Option<f64>,
    pub video: StreamStats,
    pub audio: StreamStats,
}

impl std::fmt::Display for TranscodeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "video: {} samples over {:.2}s{}",
            self.video.samples,
            self.video.duration(),
            if self.video.monotonic { "" } else { " (timestamps went backwards)" }
        )?;
        write!(
            f,
            "audio: {} samples, {} bytes over {:.2}s{}",
            self.audio.samples,
            self.audio.bytes,
            self.audio.duration(),
            if self.audio.monotonic { "" } else { " (timestamps went backwards)" }
        )
    }
}

#[derive(Debug, Default)]
pub struct StatsEngine {
    stats: TranscodeStats,
}

impl StatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    pub fn into_stats(self) -> TranscodeStats {
        self.stats
    }
}

impl<T> TranscodeEngine<T> for StatsEngine {
    fn transcode(&mut self, profile: &EncodingProfile, source: &dyn SampleSource<T>) -> Result<()> {
        self.stats = TranscodeStats {
            profile: Some(profile.clone()),
            start_time: None,
            video: StreamStats::new(),
            audio: StreamStats::new(),
        };

        let Some(start) = source.on_starting() else {
            info!("Nothing to transcode");
            return Ok(());
        };
        self.stats.start_time = Some(start.as_secs_f64());

        let mut open: Vec<StreamKind> = source.streams().to_vec();
        while !open.is_empty() {
            open.retain(|kind| match source.on_sample_requested(kind.name()) {
                Some(sample) => {
                    let (stream, bytes) = match &sample {
                        MediaSample::Video(_) => (&mut self.stats.video, 0),
                        MediaSample::Audio(audio) => (&mut self.stats.audio, audio.len()),
                    };
                    if sample.kind() != *kind {
                        debug!("Asked for {} but got {}", kind, sample.kind());
                    }
                    stream.record(sample.timestamp(), bytes);
                    true
                }
                None => {
                    debug!("{} stream ended", kind);
                    false
                }
            });
        }

        if self.stats.video.samples == 0 && self.stats.audio.samples == 0 {
            return Err(WincapError::encoder("Source produced no samples"));
        }
        info!(
            "Transcode complete: {} video, {} audio samples",
            self.stats.video.samples, self.stats.audio.samples
        );
        Ok(())
    }
}
