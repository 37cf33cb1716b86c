//! Bridge from the blocking pull API to an engine's sample requests
//!
//! The engine runs on its own thread and asks for samples by stream name.
//! Every request blocks on the session queues until a sample or the shutdown
//! sentinel arrives. Failures while answering are logged, the session is
//! stopped and the engine sees end of stream; nothing is thrown back into it.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use super::{EncodingProfile, MediaSample, SampleFeed, SampleSource, StreamKind, TranscodeEngine};
use crate::config::OUTPUT_FPS;
use crate::error::{Result, WincapError};
use crate::types::VideoSample;

/// Encoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncoderStats {
    pub recording: bool,
    pub closed: bool,
    pub video_samples: u64,
    pub audio_samples: u64,
    pub request_errors: u64,
}

pub struct Encoder<T> {
    feed: Arc<dyn SampleFeed<T>>,
    profile: EncodingProfile,
    /// First video sample, taken to answer `on_starting` and handed out by
    /// the next video request
    pending_video: Mutex<Option<VideoSample<T>>>,
    recording: AtomicBool,
    closed: AtomicBool,
    video_samples: AtomicU64,
    audio_samples: AtomicU64,
    request_errors: AtomicU64,
}

impl<T: Send + 'static> Encoder<T> {
    pub fn new(feed: Arc<dyn SampleFeed<T>>, profile: EncodingProfile) -> Self {
        Self {
            feed,
            profile,
            pending_video: Mutex::new(None),
            recording: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            video_samples: AtomicU64::new(0),
            audio_samples: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
        }
    }

    pub fn profile(&self) -> &EncodingProfile {
        &self.profile
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run `engine` over this encoder's samples. Blocks until the engine
    /// returns, which is normally after the session has been stopped.
    ///
    /// Only one encode is allowed per encoder.
    pub fn encode<E>(&self, engine: &mut E) -> Result<()>
    where
        E: TranscodeEngine<T> + ?Sized,
    {
        if self.is_closed() {
            return Err(WincapError::encoder("Encoder has been closed"));
        }
        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(WincapError::EncoderBusy);
        }

        let mut profile = self.profile.clone();
        profile.video.frame_rate = (OUTPUT_FPS, 1);
        info!("Encoding started: {}", profile);

        match engine.transcode(&profile, self) {
            Ok(()) => {
                let stats = self.stats();
                info!(
                    "Encoding finished: {} video, {} audio samples, {} request errors",
                    stats.video_samples, stats.audio_samples, stats.request_errors
                );
                Ok(())
            }
            Err(e) => {
                error!("Transcode failed: {}", e);
                self.feed.stop();
                Err(e)
            }
        }
    }

    /// Mark the encoder closed. Stops the session if no encode ever ran.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.is_recording() {
            debug!("Encoder closed before recording, stopping capture");
            self.feed.stop();
        }
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            recording: self.is_recording(),
            closed: self.is_closed(),
            video_samples: self.video_samples.load(Ordering::Relaxed),
            audio_samples: self.audio_samples.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
        }
    }

    fn is_active(&self) -> bool {
        self.is_recording() && !self.is_closed()
    }

    /// Run `f`, turning a panic in the feed into an encoder error so it
    /// never unwinds into the engine
    fn guarded<R>(&self, what: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
            Err(WincapError::encoder(format!(
                "{} panicked: {}",
                what,
                panic_message(payload.as_ref())
            )))
        })
    }

    fn next_sample(&self, stream: &str) -> Result<Option<MediaSample<T>>> {
        let sample = match stream.parse::<StreamKind>()? {
            StreamKind::Video => {
                let stashed = self.pending_video.lock().take();
                stashed
                    .or_else(|| self.feed.wait_for_video())
                    .map(MediaSample::Video)
            }
            StreamKind::Audio => self.feed.wait_for_audio().map(MediaSample::Audio),
        };
        Ok(sample)
    }
}

impl<T: Send + 'static> SampleSource<T> for Encoder<T> {
    fn on_starting(&self) -> Option<Duration> {
        if !self.is_active() {
            self.feed.stop();
            return None;
        }

        let mut pending = self.pending_video.lock();
        if pending.is_none() {
            match self.guarded("Waiting for the first frame", || Ok(self.feed.wait_for_video())) {
                Ok(sample) => *pending = sample,
                Err(e) => {
                    self.request_errors.fetch_add(1, Ordering::Relaxed);
                    error!("{}", e);
                    self.feed.stop();
                    return None;
                }
            }
        }
        match pending.as_ref() {
            Some(sample) => {
                debug!("First video sample at {:?}", sample.timestamp());
                Some(sample.timestamp())
            }
            None => {
                debug!("Capture shut down before the first frame");
                self.feed.stop();
                None
            }
        }
    }

    fn on_sample_requested(&self, stream: &str) -> Option<MediaSample<T>> {
        if !self.is_active() {
            trace!("Request for {} after close", stream);
            self.feed.stop();
            return None;
        }

        match self.guarded("Sample request", || self.next_sample(stream)) {
            Ok(Some(sample)) => {
                let counter = match sample.kind() {
                    StreamKind::Video => &self.video_samples,
                    StreamKind::Audio => &self.audio_samples,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                trace!("Answered {} sample at {:?}", stream, sample.timestamp());
                Some(sample)
            }
            Ok(None) => {
                debug!("{} stream reached end", stream);
                self.feed.stop();
                None
            }
            Err(e) => {
                self.request_errors.fetch_add(1, Ordering::Relaxed);
                error!("Sample request failed: {}", e);
                self.feed.stop();
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<T> Drop for Encoder<T> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) && !self.recording.load(Ordering::SeqCst) {
            self.feed.stop();
        }
    }
}
