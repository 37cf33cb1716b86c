//! Capture session
//!
//! Owns everything between the capture backends and the encoder: the blank
//! canvas, preview, frame and audio sources, the two sample queues and the
//! capture clock. Exposes start/stop and the blocking pull API.
//!
//! ```text
//! Idle ──start()──▶ Capturing ──stop()──▶ Stopped
//!   └──────────────stop()───────────────────▲
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::capture::{
    AudioCapture, AudioSource, BlankCanvas, CaptureClock, FrameSource, PreviewSurface,
    SampleQueue, VideoCapture,
};
use crate::config::CaptureConfig;
use crate::encode::SampleFeed;
use crate::error::{Result, ResultExt, WincapError};
use crate::gpu::GraphicsDevice;
use crate::types::{AudioSample, CaptureRegion, Handle, Size, VideoSample};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Built, producers not started
    Idle,
    /// Producers running
    Capturing,
    /// Shut down; terminal
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Session statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub handle: u64,
    pub state: SessionState,
    pub initial_size: Size,
    pub region_size: Size,
    pub preview_size: Size,
    pub video_enqueued: u64,
    pub video_dequeued: u64,
    pub audio_enqueued: u64,
    pub audio_dequeued: u64,
    pub frames_skipped: u64,
    pub frames_failed: u64,
    pub resizes: u64,
    pub frames_presented: u64,
    pub audio_failures: u64,
    pub elapsed_seconds: f64,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session {}: {} - {} (started at {}), {} video / {} audio samples, {} presented, {} resizes, {} skipped, {} failed in {:.1}s",
            self.handle,
            self.state,
            self.region_size,
            self.initial_size,
            self.video_enqueued,
            self.audio_enqueued,
            self.frames_presented,
            self.resizes,
            self.frames_skipped,
            self.frames_failed + self.audio_failures,
            self.elapsed_seconds
        )
    }
}

/// One window plus system loopback, captured on a shared clock
pub struct CaptureSession<D, V, A>
where
    D: GraphicsDevice,
    V: VideoCapture<D::Texture>,
    A: AudioCapture,
{
    handle: Handle,
    config: CaptureConfig,
    initial_size: Size,
    state: Mutex<SessionState>,
    started_at: Mutex<Option<Instant>>,
    video: Mutex<V>,
    audio: Mutex<A>,
    frame_source: Arc<FrameSource<D>>,
    audio_source: Arc<AudioSource>,
    video_queue: Arc<SampleQueue<VideoSample<D::Texture>>>,
    audio_queue: Arc<SampleQueue<AudioSample>>,
    region: Arc<CaptureRegion>,
    clock: Arc<CaptureClock>,
    // Declared last so the sources, preview and canvas go first
    device: Arc<D>,
}

impl<D, V, A> CaptureSession<D, V, A>
where
    D: GraphicsDevice,
    V: VideoCapture<D::Texture>,
    A: AudioCapture,
{
    /// Build a session for `video`'s capture item.
    ///
    /// Fails if the configuration is invalid (bit depth, rate, channels) or
    /// the item reports an empty size. Handlers are registered here, once.
    pub fn new(device: Arc<D>, mut video: V, mut audio: A, config: CaptureConfig) -> Result<Self> {
        config.validate()?;

        let initial_size = video.item_size();
        if initial_size.is_empty() {
            return Err(WincapError::config(format!(
                "Capture item has an empty size ({})",
                initial_size
            )));
        }

        let canvas = BlankCanvas::new(&*device, initial_size, config.blank_color)
            .context("Creating blank canvas")?;
        let preview = PreviewSurface::new(device.clone(), initial_size, config.blank_color)?;
        let region = Arc::new(CaptureRegion::new(initial_size));
        let clock = Arc::new(CaptureClock::new());
        let video_queue = Arc::new(SampleQueue::new("video"));
        let audio_queue = Arc::new(SampleQueue::new("audio"));

        let frame_source = Arc::new(FrameSource::new(
            device.clone(),
            canvas,
            preview,
            region.clone(),
            clock.clone(),
            video_queue.clone(),
        ));
        let audio_source = Arc::new(
            AudioSource::new(&config, clock.clone(), audio_queue.clone())
                .context("Creating audio source")?,
        );

        video.set_frame_handler(frame_source.clone());
        audio.set_data_handler(audio_source.clone());

        let handle = Handle::new();
        let pcm = audio_source.output_format();
        info!(
            "Session {} created: {} window, loopback {:?} -> {} Hz {} ch {} bit",
            handle,
            initial_size,
            audio.wave_format(),
            pcm.sample_rate,
            pcm.channels,
            pcm.bit_depth.bits()
        );

        Ok(Self {
            handle,
            config,
            initial_size,
            state: Mutex::new(SessionState::Idle),
            started_at: Mutex::new(None),
            video: Mutex::new(video),
            audio: Mutex::new(audio),
            frame_source,
            audio_source,
            video_queue,
            audio_queue,
            region,
            clock,
            device,
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Size of the window when the session was created
    pub fn initial_size(&self) -> Size {
        self.initial_size
    }

    /// Size of the content currently being captured
    pub fn region_size(&self) -> Size {
        self.region.get()
    }

    pub fn preview_size(&self) -> Size {
        self.frame_source.preview_size()
    }

    /// Start the window producer, then the loopback producer.
    ///
    /// Only valid once, from [`SessionState::Idle`]. If a producer fails to
    /// start the session is stopped and the error returned.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Idle => {}
            SessionState::Capturing => return Err(WincapError::SessionAlreadyRunning),
            SessionState::Stopped => return Err(WincapError::SessionStopped),
        }

        self.clock.reset();
        *self.started_at.lock() = Some(Instant::now());

        let video = self.video.lock().start().context("Starting window capture");
        let started = video.and_then(|()| {
            self.audio
                .lock()
                .start()
                .context("Starting loopback capture")
        });

        match started {
            Ok(()) => {
                *state = SessionState::Capturing;
                info!("Session {} capturing", self.handle);
                Ok(())
            }
            Err(e) => {
                error!("Session {} failed to start: {}", self.handle, e);
                self.shutdown(&mut state);
                Err(e)
            }
        }
    }

    /// Stop capturing. Safe from any thread, any number of times.
    ///
    /// Wakes every blocked consumer; samples already queued stay drainable.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        self.shutdown(&mut state);
    }

    fn shutdown(&self, state: &mut SessionState) {
        self.video_queue.signal_closed();
        self.audio_queue.signal_closed();
        if *state == SessionState::Stopped {
            return;
        }

        let was = *state;
        *state = SessionState::Stopped;
        self.video.lock().stop();
        self.audio.lock().stop();

        if was == SessionState::Capturing {
            info!("{}", self.stats_with_state(SessionState::Stopped));
        } else {
            debug!("Session {} stopped before capturing", self.handle);
        }
    }

    /// Next video sample, blocking until one arrives or the session stops.
    /// `None` means shutdown; the session is stopped if it was not already.
    pub fn wait_for_video(&self) -> Option<VideoSample<D::Texture>> {
        let sample = self.video_queue.wait_next();
        if sample.is_none() {
            debug!("Video queue drained after close");
            self.stop();
        }
        sample
    }

    /// Next audio sample, blocking until one arrives or the session stops.
    /// `None` means shutdown; the session is stopped if it was not already.
    pub fn wait_for_audio(&self) -> Option<AudioSample> {
        let sample = self.audio_queue.wait_next();
        if sample.is_none() {
            debug!("Audio queue drained after close");
            self.stop();
        }
        sample
    }

    pub fn stats(&self) -> SessionStats {
        self.stats_with_state(self.state())
    }

    fn stats_with_state(&self, state: SessionState) -> SessionStats {
        let elapsed = self
            .started_at
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        SessionStats {
            handle: self.handle.as_u64(),
            state,
            initial_size: self.initial_size,
            region_size: self.region.get(),
            preview_size: self.frame_source.preview_size(),
            video_enqueued: self.video_queue.enqueued(),
            video_dequeued: self.video_queue.dequeued(),
            audio_enqueued: self.audio_queue.enqueued(),
            audio_dequeued: self.audio_queue.dequeued(),
            frames_skipped: self.frame_source.frames_skipped(),
            frames_failed: self.frame_source.frames_failed(),
            resizes: self.frame_source.resizes(),
            frames_presented: self.frame_source.presented(),
            audio_failures: self.audio_source.failures(),
            elapsed_seconds: elapsed,
        }
    }
}

impl<D, V, A> SampleFeed<D::Texture> for CaptureSession<D, V, A>
where
    D: GraphicsDevice,
    V: VideoCapture<D::Texture>,
    A: AudioCapture,
{
    fn wait_for_video(&self) -> Option<VideoSample<D::Texture>> {
        CaptureSession::wait_for_video(self)
    }

    fn wait_for_audio(&self) -> Option<AudioSample> {
        CaptureSession::wait_for_audio(self)
    }

    fn stop(&self) {
        CaptureSession::stop(self)
    }
}

impl<D, V, A> Drop for CaptureSession<D, V, A>
where
    D: GraphicsDevice,
    V: VideoCapture<D::Texture>,
    A: AudioCapture,
{
    fn drop(&mut self) {
        self.stop();
        let video = self.video_queue.clear();
        let audio = self.audio_queue.clear();
        if video + audio > 0 {
            debug!(
                "Session {} discarded {} video and {} audio samples",
                self.handle, video, audio
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{AudioDataHandler, FrameArrivedHandler};
    use crate::gpu::{SoftwareDevice, SoftwareTexture};
    use crate::types::WaveFormat;

    struct IdleWindow {
        size: Size,
        fail_start: bool,
        stops: u32,
    }

    impl VideoCapture<SoftwareTexture> for IdleWindow {
        fn item_size(&self) -> Size {
            self.size
        }

        fn set_frame_handler(&mut self, _handler: Arc<dyn FrameArrivedHandler<SoftwareTexture>>) {}

        fn start(&mut self) -> Result<()> {
            if self.fail_start {
                Err(WincapError::capture("window closed"))
            } else {
                Ok(())
            }
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    struct IdleLoopback;

    impl AudioCapture for IdleLoopback {
        fn wave_format(&self) -> WaveFormat {
            WaveFormat::default()
        }

        fn set_data_handler(&mut self, _handler: Arc<dyn AudioDataHandler>) {}

        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}
    }

    fn session(size: Size, fail_start: bool) -> Result<CaptureSession<SoftwareDevice, IdleWindow, IdleLoopback>> {
        CaptureSession::new(
            Arc::new(SoftwareDevice::new()),
            IdleWindow {
                size,
                fail_start,
                stops: 0,
            },
            IdleLoopback,
            CaptureConfig::default(),
        )
    }

    #[test]
    fn test_state_machine() {
        let session = session(Size::new(64, 48), false).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Capturing);
        assert!(matches!(session.start(), Err(WincapError::SessionAlreadyRunning)));

        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.video.lock().stops, 1);
        assert!(matches!(session.start(), Err(WincapError::SessionStopped)));
    }

    #[test]
    fn test_empty_item_is_config_error() {
        assert!(matches!(
            session(Size::new(0, 600), false),
            Err(WincapError::Config(_))
        ));
    }

    #[test]
    fn test_failed_start_stops_session() {
        let session = session(Size::new(64, 48), true).unwrap();
        let err = session.start().unwrap_err();

        assert!(matches!(err.root(), WincapError::Capture(_)));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.wait_for_video().is_none());
    }

    #[test]
    fn test_wait_after_stop_returns_sentinel() {
        let session = session(Size::new(16, 16), false).unwrap();
        session.start().unwrap();
        session.stop();
        assert!(session.wait_for_audio().is_none());
        assert!(session.wait_for_video().is_none());
    }

    #[test]
    fn test_stats_snapshot() {
        let session = session(Size::new(32, 24), false).unwrap();
        let stats = session.stats();
        assert_eq!(stats.state, SessionState::Idle);
        assert_eq!(stats.initial_size, Size::new(32, 24));
        assert_eq!(stats.preview_size, Size::new(32, 24));
        assert_eq!(stats.video_enqueued, 0);
    }
}
