//! Synthetic capture backends
//!
//! A test-pattern window and a sine-tone loopback device, each running on its
//! own producer thread just like the OS callbacks they stand in for. Used by
//! `wincap simulate` and the integration tests.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::capture::{
    AudioCapture, AudioChunk, AudioDataHandler, CapturedFrame, FrameArrivedHandler, FramePool,
    VideoCapture,
};
use crate::error::{Result, WincapError};
use crate::gpu::SoftwareTexture;
use crate::types::{Pixel, SampleEncoding, Size, WaveFormat};

/// Filler for surface pixels outside the window content
const STALE_PIXEL: Pixel = Pixel::bgra(255, 0, 255, 255);

/// Sleep until `start + interval * ticks`
fn pace(start: Instant, interval: Duration, ticks: u32) {
    let next = start + interval * ticks;
    let now = Instant::now();
    if next > now {
        std::thread::sleep(next - now);
    }
}

/// Frame pool whose buffers keep their size until recreated, like a real
/// compositor pool while the window is being resized.
#[derive(Debug)]
pub struct SyntheticFramePool {
    surface_size: Size,
    pending: Option<CapturedFrame<SoftwareTexture>>,
    recreated: u32,
}

impl SyntheticFramePool {
    pub fn new(surface_size: Size) -> Self {
        Self {
            surface_size,
            pending: None,
            recreated: 0,
        }
    }

    pub fn surface_size(&self) -> Size {
        self.surface_size
    }

    pub fn recreated(&self) -> u32 {
        self.recreated
    }

    /// Render frame `index` of a window whose content is `content` pixels
    pub fn produce(&mut self, content: Size, index: u32) {
        let mut surface = SoftwareTexture::filled(self.surface_size, STALE_PIXEL);
        let visible = content.min(self.surface_size);
        let shade = (index % 64) as u8 * 2;
        let bar_x = if visible.width > 0 { (index * 4) % visible.width } else { 0 };
        for y in 0..visible.height {
            for x in 0..visible.width {
                let pixel = if x >= bar_x && x < bar_x + 8 {
                    Pixel::bgra(255, 255, 255, 255)
                } else {
                    Pixel::bgra(shade, (y % 256) as u8, (x % 256) as u8, 255)
                };
                surface.set_pixel(x, y, pixel);
            }
        }
        self.pending = Some(CapturedFrame {
            surface,
            content_size: content,
            timestamp: Instant::now(),
        });
    }
}

impl FramePool<SoftwareTexture> for SyntheticFramePool {
    fn try_get_next_frame(&mut self) -> Option<CapturedFrame<SoftwareTexture>> {
        self.pending.take()
    }

    fn recreate(&mut self, _buffer_count: u32, size: Size) -> Result<()> {
        if size.is_empty() {
            return Err(WincapError::capture(format!("Cannot recreate pool at {}", size)));
        }
        debug!("Synthetic frame pool recreated at {}", size);
        self.surface_size = size;
        self.recreated += 1;
        Ok(())
    }
}

/// Test-pattern window
pub struct SyntheticWindow {
    size: Size,
    fps: u32,
    resize: Option<(Duration, Size)>,
    handler: Option<Arc<dyn FrameArrivedHandler<SoftwareTexture>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticWindow {
    pub fn new(size: Size, fps: u32) -> Self {
        Self {
            size,
            fps: fps.max(1),
            resize: None,
            handler: None,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Resize the window content to `size` once `after` has elapsed
    pub fn with_resize(mut self, after: Duration, size: Size) -> Self {
        self.resize = Some((after, size));
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl VideoCapture<SoftwareTexture> for SyntheticWindow {
    fn item_size(&self) -> Size {
        self.size
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameArrivedHandler<SoftwareTexture>>) {
        self.handler = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let handler = self
            .handler
            .clone()
            .ok_or_else(|| WincapError::capture("No frame handler registered"))?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let size = self.size;
        let resize = self.resize;
        let interval = Duration::from_secs_f64(1.0 / self.fps as f64);

        let thread = std::thread::Builder::new()
            .name("wincap-video".to_string())
            .spawn(move || {
                let mut pool = SyntheticFramePool::new(size);
                let mut content = size;
                let start = Instant::now();
                let mut index = 0u32;
                while running.load(Ordering::SeqCst) {
                    if let Some((after, new_size)) = resize {
                        if content != new_size && start.elapsed() >= after {
                            info!("Synthetic window resized {} -> {}", content, new_size);
                            content = new_size;
                        }
                    }
                    pool.produce(content, index);
                    handler.on_frame_arrived(&mut pool);
                    index = index.wrapping_add(1);
                    pace(start, interval, index);
                }
                debug!("Synthetic window thread exiting after {} frames", index);
            })
            .map_err(|e| WincapError::capture(format!("Failed to spawn video thread: {}", e)))?;

        self.thread = Some(thread);
        info!("Synthetic window capture started ({} @ {} fps)", self.size, self.fps);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Synthetic video thread panicked");
            }
            info!("Synthetic window capture stopped");
        }
    }
}

impl Drop for SyntheticWindow {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sine-tone loopback device producing 10 ms float chunks
pub struct SyntheticLoopback {
    format: WaveFormat,
    frequency: f32,
    handler: Option<Arc<dyn AudioDataHandler>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticLoopback {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            format: WaveFormat::new(sample_rate, channels, SampleEncoding::Float32),
            frequency: 440.0,
            handler: None,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl AudioCapture for SyntheticLoopback {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn set_data_handler(&mut self, handler: Arc<dyn AudioDataHandler>) {
        self.handler = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let handler = self
            .handler
            .clone()
            .ok_or_else(|| WincapError::capture("No audio handler registered"))?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let format = self.format;
        let frequency = self.frequency;

        let thread = std::thread::Builder::new()
            .name("wincap-audio".to_string())
            .spawn(move || {
                let frames = (format.sample_rate / 100).max(1) as usize;
                let channels = format.channels as usize;
                let step = TAU * frequency / format.sample_rate as f32;
                let mut phase = 0.0f32;
                let mut data = Vec::with_capacity(frames * format.block_align());
                let start = Instant::now();
                let mut ticks = 0u32;

                while running.load(Ordering::SeqCst) {
                    data.clear();
                    for _ in 0..frames {
                        let value = phase.sin() * 0.2;
                        for _ in 0..channels {
                            data.extend_from_slice(&value.to_le_bytes());
                        }
                        phase = (phase + step) % TAU;
                    }
                    handler.on_data_available(&AudioChunk {
                        data: &data,
                        format,
                    });
                    ticks = ticks.wrapping_add(1);
                    pace(start, Duration::from_millis(10), ticks);
                }
                debug!("Synthetic loopback thread exiting after {} chunks", ticks);
            })
            .map_err(|e| WincapError::capture(format!("Failed to spawn audio thread: {}", e)))?;

        self.thread = Some(thread);
        info!(
            "Synthetic loopback started ({} Hz, {} ch, {} Hz tone)",
            format.sample_rate, format.channels, frequency
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Synthetic audio thread panicked");
            }
            info!("Synthetic loopback stopped");
        }
    }
}

impl Drop for SyntheticLoopback {
    fn drop(&mut self) {
        self.stop();
    }
}
