//! Mock infrastructure for testing
//!
//! A graphics device that records swap-chain and frame-pool calls into a
//! shared log, plus window and loopback backends that tests drive by hand
//! from any thread.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use wincap_core::capture::{
    AudioCapture, AudioChunk, AudioDataHandler, CapturedFrame, FrameArrivedHandler, FramePool,
    VideoCapture,
};
use wincap_core::gpu::{
    GraphicsDevice, SoftwareDevice, SoftwareSwapChain, SoftwareTexture, SwapChain,
};
use wincap_core::types::{Color, Pixel, Region, Size, WaveFormat};
use wincap_core::{Result, WincapError};

pub const WHITE: Pixel = Pixel::bgra(255, 255, 255, 255);

/// Calls the tests care about the order of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    ResizeBuffers(Size),
    Present,
    Recreate(Size),
}

/// Shared, ordered call log
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    /// Index of the first occurrence of `call`
    pub fn position(&self, call: Call) -> Option<usize> {
        self.0.lock().iter().position(|c| *c == call)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Software device whose swap chains log into a [`CallLog`]
pub struct RecordingDevice {
    inner: SoftwareDevice,
    log: CallLog,
    failing_resizes: Arc<AtomicU32>,
}

impl RecordingDevice {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: SoftwareDevice::new(),
            log,
            failing_resizes: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make the next `count` swap-chain resizes fail, like a lost device
    pub fn failing_resizes(self, count: u32) -> Self {
        self.failing_resizes.store(count, Ordering::SeqCst);
        self
    }
}

impl GraphicsDevice for RecordingDevice {
    type Texture = SoftwareTexture;
    type SwapChain = RecordingSwapChain;

    fn create_texture(&self, size: Size) -> Result<SoftwareTexture> {
        self.inner.create_texture(size)
    }

    fn texture_size(&self, texture: &SoftwareTexture) -> Size {
        self.inner.texture_size(texture)
    }

    fn clear(&self, target: &mut SoftwareTexture, color: Color) -> Result<()> {
        self.inner.clear(target, color)
    }

    fn copy_resource(&self, src: &SoftwareTexture, dst: &mut SoftwareTexture) -> Result<()> {
        self.inner.copy_resource(src, dst)
    }

    fn copy_region(
        &self,
        src: &SoftwareTexture,
        region: Region,
        dst: &mut SoftwareTexture,
    ) -> Result<()> {
        self.inner.copy_region(src, region, dst)
    }

    fn create_swap_chain(&self, size: Size, buffer_count: u32) -> Result<RecordingSwapChain> {
        Ok(RecordingSwapChain {
            inner: self.inner.create_swap_chain(size, buffer_count)?,
            log: self.log.clone(),
            failing_resizes: self.failing_resizes.clone(),
        })
    }
}

pub struct RecordingSwapChain {
    inner: SoftwareSwapChain,
    log: CallLog,
    failing_resizes: Arc<AtomicU32>,
}

impl RecordingSwapChain {
    pub fn front_buffer(&self) -> Option<&SoftwareTexture> {
        self.inner.front_buffer()
    }
}

impl SwapChain for RecordingSwapChain {
    type Texture = SoftwareTexture;

    fn size(&self) -> Size {
        self.inner.size()
    }

    fn buffer_count(&self) -> u32 {
        self.inner.buffer_count()
    }

    fn resize_buffers(&mut self, buffer_count: u32, size: Size) -> Result<()> {
        if take_failure(&self.failing_resizes) {
            return Err(WincapError::device("swap chain resize failed"));
        }
        self.log.push(Call::ResizeBuffers(size));
        self.inner.resize_buffers(buffer_count, size)
    }

    fn back_buffer(&mut self) -> &mut SoftwareTexture {
        self.inner.back_buffer()
    }

    fn present(&mut self) -> Result<()> {
        self.log.push(Call::Present);
        self.inner.present()
    }
}

/// Frame pool holding at most one frame at its current buffer size
pub struct ManualPool {
    surface_size: Size,
    pending: Option<CapturedFrame<SoftwareTexture>>,
    log: CallLog,
    failing_recreates: u32,
}

impl ManualPool {
    fn push(&mut self, content: Size, pixel: Pixel) {
        self.pending = Some(CapturedFrame {
            surface: SoftwareTexture::filled(self.surface_size, pixel),
            content_size: content,
            timestamp: Instant::now(),
        });
    }
}

impl FramePool<SoftwareTexture> for ManualPool {
    fn try_get_next_frame(&mut self) -> Option<CapturedFrame<SoftwareTexture>> {
        self.pending.take()
    }

    fn recreate(&mut self, _buffer_count: u32, size: Size) -> Result<()> {
        if self.failing_recreates > 0 {
            self.failing_recreates -= 1;
            return Err(WincapError::capture("frame pool recreate failed"));
        }
        self.log.push(Call::Recreate(size));
        self.surface_size = size;
        Ok(())
    }
}

struct WindowShared {
    handler: Mutex<Option<Arc<dyn FrameArrivedHandler<SoftwareTexture>>>>,
    pool: Mutex<ManualPool>,
    running: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
}

/// Window backend that only produces frames when its driver says so
pub struct ManualWindow {
    size: Size,
    shared: Arc<WindowShared>,
}

/// Test-side handle of a [`ManualWindow`]
#[derive(Clone)]
pub struct WindowDriver {
    shared: Arc<WindowShared>,
}

impl ManualWindow {
    pub fn new(size: Size, log: CallLog) -> (Self, WindowDriver) {
        let shared = Arc::new(WindowShared {
            handler: Mutex::new(None),
            pool: Mutex::new(ManualPool {
                surface_size: size,
                pending: None,
                log,
                failing_recreates: 0,
            }),
            running: AtomicBool::new(false),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        });
        let driver = WindowDriver {
            shared: shared.clone(),
        };
        (Self { size, shared }, driver)
    }
}

impl VideoCapture<SoftwareTexture> for ManualWindow {
    fn item_size(&self) -> Size {
        self.size
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameArrivedHandler<SoftwareTexture>>) {
        *self.shared.handler.lock() = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl WindowDriver {
    /// Deliver a frame whose window content is `content`, painted `pixel`.
    /// Returns false if capture is not running.
    pub fn deliver(&self, content: Size, pixel: Pixel) -> bool {
        self.notify(Some((content, pixel)))
    }

    /// Frame-arrived notification with no frame behind it
    pub fn notify_without_frame(&self) -> bool {
        self.notify(None)
    }

    fn notify(&self, frame: Option<(Size, Pixel)>) -> bool {
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let Some(handler) = self.shared.handler.lock().clone() else {
            return false;
        };
        let mut pool = self.shared.pool.lock();
        if let Some((content, pixel)) = frame {
            pool.push(content, pixel);
        }
        handler.on_frame_arrived(&mut *pool);
        true
    }

    /// Make the next `count` pool recreations fail
    pub fn fail_recreates(&self, count: u32) {
        self.shared.pool.lock().failing_recreates = count;
    }

    /// Current buffer size of the frame pool
    pub fn surface_size(&self) -> Size {
        self.shared.pool.lock().surface_size
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> u32 {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.shared.stops.load(Ordering::SeqCst)
    }
}

struct LoopbackShared {
    handler: Mutex<Option<Arc<dyn AudioDataHandler>>>,
    running: AtomicBool,
    stops: AtomicU32,
}

/// Loopback backend that only produces chunks when its driver says so
pub struct ManualLoopback {
    format: WaveFormat,
    fail_start: bool,
    shared: Arc<LoopbackShared>,
}

#[derive(Clone)]
pub struct LoopbackDriver {
    format: WaveFormat,
    shared: Arc<LoopbackShared>,
}

impl ManualLoopback {
    pub fn new(format: WaveFormat) -> (Self, LoopbackDriver) {
        let shared = Arc::new(LoopbackShared {
            handler: Mutex::new(None),
            running: AtomicBool::new(false),
            stops: AtomicU32::new(0),
        });
        let driver = LoopbackDriver {
            format,
            shared: shared.clone(),
        };
        (
            Self {
                format,
                fail_start: false,
                shared,
            },
            driver,
        )
    }

    /// Make `start` fail, like a device that disappeared
    pub fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl AudioCapture for ManualLoopback {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn set_data_handler(&mut self, handler: Arc<dyn AudioDataHandler>) {
        *self.shared.handler.lock() = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(WincapError::capture("loopback device lost"));
        }
        self.shared.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl LoopbackDriver {
    /// Deliver raw bytes in the loopback format. Returns false if not running.
    pub fn deliver(&self, data: &[u8]) -> bool {
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let Some(handler) = self.shared.handler.lock().clone() else {
            return false;
        };
        handler.on_data_available(&AudioChunk {
            data,
            format: self.format,
        });
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.shared.stops.load(Ordering::SeqCst)
    }
}

/// Consume one scheduled failure, if any are left
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Interleaved f32 samples as little-endian bytes
pub fn f32_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Interleaved i16 samples as little-endian bytes
pub fn i16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
