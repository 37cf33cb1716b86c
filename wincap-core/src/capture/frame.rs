//! Video frame normalization
//!
//! Turns frame-arrived notifications into [`VideoSample`]s: every exported
//! frame is the blank canvas with the valid content rectangle blitted on top,
//! so nothing outside the window's real content ever reaches the encoder.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::capture::{
    BlankCanvas, CaptureClock, CapturedFrame, FrameArrivedHandler, FramePool, PreviewSurface,
    SampleQueue,
};
use crate::error::{Result, ResultExt};
use crate::gpu::{GraphicsDevice, BUFFER_COUNT};
use crate::types::{CaptureRegion, Region, Size, VideoSample};

/// State touched only from the video callback context
struct FrameState<D: GraphicsDevice> {
    canvas: BlankCanvas<D::Texture>,
    preview: PreviewSurface<D>,
    last_timestamp: Duration,
    /// Pool size still owed a `recreate`, kept until one succeeds
    pending_recreate: Option<Size>,
}

/// Producer side of the video queue
pub struct FrameSource<D: GraphicsDevice> {
    device: Arc<D>,
    state: Mutex<FrameState<D>>,
    region: Arc<CaptureRegion>,
    clock: Arc<CaptureClock>,
    queue: Arc<SampleQueue<VideoSample<D::Texture>>>,
    frames_arrived: AtomicU64,
    frames_skipped: AtomicU64,
    frames_failed: AtomicU64,
    resizes: AtomicU64,
}

impl<D: GraphicsDevice> FrameSource<D> {
    pub fn new(
        device: Arc<D>,
        canvas: BlankCanvas<D::Texture>,
        preview: PreviewSurface<D>,
        region: Arc<CaptureRegion>,
        clock: Arc<CaptureClock>,
        queue: Arc<SampleQueue<VideoSample<D::Texture>>>,
    ) -> Self {
        Self {
            device,
            state: Mutex::new(FrameState {
                canvas,
                preview,
                last_timestamp: Duration::ZERO,
                pending_recreate: None,
            }),
            region,
            clock,
            queue,
            frames_arrived: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            frames_failed: AtomicU64::new(0),
            resizes: AtomicU64::new(0),
        }
    }

    /// Notifications that carried a frame
    pub fn frames_arrived(&self) -> u64 {
        self.frames_arrived.load(Ordering::Relaxed)
    }

    /// Notifications with no retrievable frame
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    /// Frames dropped because a device operation failed
    pub fn frames_failed(&self) -> u64 {
        self.frames_failed.load(Ordering::Relaxed)
    }

    pub fn resizes(&self) -> u64 {
        self.resizes.load(Ordering::Relaxed)
    }

    pub fn preview_size(&self) -> Size {
        self.state.lock().preview.size()
    }

    pub fn presented(&self) -> u64 {
        self.state.lock().preview.presented()
    }

    /// Run `f` against the preview surface
    pub fn with_preview<R>(&self, f: impl FnOnce(&PreviewSurface<D>) -> R) -> R {
        f(&self.state.lock().preview)
    }

    fn process(
        &self,
        state: &mut FrameState<D>,
        frame: CapturedFrame<D::Texture>,
        pool: &mut dyn FramePool<D::Texture>,
    ) -> Result<()> {
        let device = &*self.device;
        let surface_size = device.texture_size(&frame.surface);
        // Metadata can briefly disagree with the surface during a resize;
        // only the frame's own surface bounds are trusted.
        let valid = Region::from_size(frame.content_size.min(surface_size));
        let current = self.region.get();

        let mut scratch = device
            .create_texture(current)
            .context("Allocating export texture")?;
        state.canvas.paint(device, &mut scratch)?;
        let blit = valid.clamp_to(current);
        if !blit.is_empty() {
            device.copy_region(&frame.surface, blit, &mut scratch)?;
        }

        let mut timestamp = self.clock.relative(frame.timestamp);
        if timestamp < state.last_timestamp {
            debug!(
                "Frame timestamp went backwards ({:?} < {:?}), clamping",
                timestamp, state.last_timestamp
            );
            timestamp = state.last_timestamp;
        }
        state.last_timestamp = timestamp;
        self.queue.enqueue(VideoSample::new(scratch, timestamp));
        trace!("Queued video sample at {:?}", timestamp);

        // Preview buffers are resized before the present; the producer pool
        // only after it, so a new-size frame never lands in stale buffers.
        // The region only moves once the preview has the new size, so a failed
        // resize is attempted again on the next frame.
        let new_size = frame.content_size;
        if new_size != current && !new_size.is_empty() {
            debug!("Captured content resized {} -> {}", current, new_size);
            state.preview.resize(new_size)?;
            self.region.set(new_size);
            state.pending_recreate = Some(new_size);
            self.resizes.fetch_add(1, Ordering::Relaxed);
        }

        let presented = state.preview.present_frame(&frame.surface, valid);
        drop(frame);

        if let Some(size) = state.pending_recreate {
            pool.recreate(BUFFER_COUNT, size)
                .context("Recreating frame pool")?;
            state.pending_recreate = None;
        }
        presented
    }
}

impl<D: GraphicsDevice> FrameArrivedHandler<D::Texture> for FrameSource<D> {
    fn on_frame_arrived(&self, pool: &mut dyn FramePool<D::Texture>) {
        let Some(frame) = pool.try_get_next_frame() else {
            self.frames_skipped.fetch_add(1, Ordering::Relaxed);
            trace!("Frame notification without a frame");
            return;
        };
        self.frames_arrived.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if let Err(e) = self.process(&mut state, frame, pool) {
            self.frames_failed.fetch_add(1, Ordering::Relaxed);
            warn!("Dropping video frame: {}", e);
        }
    }
}
