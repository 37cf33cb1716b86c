//! Window and loopback capture
//!
//! This module handles:
//! - The capability traits a platform backend implements (window frames,
//!   loopback audio)
//! - Normalizing frames onto the blank canvas and mirroring them to the preview
//! - Converting loopback PCM to the recording format
//! - The synchronized queues between producers and the encoder

pub mod audio;
pub mod canvas;
pub mod clock;
pub mod frame;
pub mod preview;
pub mod queue;
pub mod resample;
pub mod synthetic;

pub use audio::AudioSource;
pub use canvas::BlankCanvas;
pub use clock::CaptureClock;
pub use frame::FrameSource;
pub use preview::PreviewSurface;
pub use queue::SampleQueue;
pub use synthetic::{SyntheticLoopback, SyntheticWindow};

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::types::{Size, WaveFormat};

/// A frame handed out by the frame pool
#[derive(Debug)]
pub struct CapturedFrame<T> {
    /// Backing surface; its size is the pool's buffer size
    pub surface: T,
    /// Size of the valid content the window reports, which may disagree
    /// with the surface while a resize is in flight
    pub content_size: Size,
    /// When the compositor produced the frame
    pub timestamp: Instant,
}

/// Bounded pool of capture buffers owned by the window capture backend
pub trait FramePool<T> {
    /// Take the next ready frame, if any. Dropping the frame returns it.
    fn try_get_next_frame(&mut self) -> Option<CapturedFrame<T>>;

    /// Reallocate the pool's buffers at a new size
    fn recreate(&mut self, buffer_count: u32, size: Size) -> Result<()>;
}

/// Receives frame-arrived notifications on the video producer context
pub trait FrameArrivedHandler<T>: Send + Sync {
    fn on_frame_arrived(&self, pool: &mut dyn FramePool<T>);
}

/// Window capture capability
pub trait VideoCapture<T>: Send {
    /// Size of the target window when the capture item was created
    fn item_size(&self) -> Size;

    /// Register the frame handler. Called once, before `start`.
    fn set_frame_handler(&mut self, handler: Arc<dyn FrameArrivedHandler<T>>);

    fn start(&mut self) -> Result<()>;

    /// Stop delivering frames. Must be idempotent.
    fn stop(&mut self);
}

/// One data-available notification from the loopback device
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    pub data: &'a [u8],
    pub format: WaveFormat,
}

/// Receives data-available notifications on the audio producer context
pub trait AudioDataHandler: Send + Sync {
    fn on_data_available(&self, chunk: &AudioChunk<'_>);
}

/// System audio loopback capability
pub trait AudioCapture: Send {
    /// Format of the bytes delivered to the handler
    fn wave_format(&self) -> WaveFormat;

    /// Register the data handler. Called once, before `start`.
    fn set_data_handler(&mut self, handler: Arc<dyn AudioDataHandler>);

    fn start(&mut self) -> Result<()>;

    /// Stop recording. Must be idempotent.
    fn stop(&mut self);
}
