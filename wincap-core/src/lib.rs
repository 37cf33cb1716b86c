//! wincap Core Library
//!
//! Captures a single window together with system loopback audio, keeps both
//! streams on a common capture-relative clock, mirrors the video into a live
//! preview and hands samples to a pull-based transcoding engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Window frames│──▶│ Frame Source │──┬──▶ Preview Surface (swap chain)
//! └──────────────┘   └──────────────┘  │
//!                                      ▼
//!                               ┌─────────────┐   ┌─────────┐   ┌──────────────┐
//!                               │ video queue │──▶│         │   │              │
//!                               └─────────────┘   │ Encoder │──▶│ Transcode    │
//!                               ┌─────────────┐   │ (pull)  │   │ engine       │
//!                               │ audio queue │──▶│         │   │              │
//!                               └─────────────┘   └─────────┘   └──────────────┘
//!                                      ▲
//! ┌──────────────┐   ┌──────────────┐  │
//! │ Loopback PCM │──▶│ Audio Source │──┘
//! └──────────────┘   └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod gpu;
pub mod session;
pub mod types;

pub use config::{CaptureConfig, ConfigFile, VideoQuality};
pub use encode::{Encoder, EncodingProfile, MediaSample, SampleSource, StreamKind, TranscodeEngine};
pub use error::{Result, WincapError};
pub use session::{CaptureSession, SessionState, SessionStats};
pub use types::{AudioSample, Color, Handle, Pixel, Region, Size, VideoSample};
