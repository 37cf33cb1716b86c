//! Core types for wincap
//!
//! Value types shared by the capture, preview and encoding halves of the
//! pipeline: geometry, pixels, samples and audio formats.

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Result, WincapError};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Component-wise minimum
    pub fn min(self, other: Size) -> Size {
        Size::new(self.width.min(other.width), self.height.min(other.height))
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid size '{}', expected WIDTHxHEIGHT", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid width in '{}'", s))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid height in '{}'", s))?;
        Ok(Size::new(width, height))
    }
}

/// Rectangle inside a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Region anchored at the origin covering `size`
    pub fn from_size(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shrink the region so it fits inside a texture of `bounds`
    pub fn clamp_to(self, bounds: Size) -> Self {
        let x = self.x.min(bounds.width);
        let y = self.y.min(bounds.height);
        Self {
            x,
            y,
            width: self.width.min(bounds.width - x),
            height: self.height.min(bounds.height - y),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Normalized RGBA color, used for clears
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Opaque black, the background behind captured content
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Quantize to a BGRA8 pixel
    pub fn to_pixel(self) -> Pixel {
        fn unorm(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Pixel {
            b: unorm(self.b),
            g: unorm(self.g),
            r: unorm(self.r),
            a: unorm(self.a),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// One BGRA8 (B8G8R8A8 UNORM) pixel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Pixel {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Pixel {
    pub const fn bgra(b: u8, g: u8, r: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }
}

/// A captured video frame ready for the encoder
#[derive(Debug)]
pub struct VideoSample<T> {
    surface: T,
    timestamp: Duration,
}

impl<T> VideoSample<T> {
    pub fn new(surface: T, timestamp: Duration) -> Self {
        Self { surface, timestamp }
    }

    /// Pixel buffer of the frame
    pub fn surface(&self) -> &T {
        &self.surface
    }

    /// Time since capture start
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn into_surface(self) -> T {
        self.surface
    }
}

/// Converted loopback PCM ready for the encoder
#[derive(Debug, Clone)]
pub struct AudioSample {
    data: Bytes,
    timestamp: Duration,
}

impl AudioSample {
    pub fn new(data: impl Into<Bytes>, timestamp: Duration) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }

    /// Interleaved little-endian PCM
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time since capture start
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Encoding of raw captured audio bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 32-bit IEEE float, the usual loopback mix format
    #[default]
    Float32,
    Pcm16,
    Pcm24,
    Pcm32,
}

impl SampleEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Float32 | Self::Pcm32 => 4,
            Self::Pcm16 => 2,
            Self::Pcm24 => 3,
        }
    }
}

/// Declared format of loopback audio data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl WaveFormat {
    pub fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// Bytes per interleaved frame (all channels)
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self::new(48000, 2, SampleEncoding::Float32)
    }
}

/// Output PCM bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Sixteen,
    TwentyFour,
}

impl BitDepth {
    pub fn bits(&self) -> u32 {
        match self {
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = WincapError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            16 => Ok(Self::Sixteen),
            24 => Ok(Self::TwentyFour),
            other => Err(WincapError::UnsupportedBitDepth(other)),
        }
    }
}

/// Size of the content currently being captured.
///
/// Written only from the video callback context; readable anywhere.
#[derive(Debug)]
pub struct CaptureRegion(AtomicU64);

impl CaptureRegion {
    pub fn new(size: Size) -> Self {
        Self(AtomicU64::new(pack(size)))
    }

    pub fn get(&self) -> Size {
        unpack(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, size: Size) {
        self.0.store(pack(size), Ordering::Release);
    }
}

fn pack(size: Size) -> u64 {
    ((size.width as u64) << 32) | size.height as u64
}

fn unpack(v: u64) -> Size {
    Size::new((v >> 32) as u32, v as u32)
}
