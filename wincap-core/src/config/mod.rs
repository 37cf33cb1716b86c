//! Configuration types for wincap
//!
//! Provides the recording format, encoder quality presets and where
//! recordings are saved.

mod file;

pub use file::{sample_config, AudioSettings, ConfigFile, RecordingSettings, VideoSettings};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, WincapError};
use crate::types::{BitDepth, Color, Size};

/// Frame rate written into the output video timing metadata
pub const OUTPUT_FPS: u32 = 60;

/// Encoder quality preset, mirroring the platform's MP4 profile presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    /// Match the source
    Auto,
    /// 1920x1080
    #[default]
    Hd1080p,
    /// 1280x720
    Hd720p,
    /// 800x480
    Wvga,
    /// 720x480
    Ntsc,
    /// 720x576
    Pal,
    /// 640x480
    Vga,
    /// 320x240
    Qvga,
    /// 3840x2160
    Uhd2160p,
    /// 7680x4320
    Uhd4320p,
}

impl VideoQuality {
    /// Output resolution, `None` for [`VideoQuality::Auto`]
    pub fn resolution(&self) -> Option<Size> {
        let (w, h) = match self {
            Self::Auto => return None,
            Self::Hd1080p => (1920, 1080),
            Self::Hd720p => (1280, 720),
            Self::Wvga => (800, 480),
            Self::Ntsc => (720, 480),
            Self::Pal => (720, 576),
            Self::Vga => (640, 480),
            Self::Qvga => (320, 240),
            Self::Uhd2160p => (3840, 2160),
            Self::Uhd4320p => (7680, 4320),
        };
        Some(Size::new(w, h))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Hd1080p => "hd1080p",
            Self::Hd720p => "hd720p",
            Self::Wvga => "wvga",
            Self::Ntsc => "ntsc",
            Self::Pal => "pal",
            Self::Vga => "vga",
            Self::Qvga => "qvga",
            Self::Uhd2160p => "uhd2160p",
            Self::Uhd4320p => "uhd4320p",
        }
    }
}

impl std::fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for VideoQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "hd1080p" | "1080p" => Ok(Self::Hd1080p),
            "hd720p" | "720p" => Ok(Self::Hd720p),
            "wvga" => Ok(Self::Wvga),
            "ntsc" => Ok(Self::Ntsc),
            "pal" => Ok(Self::Pal),
            "vga" => Ok(Self::Vga),
            "qvga" => Ok(Self::Qvga),
            "uhd2160p" | "2160p" | "4k" => Ok(Self::Uhd2160p),
            "uhd4320p" | "4320p" | "8k" => Ok(Self::Uhd4320p),
            _ => Err(format!("Unknown video quality: {}", s)),
        }
    }
}

/// Runtime configuration passed to a capture session
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Output audio sample rate in Hz
    pub sample_rate: u32,
    /// Output PCM bit depth (16 or 24)
    pub bits_per_sample: u32,
    /// Output audio channels
    pub channels: u16,
    /// Encoder quality preset
    pub quality: VideoQuality,
    /// Color behind and around the captured content
    pub blank_color: Color,
    /// Root folder for recordings
    pub save_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            bits_per_sample: 16,
            channels: 2,
            quality: VideoQuality::default(),
            blank_color: Color::BLACK,
            save_dir: default_save_dir(),
        }
    }
}

/// The user's video folder, falling back to the current directory
pub fn default_save_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl CaptureConfig {
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_bits_per_sample(mut self, bits: u32) -> Self {
        self.bits_per_sample = bits;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_quality(mut self, quality: VideoQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_blank_color(mut self, color: Color) -> Self {
        self.blank_color = color;
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Output bit depth, rejecting anything but 16 and 24
    pub fn bit_depth(&self) -> Result<BitDepth> {
        BitDepth::try_from(self.bits_per_sample)
    }

    /// Check the configuration, failing on the first problem
    pub fn validate(&self) -> Result<()> {
        self.bit_depth()?;
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(WincapError::config(format!(
                "Sample rate {} Hz out of range (8000-192000)",
                self.sample_rate
            )));
        }
        if !(1..=8).contains(&self.channels) {
            return Err(WincapError::config(format!(
                "Channel count {} out of range (1-8)",
                self.channels
            )));
        }
        Ok(())
    }

    /// `<save_dir>/<target>/<target>_<YYYY_MM_DD_HH_mm_ss>.mp4`
    pub fn recording_path(&self, target: &str, at: DateTime<Local>) -> PathBuf {
        let target = sanitize_target(target);
        let stamp = at.format("%Y_%m_%d_%H_%M_%S");
        self.save_dir
            .join(&target)
            .join(format!("{}_{}.mp4", target, stamp))
    }

    /// Recording path for "now", creating the target folder if needed
    pub fn prepare_recording_path(&self, target: &str) -> Result<PathBuf> {
        let path = self.recording_path(target, Local::now());
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Ok(path)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        debug!("Creating recording folder {:?}", dir);
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Target names come from process names; keep them filesystem-safe
fn sanitize_target(target: &str) -> String {
    let cleaned: String = target
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "capture".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.bits_per_sample, 16);
        assert_eq!(config.channels, 2);
        assert_eq!(config.quality, VideoQuality::Hd1080p);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bit_depth() {
        let config = CaptureConfig::default().with_bits_per_sample(32);
        assert!(matches!(
            config.validate(),
            Err(WincapError::UnsupportedBitDepth(32))
        ));
    }

    #[test]
    fn test_recording_path_layout() {
        let config = CaptureConfig::default().with_save_dir("/videos");
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = config.recording_path("notepad", at);
        assert_eq!(
            path,
            PathBuf::from("/videos/notepad/notepad_2024_03_09_07_05_01.mp4")
        );
    }

    #[test]
    fn test_sanitize_target() {
        assert_eq!(sanitize_target("a/b:c"), "a_b_c");
        assert_eq!(sanitize_target("  "), "capture");
        assert_eq!(sanitize_target(".."), "capture");
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("1080p".parse::<VideoQuality>().unwrap(), VideoQuality::Hd1080p);
        assert_eq!("4K".parse::<VideoQuality>().unwrap(), VideoQuality::Uhd2160p);
        assert!("potato".parse::<VideoQuality>().is_err());
        assert_eq!(VideoQuality::Auto.resolution(), None);
    }
}
