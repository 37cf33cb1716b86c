//! Configuration file loading and saving
//!
//! Loads user configuration from `~/.config/wincap/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{default_save_dir, CaptureConfig, VideoQuality};
use crate::error::{Result, WincapError};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Where recordings go
    #[serde(default)]
    pub recording: RecordingSettings,

    /// Loopback audio output format
    #[serde(default)]
    pub audio: AudioSettings,

    /// Video encoder settings
    #[serde(default)]
    pub video: VideoSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Root folder; each capture target gets a subfolder
    #[serde(default = "default_video_save_path")]
    pub video_save_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Output bit depth: 16 or 24
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u32,

    /// Output channel count
    #[serde(default = "default_channels")]
    pub channels: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Quality preset (auto, hd1080p, hd720p, ...)
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_video_save_path() -> PathBuf {
    default_save_dir()
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_bits_per_sample() -> u32 {
    16
}

fn default_channels() -> u16 {
    2
}

fn default_quality() -> String {
    "hd1080p".to_string()
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            video_save_path: default_video_save_path(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            bits_per_sample: default_bits_per_sample(),
            channels: default_channels(),
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            quality: default_quality(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("wincap").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("wincap").join("config.toml")
        } else {
            PathBuf::from("wincap.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| WincapError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| WincapError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    WincapError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| WincapError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| WincapError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Remember a new save location
    pub fn set_video_save_path(&mut self, path: impl Into<PathBuf>) {
        self.recording.video_save_path = path.into();
    }

    /// Build the runtime configuration, validating it
    pub fn to_capture_config(&self) -> Result<CaptureConfig> {
        let quality: VideoQuality = self
            .video
            .quality
            .parse()
            .map_err(WincapError::Config)?;

        let config = CaptureConfig::default()
            .with_sample_rate(self.audio.sample_rate)
            .with_bits_per_sample(self.audio.bits_per_sample)
            .with_channels(self.audio.channels)
            .with_quality(quality)
            .with_save_dir(self.recording.video_save_path.clone());
        config.validate()?;
        Ok(config)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# wincap configuration

[recording]
# Root folder for recordings. Each captured window gets its own subfolder:
#   <video_save_path>/<target>/<target>_YYYY_MM_DD_HH_mm_ss.mp4
# Defaults to your Videos folder when omitted.
# video_save_path = "/home/me/Videos"

[audio]
# Output sample rate in Hz
sample_rate = 48000

# Output bit depth: 16 or 24
bits_per_sample = 16

# Output channels
channels = 2

[video]
# Quality preset: auto, hd1080p, hd720p, wvga, ntsc, pal, vga, qvga, uhd2160p, uhd4320p
quality = "hd1080p"
"#
    .to_string()
}
