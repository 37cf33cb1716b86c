//! Error types for wincap

use thiserror::Error;

/// Result type alias using WincapError
pub type Result<T> = std::result::Result<T, WincapError>;

/// Main error type for wincap operations
#[derive(Debug, Error)]
pub enum WincapError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested PCM bit depth cannot be produced
    #[error("Unsupported bit depth: {0} (expected 16 or 24)")]
    UnsupportedBitDepth(u32),

    /// Graphics device or swap chain failure
    #[error("Device error: {0}")]
    Device(String),

    /// Window or loopback capture failure
    #[error("Capture error: {0}")]
    Capture(String),

    /// Encoder / transcoder failure
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// The engine asked for a stream we do not provide
    #[error("Unknown stream requested: {0}")]
    UnknownStream(String),

    /// Encoding already in progress on this encoder
    #[error("Encoder is already recording")]
    EncoderBusy,

    /// Session already running
    #[error("Capture session already running")]
    SessionAlreadyRunning,

    /// Session has been stopped and cannot be restarted
    #[error("Capture session stopped")]
    SessionStopped,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<WincapError>,
    },
}

impl WincapError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a capture error
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Create an encoder error
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &WincapError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// A short hint for the user on how to fix the problem
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Config(_) => Some("Check ~/.config/wincap/config.toml or run `wincap config init`"),
            Self::UnsupportedBitDepth(_) => Some("Set [audio] bits_per_sample to 16 or 24"),
            Self::Device(_) => Some("Make sure a graphics device is available and not lost"),
            Self::Capture(_) => Some("The captured window may have closed; start a new session"),
            Self::SessionAlreadyRunning | Self::SessionStopped => {
                Some("Create a new capture session to record again")
            }
            _ => None,
        }
    }

    /// Whether the user can fix this without a code change
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::Config(_)
                | Self::UnsupportedBitDepth(_)
                | Self::Capture(_)
                | Self::SessionAlreadyRunning
                | Self::SessionStopped
                | Self::Io(_)
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
