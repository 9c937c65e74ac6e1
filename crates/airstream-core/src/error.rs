//! Error types for AIrStream Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("Invalid manifest format: {0}")]
    InvalidManifest(String),

    // Source / session errors
    #[error("Invalid playback source: {0}")]
    InvalidSource(String),

    #[error("No active playback session")]
    NoSession,

    #[error("Adaptive streaming is not supported by this runtime")]
    AdaptiveUnsupported,

    #[error("Quality level {index} not available ({available} levels)")]
    QualityUnavailable { index: usize, available: usize },

    // Media handle errors
    #[error("Autoplay rejected: {0}")]
    AutoplayRejected(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Fullscreen request failed: {0}")]
    Fullscreen(String),

    // Host errors
    #[error("Library request failed with status {status}: {url}")]
    LibraryStatus { url: String, status: u16 },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Persisted state error: {0}")]
    Storage(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Player runtime has stopped")]
    RuntimeStopped,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for conditions the player expects during normal use
    /// (autoplay blocked until a user gesture) and silently absorbs.
    pub fn is_expected(&self) -> bool {
        matches!(self, Error::AutoplayRejected(_))
    }

    /// Returns the error code used in logs and notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::InvalidManifest(_) => "INVALID_MANIFEST",
            Error::InvalidSource(_) => "INVALID_SOURCE",
            Error::NoSession => "NO_SESSION",
            Error::AdaptiveUnsupported => "ADAPTIVE_UNSUPPORTED",
            Error::QualityUnavailable { .. } => "QUALITY_UNAVAILABLE",
            Error::AutoplayRejected(_) => "AUTOPLAY_REJECTED",
            Error::Media(_) => "MEDIA",
            Error::Fullscreen(_) => "FULLSCREEN",
            Error::LibraryStatus { .. } => "LIBRARY_STATUS",
            Error::Upload(_) => "UPLOAD",
            Error::Storage(_) => "STORAGE",
            Error::Network(_) => "NETWORK",
            Error::Url(_) => "URL",
            Error::RuntimeStopped => "RUNTIME_STOPPED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }
}
