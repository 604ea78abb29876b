//! Error types for Vidplay Core

use thiserror::Error;

/// Result type alias for playback and registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Video metadata unavailable for video {video_id}: {reason}")]
    MetadataUnavailable { video_id: u64, reason: String },

    #[error("Requested rendition is not available: {0}")]
    InvalidRenditionRequested(String),

    // Media errors
    #[error("Playback resume rejected: {0}")]
    PlaybackResumeFailed(String),

    #[error("Failed to load media source {url}: {reason}")]
    MediaLoad { url: String, reason: String },

    #[error("Seek to {position}s failed: {reason}")]
    MediaSeek { position: f64, reason: String },

    // Registry errors
    #[error("Registry returned {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Controller errors
    #[error("Playback controller is no longer running")]
    ControllerClosed,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a metadata error for a video
    pub fn metadata(video_id: u64, reason: impl Into<String>) -> Self {
        Error::MetadataUnavailable {
            video_id,
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MetadataUnavailable { .. }
                | Error::PlaybackResumeFailed(_)
                | Error::MediaLoad { .. }
                | Error::Network(_)
        ) || matches!(self, Error::Registry { status, .. } if *status >= 500)
    }

    /// Returns the error code for logs and events
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MetadataUnavailable { .. } => "METADATA_UNAVAILABLE",
            Error::InvalidRenditionRequested(_) => "INVALID_RENDITION",
            Error::PlaybackResumeFailed(_) => "RESUME_FAILED",
            Error::MediaLoad { .. } => "MEDIA_LOAD",
            Error::MediaSeek { .. } => "MEDIA_SEEK",
            Error::Registry { .. } => "REGISTRY",
            Error::InvalidUpload(_) => "INVALID_UPLOAD",
            Error::Network(_) => "NETWORK",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ControllerClosed => "CONTROLLER_CLOSED",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_message() {
        let err = Error::metadata(99, "connection refused");
        assert_eq!(
            err.to_string(),
            "Video metadata unavailable for video 99: connection refused"
        );
        assert_eq!(err.error_code(), "METADATA_UNAVAILABLE");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_registry_recoverability() {
        let server = Error::Registry { status: 503, message: "busy".into() };
        let missing = Error::Registry { status: 404, message: "gone".into() };
        assert!(server.is_recoverable());
        assert!(!missing.is_recoverable());
        assert!(!Error::InvalidRenditionRequested("4k".into()).is_recoverable());
    }
}
