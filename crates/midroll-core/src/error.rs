//! Error types for Midroll Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback session error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Ad pipeline errors
    #[error("Ad request failed: {0}")]
    AdRequestFailed(String),

    #[error("Ad playback failed: {0}")]
    AdPlaybackFailed(String),

    // Content errors
    #[error("Content preparation failed: {0}")]
    ContentPrepareFailed(String),

    #[error("Content playback failed: {0}")]
    ContentPlaybackFailed(String),

    // Session lifecycle errors
    #[error("A load is already in flight")]
    SessionBusy,

    #[error("Session has been torn down")]
    SessionClosed,
}

impl Error {
    /// Returns true if the session can continue playing after this error.
    ///
    /// Ad failures are always recoverable: the session falls back to content
    /// playback. Content failures are not, since content is the asset the
    /// session exists for.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AdRequestFailed(_) | Error::AdPlaybackFailed(_))
    }

    /// Returns the stable error code for observability
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::AdRequestFailed(_) => "AD_REQUEST",
            Error::AdPlaybackFailed(_) => "AD_PLAYBACK",
            Error::ContentPrepareFailed(_) => "CONTENT_PREPARE",
            Error::ContentPlaybackFailed(_) => "CONTENT_PLAYBACK",
            Error::SessionBusy => "SESSION_BUSY",
            Error::SessionClosed => "SESSION_CLOSED",
        }
    }
}

/// Serializable fault record carried on the playback snapshot.
///
/// The snapshot is a plain value the presentation layer renders from, so
/// errors cross that boundary as code + message rather than as the error
/// enum itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackFault {
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// False for ad faults the session recovered from
    pub fatal: bool,
}

impl From<&Error> for PlaybackFault {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            fatal: !error.is_recoverable(),
        }
    }
}
