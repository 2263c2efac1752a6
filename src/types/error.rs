//! Error types for noemoji
//!
//! Every failure a caller can observe is a variant of [`Error`]. The variants
//! fall into a handful of categories (see [`ErrorKind`]) so callers can tell
//! "the backend said no" apart from "the backend could not be reached".

use std::time::Duration;

/// Main error type for noemoji operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection could not be established, was reset, or failed mid-flight
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response arrived within the configured deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller abandoned the request before a response arrived
    #[error("Request cancelled")]
    Cancelled,

    /// Response could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Backend answered with a raw (non-JSON) payload where structured data was required
    #[error("Backend error: {0}")]
    Backend(String),

    /// Well-formed negative answer to a meaningful request
    #[error("{0}")]
    Rejected(String),

    /// No local (uid, token) pair is available
    #[error("Not logged in")]
    NotLoggedIn,

    /// Backend rejected the stored session token
    #[error("Session invalid or expired")]
    SessionInvalid,

    /// Stored credential digest could not be parsed
    #[error("Malformed credential digest: {0}")]
    MalformedDigest(String),

    /// Key derivation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Operation envelope could not be built from the supplied fields
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not talk to the backend at all
    Transport,
    /// Talked to the backend but could not understand the answer
    Decode,
    /// Backend gave a negative answer
    Rejection,
    /// Local identity missing or rejected before any privileged work
    Precondition,
    /// Credential digest problems
    Credential,
    /// Local IO, serialization, or configuration problems
    Local,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::Cancelled => ErrorKind::Transport,
            Self::Decode(_) | Self::Backend(_) => ErrorKind::Decode,
            Self::Rejected(_) => ErrorKind::Rejection,
            Self::NotLoggedIn | Self::SessionInvalid => ErrorKind::Precondition,
            Self::MalformedDigest(_) | Self::Crypto(_) => ErrorKind::Credential,
            Self::InvalidEnvelope(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Local
            }
        }
    }

    /// Whether the failure happened before or on the wire rather than in the backend's answer
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Result type alias for noemoji operations
pub type Result<T> = std::result::Result<T, Error>;
