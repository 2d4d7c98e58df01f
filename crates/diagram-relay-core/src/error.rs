//! Shared error type across diagram relay crates.

use std::fmt;

use thiserror::Error;

/// Which peer of the relay an error or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The browser-hosted diagram renderer (WebSocket).
    Browser,
    /// The editor process (line-delimited TCP).
    Editor,
}

impl Side {
    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Browser => "browser",
            Side::Editor => "editor",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
///
/// None of these are fatal to a connection: transports log them and drop the
/// offending message. Only `BadConfig`, `UnsupportedVersion` and `Io` on a
/// listener stop the process, and only at startup.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("no {0} connected")]
    NoDestination(Side),
    #[error("{0} outbound queue full")]
    QueueFull(Side),
    #[error("{0} connection closed")]
    Closed(Side),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Parse(_) => "parse",
            RelayError::MalformedEnvelope(_) => "malformed_envelope",
            RelayError::UnknownMethod(_) => "unknown_method",
            RelayError::FrameTooLarge { .. } => "frame_too_large",
            RelayError::NoDestination(_) => "no_destination",
            RelayError::QueueFull(_) => "queue_full",
            RelayError::Closed(_) => "closed",
            RelayError::BadConfig(_) => "bad_config",
            RelayError::UnsupportedVersion => "unsupported_version",
            RelayError::Io(_) => "io",
            RelayError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e.to_string())
    }
}
