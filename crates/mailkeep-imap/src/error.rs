//! Error types for the IMAP library.

use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Protocol parsing error.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO.
    #[error("Server returned NO: {text}")]
    No {
        /// Response code, when the server sent one.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },

    /// Server returned BAD.
    #[error("Server returned BAD: {text}")]
    Bad {
        /// Response code, when the server sent one.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection is gone and must be re-established.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Text fragments Gmail uses when it sheds load instead of failing a command.
const THROTTLE_MARKERS: &[&str] = &[
    "too many simultaneous",
    "temporary",
    "try again",
    "system error",
    "server unavailable",
];

impl Error {
    /// Returns true if the same command may succeed on a fresh connection.
    ///
    /// Transport failures, a dropped session and Gmail throttling answers
    /// qualify. Authentication failures and ordinary `NO`/`BAD` answers do not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_)
            | Self::Tls(_)
            | Self::Bye(_)
            | Self::Timeout(_)
            | Self::Parse { .. }
            | Self::Protocol(_)
            | Self::ConnectionLost(_) => true,
            Self::No { code, text } => {
                matches!(
                    code,
                    Some(ResponseCode::Unavailable | ResponseCode::Throttled | ResponseCode::Limit)
                ) || contains_marker(text)
            }
            Self::Auth(_) | Self::InvalidDnsName(_) | Self::Bad { .. } => false,
        }
    }

    /// Returns true if the server refused the credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::No { code, .. } => matches!(code, Some(ResponseCode::AuthenticationFailed)),
            _ => false,
        }
    }

    /// Returns true if the server refused a message as unparseable.
    #[must_use]
    pub fn is_parse_rejection(&self) -> bool {
        match self {
            Self::No { code, text } | Self::Bad { code, text } => {
                matches!(code, Some(ResponseCode::Parse)) || {
                    let text = text.to_ascii_lowercase();
                    text.contains("invalid message") || text.contains("unparseable")
                }
            }
            _ => false,
        }
    }

    /// Returns true if a CREATE failed because the mailbox already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::No { code, text } => {
                matches!(code, Some(ResponseCode::AlreadyExists))
                    || text.to_ascii_lowercase().contains("already exists")
                    || text.to_ascii_lowercase().contains("duplicate folder")
            }
            _ => false,
        }
    }
}

fn contains_marker(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    THROTTLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
