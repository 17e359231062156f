//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailkeep_imap::Error),

    /// Token refresh failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] mailkeep_oauth::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The server refused the credentials for a mailbox.
    #[error("Authentication failed for {email}: {reason}")]
    Auth {
        /// Mailbox address.
        email: String,
        /// What the server or token endpoint said.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The archive belongs to another mailbox.
    #[error("Archive belongs to {archive_owner}, refusing to use it for {requested}")]
    OwnerMismatch {
        /// Owner recorded in the archive.
        archive_owner: String,
        /// Mailbox the caller asked for.
        requested: String,
    },

    /// A `.meta` file could not be parsed.
    #[error("Malformed metadata in {}: {reason}", path.display())]
    MalformedMetadata {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Metadata exists but its body file does not.
    #[error("No body stored for message {0}")]
    MissingBody(u64),

    /// A stored body does not decompress.
    #[error("Corrupt message body: {0}")]
    CorruptBody(String),

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The server refused to store a message as unparseable.
    #[error("Message rejected by server: {0}")]
    PushRejected(String),

    /// The server stored a message without reporting its UID.
    #[error("Append response carried no APPENDUID")]
    MissingAppendUid,

    /// No record with this id in the archive.
    #[error("Message {0} not found in archive")]
    NotFound(u64),
}

impl Error {
    /// Returns true if retrying on a fresh connection may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Imap(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the credentials were refused.
    ///
    /// A failed token refresh counts: nothing short of a new authorization
    /// can fix it.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth { .. } => true,
            Self::Imap(err) => err.is_auth(),
            Self::OAuth(err) => err.is_grant_rejected(),
            _ => false,
        }
    }

    /// Returns true if an archived record cannot be read back as written.
    #[must_use]
    pub const fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            Self::MalformedMetadata { .. }
                | Self::MissingBody(_)
                | Self::CorruptBody(_)
                | Self::Crypto(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
