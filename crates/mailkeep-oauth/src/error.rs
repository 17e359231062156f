//! Error types for token handling.

use std::io;

/// Result type alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Token handling errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request to the token endpoint failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The token endpoint answered with an error document.
    #[error("OAuth2 error: {error} - {description}")]
    OAuth {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// The token cannot be renewed because it carries no refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The token endpoint answered with something that is not a token.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Creates an OAuth error from error code and description.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns true if the grant itself was refused.
    ///
    /// A revoked or expired refresh token (`invalid_grant`) cannot be fixed
    /// by trying again; the user has to authorize anew.
    #[must_use]
    pub fn is_grant_rejected(&self) -> bool {
        match self {
            Self::OAuth { error, .. } => {
                matches!(error.as_str(), "invalid_grant" | "unauthorized_client" | "invalid_client")
            }
            Self::NoRefreshToken => true,
            _ => false,
        }
    }
}
