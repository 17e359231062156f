//! `OAuth2` provider endpoints.

use crate::error::Result;
use url::Url;

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Scopes a mailbox credential must carry.
    pub scopes: Vec<String>,
}

impl Provider {
    /// Creates a provider from a token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(name: impl Into<String>, token_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            token_url: Url::parse(token_url.as_ref())?,
            scopes: Vec::new(),
        })
    }

    /// Sets the required scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Google, with the full-mailbox scope IMAP requires.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new("Google", "https://oauth2.googleapis.com/token")?
            .with_scopes(vec!["https://mail.google.com/".to_string()]))
    }
}
