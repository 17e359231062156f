//! Mailbox credentials and bearer-token renewal.
//!
//! A backup of a large mailbox outlives a Google access token, so every
//! reconnect after the first asks the [`TokenRefresher`] for a fresh one.

use mailkeep_oauth::{OAuthClient, Token};
use tracing::debug;

use crate::{Error, Result};

/// How to authenticate against the mailbox.
#[derive(Clone)]
pub enum Credential {
    /// Application password, sent with LOGIN.
    Password(String),
    /// OAuth2 bearer token, sent with XOAUTH2.
    Bearer(Token),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(..)"),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Source of renewed bearer tokens.
#[allow(async_fn_in_trait)]
pub trait TokenRefresher {
    /// Returns a usable token for `email`, given the one that stopped working.
    async fn refresh(&self, email: &str, current: &Token) -> Result<Token>;
}

impl TokenRefresher for OAuthClient {
    async fn refresh(&self, email: &str, current: &Token) -> Result<Token> {
        debug!(email, "renewing bearer token");
        Ok(self.refresh_token(current).await?)
    }
}

/// Refresher for credentials that cannot be renewed.
///
/// Passwords never need it; a bearer token used with it is reused as is
/// until it expires, after which reconnecting fails with an auth error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

impl TokenRefresher for NoRefresh {
    async fn refresh(&self, email: &str, current: &Token) -> Result<Token> {
        if current.is_expired() {
            return Err(Error::Auth {
                email: email.to_string(),
                reason: "access token expired and cannot be refreshed".to_string(),
            });
        }
        Ok(current.clone())
    }
}
