//! Refresh-token grant.

use std::collections::HashMap;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};

/// `OAuth2` client able to renew mailbox tokens.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Exchanges the refresh token of `token` for a fresh access token.
    ///
    /// The returned token keeps the original refresh token when the server
    /// does not rotate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] without any network traffic when
    /// `token` cannot be refreshed, and an `OAuth` error when the endpoint
    /// refuses the grant.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        debug!(provider = %self.provider.name, "refreshing access token");

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "token endpoint refused refresh");
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => error.into_error(),
                Err(_) => Error::InvalidResponse(format!("HTTP {status}")),
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body)?;
        let mut new_token = Token::from_response(token_response)?;

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        Ok(new_token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails_fast() {
        let client = OAuthClient::new("client", Provider::google().unwrap());
        let token = Token::new("ya29.expired", "Bearer");

        let err = client.refresh_token(&token).await.unwrap_err();
        assert!(matches!(err, Error::NoRefreshToken));
    }

    #[test]
    fn test_client_builder() {
        let client =
            OAuthClient::new("client", Provider::google().unwrap()).with_client_secret("secret");
        assert_eq!(client.client_id, "client");
        assert_eq!(client.client_secret.as_deref(), Some("secret"));
    }
}
