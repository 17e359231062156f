//! SASL strings for IMAP `AUTHENTICATE`.
//!
//! Gmail accepts XOAUTH2 for bearer tokens. When it rejects one, it sends a
//! continuation carrying a base64 JSON document before the tagged `NO`;
//! [`decode_xoauth2_challenge`] turns that into something loggable.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Generates the XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01` (base64 encoded)
///
/// # Example
///
/// ```
/// use mailkeep_oauth::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@gmail.com", "ya29.a0...");
/// // Send: AUTHENTICATE XOAUTH2 {response}
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Error document sent by the server when it rejects a bearer token.
///
/// `{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}`
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuthError {
    /// HTTP-like status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: String,
    /// Scope required.
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(scope) = &self.scope {
            write!(f, ", scope {scope}")?;
        }
        Ok(())
    }
}

/// Decodes the base64 JSON challenge of a failed XOAUTH2 exchange.
///
/// Returns `None` when the challenge is not a recognizable error document.
#[must_use]
pub fn decode_xoauth2_challenge(challenge: &str) -> Option<OAuthError> {
    let raw = STANDARD.decode(challenge.trim()).ok()?;
    serde_json::from_slice(&raw).ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_response() {
        let response = xoauth2_response("user@gmail.com", "token123");
        let decoded = String::from_utf8(STANDARD.decode(&response).unwrap()).unwrap();

        assert_eq!(decoded, "user=user@gmail.com\x01auth=Bearer token123\x01\x01");
    }

    #[test]
    fn test_decode_challenge() {
        let doc = r#"{"status":"400","schemes":"Bearer","scope":"https://mail.google.com/"}"#;
        let challenge = STANDARD.encode(doc);

        let err = decode_xoauth2_challenge(&challenge).unwrap();
        assert_eq!(err.status, "400");
        assert_eq!(err.scope.as_deref(), Some("https://mail.google.com/"));
        assert_eq!(err.to_string(), "status 400, scope https://mail.google.com/");
    }

    #[test]
    fn test_decode_garbage_challenge() {
        assert!(decode_xoauth2_challenge("not base64 !!").is_none());
        assert!(decode_xoauth2_challenge(&STANDARD.encode("plain text")).is_none());
    }
}
