//! # mailkeep-oauth
//!
//! Bearer-token plumbing for long-running Gmail IMAP sessions.
//!
//! Backups of large mailboxes run for hours while Google access tokens live
//! for about one. This crate holds the token model, the refresh-token grant
//! that renews it, and the SASL strings IMAP needs to present it.
//!
//! ## Refreshing before a reconnect
//!
//! ```ignore
//! use mailkeep_oauth::{OAuthClient, Provider, Token};
//!
//! let client = OAuthClient::new("client-id", Provider::google()?)
//!     .with_client_secret("client-secret");
//!
//! if token.is_expired() {
//!     token = client.refresh_token(&token).await?;
//! }
//! let sasl = mailkeep_oauth::sasl::xoauth2_response("me@gmail.com", &token.access_token);
//! // Send: AUTHENTICATE XOAUTH2 {sasl}
//! ```
//!
//! Authorization itself (browser consent, device codes) happens elsewhere;
//! this crate only consumes a token that already carries a refresh token.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod provider;
pub mod sasl;
pub mod token;

pub use client::OAuthClient;
pub use error::{Error, Result};
pub use provider::Provider;
pub use token::Token;
