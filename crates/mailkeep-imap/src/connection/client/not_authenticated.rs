//! Implementation for the not-authenticated state.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::config::Config;
use crate::connection::framed::{FramedStream, is_tagged_by};
use crate::connection::stream::{ImapStream, connect};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::ResponseCode;
use crate::{Error, Result};
use mailkeep_oauth::Token;
use mailkeep_oauth::sasl::{decode_xoauth2_challenge, xoauth2_response};

impl Client<ImapStream, NotAuthenticated> {
    /// Connects to the server described by `config` and reads the greeting.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = connect(config).await?;
        Self::from_stream_with_timeout(stream, config.command_timeout).await
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it advertises.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_stream_with_timeout(stream, Duration::from_secs(300)).await
    }

    /// Like [`Client::from_stream`], with an explicit per-response timeout.
    pub async fn from_stream_with_timeout(stream: S, timeout: Duration) -> Result<Self> {
        let mut framed = FramedStream::new(stream).with_timeout(timeout);

        let greeting = framed.read_response().await?;
        let mut capabilities = Vec::new();

        match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, text } | UntaggedResponse::PreAuth { code, text },
            ) => {
                debug!(greeting = %text, "connected");
                if let Some(ResponseCode::Capability(caps)) = code {
                    capabilities = caps;
                }
            }
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::Bye(text));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN (application password).
    ///
    /// A `NO` answer becomes [`Error::Auth`], unless it is Gmail throttling
    /// the login, which stays a transient [`Error::No`].
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };

        match self.execute(&command).await {
            Ok(_) => Ok(self.transition(Authenticated)),
            Err(err) => Err(refusal(err, None)),
        }
    }

    /// Authenticates with the XOAUTH2 SASL mechanism.
    ///
    /// When Gmail rejects the token it first sends a continuation holding a
    /// base64 JSON error; the client answers with an empty line and then
    /// receives the tagged `NO`, which becomes [`Error::Auth`]. Throttling
    /// answers are passed through as with [`Client::login`].
    pub async fn authenticate_xoauth2(
        mut self,
        email: &str,
        token: &Token,
    ) -> Result<Client<S, Authenticated>> {
        let tag = self.tag_gen.next();
        let command = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some(xoauth2_response(email, &token.access_token)),
        };
        self.stream.write_command(&command.serialize(&tag)).await?;

        let mut responses = Vec::new();
        let mut challenge = None;

        loop {
            let response = self.stream.read_response().await?;
            if is_tagged_by(&response, &tag) {
                responses.push(response);
                break;
            }
            if let Ok(Response::Continuation { text }) = ResponseParser::parse(&response) {
                challenge = text.as_deref().and_then(decode_xoauth2_challenge);
                if let Some(detail) = &challenge {
                    warn!(%detail, "XOAUTH2 rejected");
                }
                self.stream.write_raw(b"\r\n").await?;
                continue;
            }
            responses.push(response);
        }

        match self.complete(&responses, &tag) {
            Ok(_) => Ok(self.transition(Authenticated)),
            Err(err) => Err(refusal(err, challenge.map(|c| c.to_string()))),
        }
    }
}

/// Maps a refused authentication command to [`Error::Auth`].
///
/// Gmail answers a login with `NO [UNAVAILABLE]`, `[THROTTLED]` or "Too many
/// simultaneous connections" when rate limiting; those keep their transient
/// `NO` so the caller backs off and reconnects.
fn refusal(err: Error, detail: Option<String>) -> Error {
    match err {
        Error::No { .. } if err.is_transient() => err,
        Error::No { text, .. } => Error::Auth(match detail {
            Some(detail) => format!("{text} ({detail})"),
            None => text,
        }),
        err => err,
    }
}
