//! Type-state IMAP client connection.
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after LOGIN or AUTHENTICATE
//! - `Selected`: after SELECT
//!
//! Mailbox commands are available in both authorized states through the
//! [`Authorized`] bound, so a selected client can still APPEND elsewhere.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{trace, warn};

pub use self::states::{Authenticated, Authorized, NotAuthenticated, Selected};
use super::framed::{FramedStream, ResponseAccumulator};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Result of a completed command: its untagged data and the tagged OK code.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    pub(crate) untagged: Vec<UntaggedResponse>,
    pub(crate) code: Option<ResponseCode>,
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server speaks the Gmail `X-GM-EXT-1` extensions.
    #[must_use]
    pub fn supports_gmail_ext(&self) -> bool {
        self.has_capability(&Capability::GmailExt1)
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Says goodbye. The connection is unusable afterwards whatever the outcome.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;

        // BYE followed by EOF is a valid ending too.
        let _ = self.read_until_tagged(&tag).await;
        let _ = self.stream.shutdown().await;

        Ok(())
    }

    /// Changes the type-state, keeping the connection.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends a command and collects everything up to its tagged completion.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tag_gen.next();
        trace!(%tag, command = %command.redacted(), "sending");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let responses = self.read_until_tagged(&tag).await?;
        self.complete(&responses, &tag)
    }

    /// Reads responses until we get a tagged response matching our tag.
    pub(crate) async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        ResponseAccumulator::new(tag)
            .read_until_tagged(&mut self.stream)
            .await
    }

    /// Parses the responses of one command and checks its tagged status.
    ///
    /// Untagged lines that fail to parse are logged and dropped; the caller
    /// sees the data as missing.
    pub(crate) fn complete(&mut self, responses: &[Vec<u8>], tag: &str) -> Result<Completion> {
        let mut completion = Completion::default();

        for bytes in responses {
            match ResponseParser::parse(bytes) {
                Ok(Response::Tagged {
                    tag: resp_tag,
                    status,
                    code,
                    text,
                }) if resp_tag.as_str() == tag => {
                    if let Some(ResponseCode::Capability(caps)) = &code {
                        self.capabilities.clone_from(caps);
                    }
                    return match status {
                        Status::Ok | Status::PreAuth => {
                            completion.code = code;
                            Ok(completion)
                        }
                        Status::No => Err(Error::No { code, text }),
                        Status::Bad => Err(Error::Bad { code, text }),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Ok(Response::Untagged(UntaggedResponse::Capability(caps))) => {
                    self.capabilities.clone_from(&caps);
                }
                Ok(Response::Untagged(untagged)) => completion.untagged.push(untagged),
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "skipping unparseable response");
                }
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }
}
