//! Mailbox-level commands, valid once authenticated.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authorized, Selected};
use crate::command::Command;
use crate::connection::framed::is_tagged_by;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Flag, ListResponse, Mailbox, MailboxStatus, ResponseCode, Uid};
use crate::{Error, Result};

impl<S, St> Client<S, St>
where
    S: AsyncRead + AsyncWrite + Unpin,
    St: Authorized,
{
    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let completion = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::List(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// Creates a mailbox. On Gmail this creates a label.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.execute(&Command::Create {
            mailbox: Mailbox::new(mailbox),
        })
        .await?;
        Ok(())
    }

    /// Deletes a mailbox.
    pub async fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.execute(&Command::Delete {
            mailbox: Mailbox::new(mailbox),
        })
        .await?;
        Ok(())
    }

    /// Appends a message.
    ///
    /// Returns the UID from APPENDUID when the server reports one.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        internal_date: Option<&str>,
        message: &[u8],
    ) -> Result<Option<Uid>> {
        let tag = self.tag_gen.next();
        let command = Command::Append {
            mailbox: Mailbox::new(mailbox),
            flags: flags
                .iter()
                .filter(|f| !f.is_session_only())
                .cloned()
                .collect(),
            internal_date: internal_date.map(ToString::to_string),
            size: message.len(),
        };
        self.stream.write_command(&command.serialize(&tag)).await?;

        // Wait for the go-ahead; a tagged answer here is a refusal.
        let mut responses = Vec::new();
        loop {
            let response = self.stream.read_response().await?;
            if is_tagged_by(&response, &tag) {
                responses.push(response);
                self.complete(&responses, &tag)?;
                return Err(Error::Protocol(
                    "APPEND completed without sending the literal".to_string(),
                ));
            }
            if matches!(
                ResponseParser::parse(&response),
                Ok(Response::Continuation { .. })
            ) {
                break;
            }
            responses.push(response);
        }

        self.stream.write_raw(message).await?;
        self.stream.write_raw(b"\r\n").await?;

        responses.extend(self.read_until_tagged(&tag).await?);
        let completion = self.complete(&responses, &tag)?;

        Ok(match completion.code {
            Some(ResponseCode::AppendUid { uid, .. }) => Some(uid),
            _ => None,
        })
    }

    /// Selects a mailbox for read-write access.
    pub async fn select(mut self, mailbox: &str) -> Result<Client<S, Selected>> {
        let completion = self
            .execute(&Command::Select {
                mailbox: Mailbox::new(mailbox),
            })
            .await?;

        let mut status = parse_mailbox_status(&completion.untagged);
        status.read_only = matches!(completion.code, Some(ResponseCode::ReadOnly));

        Ok(self.transition(Selected {
            mailbox: mailbox.to_string(),
            status,
        }))
    }
}

/// Builds a [`MailboxStatus`] from the untagged data of a SELECT.
pub(crate) fn parse_mailbox_status(untagged: &[UntaggedResponse]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response in untagged {
        match response {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
                ResponseCode::UidNext(uid) => status.uid_next = Some(*uid),
                _ => {}
            },
            _ => {}
        }
    }

    status
}
