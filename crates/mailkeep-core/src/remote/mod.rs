//! Remote access layer.
//!
//! [`RemoteStore`] is the narrow operation set the engines drive.
//! [`GmailRemote`] implements it over IMAP, wrapping every call in a
//! [`RetryPolicy`] that reconnects on transient failures.

mod gmail;
pub mod labels;
mod retry;

use chrono::{DateTime, NaiveDate, Utc};
use mailkeep_imap::{FetchAttribute, SearchCriteria};
use tracing::warn;

use crate::Result;
use crate::headers::{HEADER_FIELDS, IdentityHeaders};
use crate::message::{GmailId, MessageRecord, Metadata, is_session_flag};

pub use gmail::{Connector, GmailRemote, TlsConnector, discover_folders, Folders};
pub use mailkeep_imap::Uid;
pub use retry::{Reconnect, RetryPolicy};

/// Virtual folders a session can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Folder {
    /// Every message of the account.
    #[default]
    AllMail,
    /// Chat transcripts.
    Chats,
}

/// Which messages a search returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchFilter {
    /// Everything.
    #[default]
    All,
    /// Gmail search syntax, sent as `X-GM-RAW`.
    GmailRaw(String),
    /// Internal date on or after a day.
    Since(NaiveDate),
    /// IMAP search criteria, verbatim.
    Imap(String),
}

impl SearchFilter {
    /// Returns true if the filter may hide messages that exist remotely.
    #[must_use]
    pub const fn is_restrictive(&self) -> bool {
        !matches!(self, Self::All)
    }

    /// IMAP criteria for this filter.
    #[must_use]
    pub fn criteria(&self) -> SearchCriteria {
        match self {
            Self::All => SearchCriteria::All,
            Self::GmailRaw(query) => SearchCriteria::GmailRaw(query.clone()),
            Self::Since(day) => SearchCriteria::Since(day.format("%d-%b-%Y").to_string()),
            Self::Imap(raw) => SearchCriteria::Raw(raw.clone()),
        }
    }
}

/// How much of each message to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFields {
    /// UID and gmail id only.
    GmailId,
    /// Everything but the body.
    Metadata,
    /// Metadata and the full body.
    Full,
}

impl FetchFields {
    /// FETCH attributes for this selection. Bodies are always peeked.
    #[must_use]
    pub fn attributes(self) -> Vec<FetchAttribute> {
        let mut items = vec![FetchAttribute::Uid, FetchAttribute::GmailMsgId];
        if matches!(self, Self::Metadata | Self::Full) {
            items.extend([
                FetchAttribute::GmailThreadId,
                FetchAttribute::GmailLabels,
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Body {
                    section: Some(HEADER_FIELDS.to_string()),
                    peek: true,
                },
            ]);
        }
        if self == Self::Full {
            items.push(FetchAttribute::Body {
                section: None,
                peek: true,
            });
        }
        items
    }
}

/// One message as returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// UID in the selected folder.
    pub uid: Uid,
    /// Gmail message id.
    pub gmail_id: GmailId,
    /// Gmail conversation id.
    pub thread_id: u64,
    /// Labels, decoded.
    pub labels: Vec<String>,
    /// Flags in protocol spelling, without `\Recent`.
    pub flags: Vec<String>,
    /// Internal date, epoch seconds.
    pub internal_date: Option<i64>,
    /// Identity headers.
    pub headers: IdentityHeaders,
    /// Full message, when requested.
    pub body: Option<Vec<u8>>,
}

impl FetchedMessage {
    /// Metadata of this message.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let internal_date = self.internal_date.unwrap_or_else(|| {
            warn!(gmail_id = self.gmail_id, "no internal date, filing under 1970-01");
            0
        });
        Metadata {
            gmail_id: self.gmail_id,
            thread_id: self.thread_id,
            labels: self.labels.clone(),
            flags: self
                .flags
                .iter()
                .filter(|flag| !is_session_flag(flag))
                .cloned()
                .collect(),
            internal_date,
            subject: self.headers.subject.clone(),
            message_id: self.headers.message_id.clone(),
            x_gmail_received: self.headers.x_gmail_received.clone(),
        }
    }

    /// Complete record, if the body was fetched.
    #[must_use]
    pub fn into_record(self) -> Option<MessageRecord> {
        let metadata = self.metadata();
        self.body.map(|body| MessageRecord { metadata, body })
    }
}

/// Parses an IMAP `INTERNALDATE` (`17-Jul-1996 02:44:25 -0700`).
#[must_use]
pub fn parse_internal_date(raw: &str) -> Option<i64> {
    DateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S %z")
        .ok()
        .map(|date| date.timestamp())
}

/// Formats epoch seconds as an IMAP `date-time` in UTC.
#[must_use]
pub fn format_internal_date(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%d-%b-%Y %H:%M:%S %z")
        .to_string()
}

/// The operation set the sync and restore engines need.
///
/// Messages are addressed by UID within the selected folder. Every
/// operation may reconnect internally; [`RemoteStore::reconnections`]
/// counts how often it did.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Reconnect {
    /// Mailbox address the session is authenticated as.
    fn email(&self) -> &str;

    /// Returns true if the account exposes a chats folder.
    fn has_chats(&self) -> bool;

    /// Sessions re-established so far.
    fn reconnections(&self) -> u32;

    /// Switches the selected folder.
    async fn select_folder(&mut self, folder: Folder) -> Result<()>;

    /// UIDs matching `filter` in the selected folder.
    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<Uid>>;

    /// Fetches messages. UIDs the server skips are absent from the result.
    async fn fetch(&mut self, uids: &[Uid], fields: FetchFields) -> Result<Vec<FetchedMessage>>;

    /// Appends a message and returns its new UID in `folder`.
    ///
    /// A server refusal of the message itself is
    /// [`crate::Error::PushRejected`]; a success without APPENDUID is
    /// [`crate::Error::MissingAppendUid`].
    async fn append(
        &mut self,
        folder: Folder,
        body: &[u8],
        flags: &[String],
        internal_date: i64,
    ) -> Result<Uid>;

    /// Creates a label and its missing ancestors.
    async fn create_label(&mut self, name: &str) -> Result<()>;

    /// Deletes a label.
    async fn delete_label(&mut self, name: &str) -> Result<()>;

    /// Replaces the label set of a message in the selected folder.
    async fn set_labels(&mut self, uid: Uid, labels: &[String]) -> Result<()>;
}
