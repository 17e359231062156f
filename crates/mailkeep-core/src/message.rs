//! Archived message model.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Gmail's account-wide message id (`X-GM-MSGID`). Primary key of the archive.
pub type GmailId = u64;

/// Year-month partition of the archive, `YYYY-MM`.
///
/// The textual form orders chronologically, so comparisons need no parsing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shard(String);

impl Shard {
    /// Shard of a UTC timestamp.
    #[must_use]
    pub fn from_date(date: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", date.year(), date.month()))
    }

    /// Shard of an epoch-seconds internal date.
    #[must_use]
    pub fn from_timestamp(secs: i64) -> Self {
        Self::from_date(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Parses a `YYYY-MM` string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        let valid = s.len() == 7
            && s.as_bytes()[4] == b'-'
            && s[..4].bytes().all(|b| b.is_ascii_digit())
            && s[5..]
                .parse::<u32>()
                .is_ok_and(|month| (1..=12).contains(&month));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::Config(format!("invalid shard {s:?}, expected YYYY-MM")))
        }
    }

    /// Returns the shard name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `.meta` half of an archived message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Gmail message id.
    #[serde(rename = "gm_id")]
    pub gmail_id: GmailId,
    /// Gmail conversation id.
    #[serde(rename = "thread_ids", default)]
    pub thread_id: u64,
    /// Labels, decoded.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Flags in protocol spelling.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Server receipt time, epoch seconds.
    #[serde(default)]
    pub internal_date: i64,
    /// `Subject` header.
    #[serde(default)]
    pub subject: Option<String>,
    /// `Message-ID` header.
    #[serde(rename = "msg_id", default)]
    pub message_id: Option<String>,
    /// `X-Gmail-Received` header.
    #[serde(default)]
    pub x_gmail_received: Option<String>,
}

impl Metadata {
    /// Shard implied by the internal date.
    #[must_use]
    pub fn shard(&self) -> Shard {
        Shard::from_timestamp(self.internal_date)
    }

    /// Internal date as a timestamp.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.internal_date, 0)
    }

    /// Labels as a set.
    #[must_use]
    pub fn label_set(&self) -> BTreeSet<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    /// Stored flags as a set, without session-scoped ones.
    #[must_use]
    pub fn flag_set(&self) -> BTreeSet<&str> {
        self.flags
            .iter()
            .map(String::as_str)
            .filter(|flag| !is_session_flag(flag))
            .collect()
    }

    /// Returns true if labels or flags differ from `other`.
    ///
    /// Both sets are compared whole, in both directions.
    #[must_use]
    pub fn needs_update(&self, other: &Self) -> bool {
        self.label_set() != other.label_set() || self.flag_set() != other.flag_set()
    }

    /// Adds a label unless already present.
    pub fn add_label(&mut self, label: &str) {
        if !self.labels.iter().any(|l| l == label) {
            self.labels.push(label.to_string());
        }
    }
}

/// `\Recent` belongs to a session, not to the message.
#[must_use]
pub fn is_session_flag(flag: &str) -> bool {
    flag.eq_ignore_ascii_case("\\Recent")
}

/// A complete archived message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Metadata.
    pub metadata: Metadata,
    /// Raw RFC 5322 bytes.
    pub body: Vec<u8>,
}

impl MessageRecord {
    /// Gmail message id.
    #[must_use]
    pub const fn gmail_id(&self) -> GmailId {
        self.metadata.gmail_id
    }
}
