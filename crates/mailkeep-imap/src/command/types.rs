//! Command argument types.

use crate::types::Flag;

/// FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// UID.
    Uid,
    /// FLAGS.
    Flags,
    /// INTERNALDATE.
    InternalDate,
    /// RFC822.SIZE.
    Rfc822Size,
    /// `BODY[section]` or `BODY.PEEK[section]`.
    Body {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Leave `\Seen` untouched.
        peek: bool,
    },
    /// `X-GM-MSGID`.
    GmailMsgId,
    /// `X-GM-THRID`.
    GmailThreadId,
    /// `X-GM-LABELS`.
    GmailLabels,
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Internal date on or after the given `dd-Mon-yyyy` date.
    Since(String),
    /// Internal date before the given `dd-Mon-yyyy` date.
    Before(String),
    /// Gmail search syntax via `X-GM-RAW`.
    GmailRaw(String),
    /// Criteria passed through verbatim.
    Raw(String),
    /// All of the given criteria.
    And(Vec<Self>),
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
    /// Replace Gmail labels.
    SetLabels(Vec<String>),
    /// Add Gmail labels.
    AddLabels(Vec<String>),
    /// Remove Gmail labels.
    RemoveLabels(Vec<String>),
}
