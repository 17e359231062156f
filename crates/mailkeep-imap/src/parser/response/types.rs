//! Parsed response types.

use crate::types::{Capability, Flags, ListResponse, ResponseCode, SeqNum, Uid};

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK status.
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// NO status.
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// BAD status.
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// BYE, the server is closing the connection.
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// CAPABILITY data.
    Capability(Vec<Capability>),
    /// LIST data.
    List(ListResponse),
    /// FLAGS data.
    Flags(Flags),
    /// Number of messages in the selected mailbox.
    Exists(u32),
    /// Number of recent messages.
    Recent(u32),
    /// A message was expunged.
    Expunge(SeqNum),
    /// FETCH data.
    Fetch {
        /// Sequence number.
        seq: SeqNum,
        /// Fetched items.
        items: Vec<FetchItem>,
    },
    /// SEARCH results. UIDs when answering `UID SEARCH`.
    Search(Vec<u32>),
    /// Untagged data this client has no use for, kept as its keyword.
    Other(String),
}

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Flags),
    /// INTERNALDATE, verbatim (`17-Jul-1996 02:44:25 -0700`).
    InternalDate(String),
    /// RFC822.SIZE.
    Rfc822Size(u32),
    /// Message UID.
    Uid(Uid),
    /// A body section. `data` is `None` when the server sent NIL.
    Body {
        /// Section specifier, e.g. `HEADER.FIELDS (SUBJECT)`.
        section: Option<String>,
        /// Partial fetch origin.
        origin: Option<u32>,
        /// Section bytes.
        data: Option<Vec<u8>>,
    },
    /// `X-GM-MSGID`, the account-wide message id.
    GmailMsgId(u64),
    /// `X-GM-THRID`, the conversation id.
    GmailThreadId(u64),
    /// `X-GM-LABELS`, still modified UTF-7 encoded.
    GmailLabels(Vec<String>),
}
