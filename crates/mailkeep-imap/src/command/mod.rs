//! IMAP command builder.
//!
//! Covers the commands a mailbox backup needs, plus the Gmail
//! `X-GM-LABELS` STORE and `X-GM-RAW` SEARCH forms.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, UidSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria, StoreAction};

use serialize::{
    write_astring, write_fetch_items, write_list, write_mailbox, write_quoted,
    write_search_criteria, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (SASL-IR).
        initial_response: Option<String>,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// APPEND command line. The message follows as a synchronizing literal.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set.
        flags: Vec<Flag>,
        /// INTERNALDATE, `dd-Mon-yyyy hh:mm:ss +zzzz`.
        internal_date: Option<String>,
        /// Literal size in bytes.
        size: usize,
    },

    // Selected
    /// UID SEARCH command.
    UidSearch {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID FETCH command.
    UidFetch {
        /// UIDs to fetch.
        uids: UidSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
    },
    /// UID STORE command.
    UidStore {
        /// UIDs to modify.
        uids: UidSet,
        /// Store action.
        action: StoreAction,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
}

impl Command {
    /// Serializes the command to bytes with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Create { mailbox } => {
                buf.extend_from_slice(b"CREATE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Delete { mailbox } => {
                buf.extend_from_slice(b"DELETE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }

            Self::Append {
                mailbox,
                flags,
                internal_date,
                size,
            } => {
                buf.extend_from_slice(b"APPEND ");
                write_mailbox(&mut buf, mailbox);
                if !flags.is_empty() {
                    buf.push(b' ');
                    write_list(&mut buf, flags, |buf, flag| {
                        buf.extend_from_slice(flag.as_str().as_bytes());
                    });
                }
                if let Some(date) = internal_date {
                    buf.push(b' ');
                    write_quoted(&mut buf, date);
                }
                buf.extend_from_slice(format!(" {{{size}}}").as_bytes());
            }

            Self::UidSearch { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::UidFetch { uids, items } => {
                buf.extend_from_slice(b"UID FETCH ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }

            Self::UidStore {
                uids,
                action,
                silent,
            } => {
                buf.extend_from_slice(b"UID STORE ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_store_action(&mut buf, action, *silent);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command with credentials masked, for logging.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Login { username, .. } => format!("LOGIN {username} ****"),
            Self::Authenticate { mechanism, .. } => format!("AUTHENTICATE {mechanism} ****"),
            other => String::from_utf8_lossy(&other.serialize("*"))
                .trim_start_matches("* ")
                .trim_end()
                .to_string(),
        }
    }
}
