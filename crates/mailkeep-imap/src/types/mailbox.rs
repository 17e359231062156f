//! Mailbox types.

use super::{Uid, UidValidity};

/// Mailbox name as it travels on the wire (modified UTF-7).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox status information from SELECT.
#[derive(Debug, Clone, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

/// LIST response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true unless the mailbox is a `\Noselect` container.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.contains(&MailboxAttribute::NoSelect)
    }
}

/// Mailbox attributes from LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// All messages (Gmail: All Mail).
    All,
    /// Drafts folder.
    Drafts,
    /// Flagged messages (Gmail: Starred).
    Flagged,
    /// Junk folder (Gmail: Spam).
    Junk,
    /// Sent folder.
    Sent,
    /// Trash folder (Gmail: Bin).
    Trash,
    /// Important messages (RFC 8457).
    Important,
    /// Unknown attribute.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\ALL" => Self::All,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            "\\IMPORTANT" => Self::Important,
            _ => Self::Unknown(s.to_string()),
        }
    }
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
    fn attribute_parse() {
        assert_eq!(MailboxAttribute::parse("\\Noselect"), MailboxAttribute::NoSelect);
        assert_eq!(MailboxAttribute::parse("\\All"), MailboxAttribute::All);
        assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
        assert_eq!(
            MailboxAttribute::parse("\\Archive"),
            MailboxAttribute::Unknown("\\Archive".to_string())
        );
    }

    #[test]
    fn gmail_root_is_not_selectable() {
        let root = ListResponse {
            attributes: vec![MailboxAttribute::HasChildren, MailboxAttribute::NoSelect],
            delimiter: Some('/'),
            mailbox: Mailbox::new("[Gmail]"),
        };
        assert!(!root.is_selectable());

        let all = ListResponse {
            attributes: vec![MailboxAttribute::All, MailboxAttribute::HasNoChildren],
            delimiter: Some('/'),
            mailbox: Mailbox::new("[Gmail]/All Mail"),
        };
        assert!(all.is_selectable());
    }
}
