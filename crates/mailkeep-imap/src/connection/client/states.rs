//! Type-state markers for IMAP client connection states.

use crate::types::MailboxStatus;

/// Marker type for the not-authenticated state.
///
/// Only LOGIN and AUTHENTICATE are valid here.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State for a selected mailbox.
///
/// Carries the SELECT snapshot alongside the type-state.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the mailbox status snapshot from SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which mailbox-level commands (LIST, CREATE, APPEND, SELECT)
/// are valid.
pub trait Authorized: sealed::Sealed {}

impl Authorized for Authenticated {}
impl Authorized for Selected {}

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

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        _assert_send::<NotAuthenticated>();
        _assert_sync::<NotAuthenticated>();
        _assert_send::<Authenticated>();
        _assert_sync::<Authenticated>();
        _assert_send::<Selected>();
        _assert_sync::<Selected>();
    }

    #[test]
    fn test_selected_accessors() {
        let selected = Selected {
            mailbox: "[Gmail]/All Mail".to_string(),
            status: MailboxStatus {
                exists: 12,
                ..MailboxStatus::default()
            },
        };
        assert_eq!(selected.mailbox(), "[Gmail]/All Mail");
        assert_eq!(selected.status().exists, 12);
    }
}
