//! Command serialization helpers.

use crate::types::Mailbox;

use super::types::{FetchAttribute, SearchCriteria, StoreAction};

/// Writes an astring (atom or quoted string).
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s);
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes a quoted string unconditionally.
pub fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Writes a mailbox name.
pub fn write_mailbox(buf: &mut Vec<u8>, mailbox: &Mailbox) {
    write_astring(buf, mailbox.as_str());
}

/// Writes a Gmail label. System labels such as `\Inbox` go out as atoms.
pub fn write_label(buf: &mut Vec<u8>, label: &str) {
    let system = label
        .strip_prefix('\\')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()));
    if system {
        buf.extend_from_slice(label.as_bytes());
    } else {
        write_astring(buf, label);
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

/// Writes a space-separated list inside parentheses.
pub fn write_list<T>(buf: &mut Vec<u8>, items: &[T], mut write: impl FnMut(&mut Vec<u8>, &T)) {
    buf.push(b'(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write(buf, item);
    }
    buf.push(b')');
}

/// Writes FETCH attributes.
pub fn write_fetch_items(buf: &mut Vec<u8>, attrs: &[FetchAttribute]) {
    if let [attr] = attrs {
        write_fetch_attribute(buf, attr);
    } else {
        write_list(buf, attrs, write_fetch_attribute);
    }
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(buf: &mut Vec<u8>, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend_from_slice(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::GmailMsgId => buf.extend_from_slice(b"X-GM-MSGID"),
        FetchAttribute::GmailThreadId => buf.extend_from_slice(b"X-GM-THRID"),
        FetchAttribute::GmailLabels => buf.extend_from_slice(b"X-GM-LABELS"),
        FetchAttribute::Body { section, peek } => {
            if *peek {
                buf.extend_from_slice(b"BODY.PEEK[");
            } else {
                buf.extend_from_slice(b"BODY[");
            }
            if let Some(s) = section {
                buf.extend_from_slice(s.as_bytes());
            }
            buf.push(b']');
        }
    }
}

/// Writes a STORE action.
pub fn write_store_action(buf: &mut Vec<u8>, action: &StoreAction, silent: bool) {
    let prefix: &[u8] = match action {
        StoreAction::SetFlags(_) => b"FLAGS",
        StoreAction::AddFlags(_) => b"+FLAGS",
        StoreAction::RemoveFlags(_) => b"-FLAGS",
        StoreAction::SetLabels(_) => b"X-GM-LABELS",
        StoreAction::AddLabels(_) => b"+X-GM-LABELS",
        StoreAction::RemoveLabels(_) => b"-X-GM-LABELS",
    };
    buf.extend_from_slice(prefix);
    if silent {
        buf.extend_from_slice(b".SILENT");
    }
    buf.push(b' ');

    match action {
        StoreAction::SetFlags(flags)
        | StoreAction::AddFlags(flags)
        | StoreAction::RemoveFlags(flags) => {
            write_list(buf, flags, |buf, flag| buf.extend_from_slice(flag.as_str().as_bytes()));
        }
        StoreAction::SetLabels(labels)
        | StoreAction::AddLabels(labels)
        | StoreAction::RemoveLabels(labels) => {
            write_list(buf, labels, |buf, label| write_label(buf, label));
        }
    }
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Since(date) => {
            buf.extend_from_slice(b"SINCE ");
            buf.extend_from_slice(date.as_bytes());
        }
        SearchCriteria::Before(date) => {
            buf.extend_from_slice(b"BEFORE ");
            buf.extend_from_slice(date.as_bytes());
        }
        SearchCriteria::GmailRaw(query) => {
            buf.extend_from_slice(b"X-GM-RAW ");
            write_quoted(buf, query);
        }
        SearchCriteria::Raw(raw) => buf.extend_from_slice(raw.as_bytes()),
        SearchCriteria::And(criteria) => {
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, c);
            }
        }
    }
}
