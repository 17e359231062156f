//! Gmail label names: hierarchy, reserved names and wire encoding.

use utf7_imap::{decode_utf7_imap, encode_utf7_imap};

/// Top-level names owned by the server. They are never created or deleted.
pub const RESERVED_LABELS: &[&str] = &["inbox", "starred", "sent", "draft", "important"];

/// Synthetic label added to archived chat records.
pub const CHATS_LABEL: &str = "mailkeep-chats";

/// Returns true for names that must not be created.
///
/// That covers the reserved names, `\`-prefixed system labels such as
/// `\Inbox`, and the `[Gmail]` special folders.
#[must_use]
pub fn is_reserved(label: &str) -> bool {
    let lower = label.to_lowercase();
    label.starts_with('\\')
        || RESERVED_LABELS.contains(&lower.as_str())
        || lower == "[gmail]"
        || lower == "[google mail]"
        || lower.starts_with("[gmail]/")
        || lower.starts_with("[google mail]/")
}

/// Every ancestor of a slash-delimited label, shortest first, ending with
/// the label itself.
///
/// `a/b/c` yields `a`, `a/b`, `a/b/c`. Empty segments are dropped.
#[must_use]
pub fn hierarchy(label: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in label.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

/// Encodes a label for the wire (IMAP modified UTF-7).
#[must_use]
pub fn encode(label: &str) -> String {
    encode_utf7_imap(label.to_string())
}

/// Decodes a label received from the server.
#[must_use]
pub fn decode(label: &str) -> String {
    decode_utf7_imap(label.to_string())
}
