//! Response codes.

use super::{Capability, Flag, Uid, UidValidity};

/// Bracketed response code from a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY list piggybacked on a status response.
    Capability(Vec<Capability>),
    /// PARSE: the server could not parse a message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(UidValidity),
    /// APPENDUID (RFC 4315): UID assigned to an appended message.
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uidvalidity: UidValidity,
        /// UID of the appended message.
        uid: Uid,
    },
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// UNAVAILABLE (RFC 5530): temporary failure.
    Unavailable,
    /// LIMIT (RFC 5530): a server limit was hit.
    Limit,
    /// THROTTLED: Gmail bandwidth limiting.
    Throttled,
    /// ALREADYEXISTS (RFC 5530).
    AlreadyExists,
    /// NONEXISTENT (RFC 5530).
    Nonexistent,
    /// Unknown response code.
    Unknown(String),
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => f.write_str("ALERT"),
            Self::Capability(_) => f.write_str("CAPABILITY"),
            Self::Parse => f.write_str("PARSE"),
            Self::PermanentFlags(_) => f.write_str("PERMANENTFLAGS"),
            Self::ReadOnly => f.write_str("READ-ONLY"),
            Self::ReadWrite => f.write_str("READ-WRITE"),
            Self::TryCreate => f.write_str("TRYCREATE"),
            Self::UidNext(uid) => write!(f, "UIDNEXT {uid}"),
            Self::UidValidity(v) => write!(f, "UIDVALIDITY {}", v.get()),
            Self::AppendUid { uidvalidity, uid } => {
                write!(f, "APPENDUID {} {uid}", uidvalidity.get())
            }
            Self::AuthenticationFailed => f.write_str("AUTHENTICATIONFAILED"),
            Self::Unavailable => f.write_str("UNAVAILABLE"),
            Self::Limit => f.write_str("LIMIT"),
            Self::Throttled => f.write_str("THROTTLED"),
            Self::AlreadyExists => f.write_str("ALREADYEXISTS"),
            Self::Nonexistent => f.write_str("NONEXISTENT"),
            Self::Unknown(s) => f.write_str(s),
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
    fn display_append_uid() {
        let code = ResponseCode::AppendUid {
            uidvalidity: UidValidity::new(11).unwrap(),
            uid: Uid::new(4_051).unwrap(),
        };
        assert_eq!(code.to_string(), "APPENDUID 11 4051");
    }

    #[test]
    fn display_simple_codes() {
        assert_eq!(ResponseCode::AuthenticationFailed.to_string(), "AUTHENTICATIONFAILED");
        assert_eq!(ResponseCode::Unknown("WEBALERT".into()).to_string(), "WEBALERT");
    }
}
