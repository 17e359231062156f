//! # mailkeep-imap
//!
//! An async IMAP4rev1 client shaped around mailbox backup against Gmail.
//!
//! ## Features
//!
//! - **Type-state connection management**: `NotAuthenticated` →
//!   `Authenticated` → `Selected`, checked at compile time
//! - **Gmail extensions**: `X-GM-MSGID`, `X-GM-THRID` and `X-GM-LABELS` in
//!   FETCH and STORE, `X-GM-RAW` in SEARCH
//! - **XOAUTH2** with the Gmail error-challenge dance, plus LOGIN
//! - **APPENDUID** reporting on APPEND
//! - **TLS via rustls** and per-response timeouts
//! - **Sans-I/O parser**: protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailkeep_imap::{Client, Config, FetchAttribute, SearchCriteria, UidSet};
//!
//! #[tokio::main]
//! async fn main() -> mailkeep_imap::Result<()> {
//!     let client = Client::connect(&Config::new("imap.gmail.com")).await?;
//!     let client = client.login("user@gmail.com", "app-password").await?;
//!
//!     let mut client = client.select("[Gmail]/All Mail").await?;
//!     let uids = client
//!         .uid_search(SearchCriteria::GmailRaw("newer_than:2d".into()))
//!         .await?;
//!
//!     if let Some(set) = UidSet::from_uids(&uids) {
//!         let fetched = client
//!             .uid_fetch(&set, vec![FetchAttribute::GmailMsgId, FetchAttribute::GmailLabels])
//!             .await?;
//!         println!("{} messages", fetched.len());
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command builders and serialization
//! - [`connection`]: streams, framing and the type-state client
//! - [`parser`]: sans-I/O response parser
//! - [`types`]: flags, mailboxes, identifiers and response codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Authorized, Client, Config, ConfigBuilder, FramedStream, ImapStream,
    NotAuthenticated, ResponseAccumulator, Security, Selected,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, Status, Tag, Uid, UidSet, UidValidity,
};
