//! # mailkeep-core
//!
//! Backup and restore of a Gmail mailbox into a local archive.
//!
//! This crate provides:
//! - A retrying remote access layer over Gmail IMAP ([`remote`])
//! - The on-disk archive: one metadata file and one body file per message,
//!   sharded by month, optionally compressed and encrypted ([`archive`])
//! - The sync engine, remote to local with deletion reconciliation
//! - The restore engine, local to remote with label recreation and
//!   resumable checkpoints

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod credential;
mod error;
pub mod headers;
pub mod interrupt;
pub mod message;
pub mod remote;
pub mod report;
pub mod restore;
pub mod sync;

pub use archive::{Archive, ArchiveOptions, ArchiveStats, Area, StoreSettings};
pub use config::{Retention, Settings};
pub use credential::{Credential, NoRefresh, TokenRefresher};
pub use error::{Error, Result};
pub use interrupt::StopSignal;
pub use message::{GmailId, MessageRecord, Metadata, Shard};
pub use remote::{
    FetchFields, FetchedMessage, Folder, GmailRemote, Reconnect, RemoteStore, RetryPolicy,
    SearchFilter, TlsConnector,
};
pub use report::{ErrorReport, IdKind, ReportEntry};
pub use restore::{RestoreEngine, RestoreOutcome, RestoreRequest};
pub use sync::{SyncEngine, SyncOutcome, SyncRequest};
