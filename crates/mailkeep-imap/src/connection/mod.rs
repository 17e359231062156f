//! IMAP connection management.
//!
//! - Configuration (host, port, security, timeouts)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for IMAP protocol
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Authorized, Client, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::{FramedStream, ResponseAccumulator};
pub use stream::{ImapStream, connect, connect_plain, connect_tls, create_tls_connector};
