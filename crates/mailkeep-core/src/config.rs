//! Tunables for sync and restore runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// What happens to local records that disappeared remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Unlink the files.
    #[default]
    Delete,
    /// Move the files under `bin/`.
    Bin,
}

/// Settings with a default for every field.
///
/// Missing keys in a settings file fall back to the defaults, so an empty
/// `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IMAP host.
    pub host: String,
    /// IMAP port, implicit TLS.
    pub port: u16,
    /// UIDs per metadata or gmail-id fetch.
    pub batch_size: usize,
    /// Quick-sync lookback window in days.
    pub quick_days: u32,
    /// Fate of records deleted remotely.
    pub retention: Retention,
    /// Restore checkpoint period, in restored records.
    pub checkpoint_interval: usize,
    /// Attempts per remote operation.
    pub retry_attempts: u32,
    /// Base backoff; attempt `n` sleeps `n` times this.
    pub retry_backoff_secs: u64,
    /// TCP connect plus TLS handshake limit.
    pub connect_timeout_secs: u64,
    /// Limit on any single server response.
    pub command_timeout_secs: u64,
    /// Chat records per bucket directory.
    pub chats_per_bucket: usize,
    /// OAuth client id for the refresh-token grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_id: Option<String>,
    /// OAuth client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            batch_size: 100,
            quick_days: 10,
            retention: Retention::Delete,
            checkpoint_interval: 20,
            retry_attempts: 4,
            retry_backoff_secs: 5,
            connect_timeout_secs: 30,
            command_timeout_secs: 300,
            chats_per_bucket: 2000,
            oauth_client_id: None,
            oauth_client_secret: None,
        }
    }
}

impl Settings {
    /// Parses settings from JSON, defaulting missing keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for these settings.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the IMAP connection configuration.
    #[must_use]
    pub fn imap_config(&self) -> mailkeep_imap::Config {
        mailkeep_imap::Config::builder(self.host.clone())
            .port(self.port)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .command_timeout(Duration::from_secs(self.command_timeout_secs))
            .build()
    }

    /// Base delay between retry attempts.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}
