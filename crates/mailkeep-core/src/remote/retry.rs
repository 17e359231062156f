//! Retry with reconnect for remote operations.

use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::config::Settings;

/// Something that can drop its session and open a new one.
#[allow(async_fn_in_trait)]
pub trait Reconnect {
    /// Re-establishes the session, authenticating again.
    async fn reconnect(&mut self) -> Result<()>;
}

/// Bounded retry with linear backoff.
///
/// Transient failures sleep, reconnect and try again. Authentication
/// failures and ordinary server refusals return at once. The error of the
/// last attempt is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` counts the first try.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy configured by `settings`.
    #[must_use]
    pub const fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.retry_attempts, settings.retry_backoff())
    }

    /// Attempts allowed per operation.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` against `target` until it succeeds or the policy gives up.
    ///
    /// Attempt `n` that fails transiently is followed by a sleep of `n`
    /// times the backoff and a reconnect.
    pub async fn run<R, T, F>(&self, operation: &str, target: &mut R, mut op: F) -> Result<T>
    where
        R: Reconnect,
        F: AsyncFnMut(&mut R) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(target).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_auth() || !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                warn!(operation, attempt, error = %err, "giving up after repeated failures");
                return Err(err);
            }

            warn!(operation, attempt, error = %err, "transient failure, reconnecting");
            tokio::time::sleep(self.backoff * attempt).await;

            if let Err(reconnect_err) = target.reconnect().await {
                if reconnect_err.is_auth() {
                    return Err(reconnect_err);
                }
                warn!(operation, attempt, error = %reconnect_err, "reconnect failed");
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
