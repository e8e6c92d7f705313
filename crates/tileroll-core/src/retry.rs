// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded retry of idempotent calls answering with a status code.
//!
//! Only [`TRANSIENT_STATUS`] is retried, after a fixed delay. Any other
//! non-success status fails at once.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::backend::PermissionsStore;
use crate::error::{Error, Result};
use crate::types::AccessGrants;

/// Service temporarily unavailable.
pub const TRANSIENT_STATUS: u16 = 503;

/// Retry budget of a transient-failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first call (0 = no retries, just one attempt).
    pub max_retries: u32,
    /// Delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            delay_ms,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay_ms: 10_000,
        }
    }
}

/// Classification of one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Transient,
    Fatal,
}

impl CallOutcome {
    pub fn classify(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            TRANSIENT_STATUS => Self::Transient,
            _ => Self::Fatal,
        }
    }
}

/// Invoke `call` until it succeeds, fails fatally or the budget runs out.
///
/// Exhausting the budget fails like a fatal status, with the last status
/// code. Errors returned by `call` itself are not retried.
pub async fn retry_transient<F, Fut>(
    mut call: F,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<u16>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u16>>,
{
    let mut retries = 0u32;
    loop {
        let status = call().await?;
        match CallOutcome::classify(status) {
            CallOutcome::Success => return Ok(status),
            CallOutcome::Fatal => return Err(Error::Publish { status }),
            CallOutcome::Transient if retries >= config.max_retries => {
                warn!(status, retries, "Retry budget exhausted");
                return Err(Error::Publish { status });
            }
            CallOutcome::Transient => {
                retries += 1;
                warn!(
                    status,
                    retry = retries,
                    max_retries = config.max_retries,
                    delay_ms = config.delay_ms,
                    "Service unavailable, retrying"
                );
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => return Err(Error::Cancelled),

                    _ = tokio::time::sleep(config.delay()) => {}
                }
            }
        }
    }
}

/// Publish `grants`, retrying while the store is temporarily unavailable.
#[instrument(skip_all, fields(
    roles = grants.roles.len(),
    permissions = grants.permissions.len(),
    accesses = grants.accesses.len()
))]
pub async fn publish_with_retry(
    store: &dyn PermissionsStore,
    grants: &AccessGrants,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let status = retry_transient(|| store.publish(grants), config, cancel).await?;
    debug!(status, "Grants published");
    Ok(())
}
