// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded polling of long-running remote jobs.
//!
//! [`poll`] repeatedly invokes a probe and classifies each response into a
//! [`PollStatus`]:
//!
//! - The outer loop runs one round per `interval`, at a fixed rate: the time
//!   a round spends probing does not push later rounds back. The first
//!   probe is made after one interval, never at time zero. A round that
//!   overruns the interval skips the ticks it missed.
//! - The inner loop probes until the job is in progress or completed.
//!   Failed probes are retried immediately until `attempts` consecutive
//!   failures have been seen, at which point polling is exhausted.
//! - An `Err` from the probe or from the classifier aborts polling at once,
//!   whatever budget is left.
//!
//! Cancellation is checked while waiting for the next interval and before
//! every probe.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default wait between two polling rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Shortest period between rounds; `interval_at` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Default number of consecutive failed probes tolerated.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 3;

/// Configuration of one polling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Time between two polling rounds.
    pub interval: Duration,
    /// Consecutive failed probes tolerated within one round (0 = none).
    pub attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval between polling rounds.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the failed-attempt budget.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Classification of one probe response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollStatus {
    /// The job is done; polling stops successfully.
    Completed,
    /// The job is running, with its progress in `[0, 1)`.
    InProgress(f64),
    /// This probe failed; further attempts may still succeed.
    Failed,
}

impl PollStatus {
    /// Classify a numeric progress signal.
    ///
    /// `>= 1` is completed, `[0, 1)` in progress, anything else (negative or
    /// NaN) a failed probe.
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 1.0 {
            Self::Completed
        } else if progress >= 0.0 {
            Self::InProgress(progress)
        } else {
            Self::Failed
        }
    }
}

/// Why polling stopped without completing.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// `attempts` consecutive probes failed.
    #[error("polling failed due to too many failed attempts ({attempts})")]
    Exhausted { attempts: u32 },

    /// The cancellation token fired.
    #[error("polling cancelled")]
    Cancelled,

    /// The probe or the classifier reported an unrecoverable error.
    #[error("{0}")]
    Aborted(E),
}

/// Poll until `classify` reports completion.
///
/// See the module documentation for the exact loop semantics.
pub async fn poll<T, E, P, Fut, C>(
    mut probe: P,
    mut classify: C,
    config: &PollingConfig,
    cancel: &CancellationToken,
) -> Result<(), PollError<E>>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(T) -> Result<PollStatus, E>,
{
    let period = config.interval.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut round = 0u64;
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PollError::Cancelled),

            _ = ticker.tick() => {}
        }
        round += 1;

        let mut failed_attempts = 0u32;
        loop {
            if failed_attempts >= config.attempts {
                debug!(round, attempts = config.attempts, "Polling exhausted");
                return Err(PollError::Exhausted {
                    attempts: config.attempts,
                });
            }
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            let response = probe().await.map_err(PollError::Aborted)?;
            match classify(response).map_err(PollError::Aborted)? {
                PollStatus::Completed => {
                    trace!(round, "Polling completed");
                    return Ok(());
                }
                PollStatus::InProgress(progress) => {
                    trace!(round, progress, "Job in progress");
                    break;
                }
                PollStatus::Failed => {
                    failed_attempts += 1;
                    debug!(round, failed_attempts, "Poll attempt failed");
                }
            }
        }
    }
}
