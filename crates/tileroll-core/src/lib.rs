// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tileroll core - rolls the tilesets of many accounts to a new generation.
//!
//! This crate tracks server-side tileset processing and drives the
//! "publish new, then retire old" lifecycle of versioned tilesets across
//! several tiling service accounts. It talks to the outside world only
//! through the collaborator traits in [`backend`].
//!
//! # Features
//!
//! - **Polling**: bounded tracking of long-running jobs with cancellation
//! - **Versioning**: per-account generations with a one-generation rollback buffer
//! - **Account uploads**: concurrent raster and vector uploads per account
//! - **Coordination**: concurrent accounts, sequential token rotation
//! - **Retry**: bounded retry of transient permissions store failures
//!
//! # Lifecycle
//!
//! Retirement is a separate step that must follow a successful publish of
//! the new accesses:
//!
//! ```ignore
//! use tileroll_core::{Coordinator, RetryConfig, publish_with_retry};
//!
//! let batch = coordinator.upload(&files, &cancel).await;
//! batch.ensure_complete()?;
//!
//! let grants = AccessGrants { roles, permissions, accesses: batch.accesses() };
//! publish_with_retry(store.as_ref(), &grants, &RetryConfig::default(), &cancel).await?;
//!
//! // Only now is it safe to drop the superseded generations.
//! coordinator.retire(batch.retirement()).await?;
//! ```

pub mod account;
pub mod backend;
pub mod coordinator;
mod error;
pub mod polling;
pub mod retry;
pub mod types;
pub mod upload;
pub mod versioning;

pub use account::{Account, AccountConfig, AccountUpload, PendingRetirement};
pub use backend::{ObjectStore, PermissionsStore, TilingService};
pub use coordinator::{AccountFailure, BatchUpload, Coordinator, RetirementPlan};
pub use error::{Error, Result};
pub use polling::{PollError, PollStatus, PollingConfig, poll};
pub use retry::{RetryConfig, publish_with_retry, retry_transient};
pub use types::*;
pub use upload::{UploadSettings, Uploader};
