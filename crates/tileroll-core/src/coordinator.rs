// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fan-out of uploads, retirements and token rotations over all accounts.
//!
//! Uploads run concurrently per account and are collected in full: a
//! failing account never interrupts the others, and every failure is
//! reported in the [`BatchUpload`]. Token rotation runs one account at a
//! time to avoid bursts on the token endpoint.

use futures::future::{join_all, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::account::{Account, AccountConfig, AccountUpload, PendingRetirement};
use crate::error::{Error, Result};
use crate::types::{GisFiles, TilesetAccess};
use crate::upload::Uploader;

/// An account whose upload failed.
#[derive(Debug)]
pub struct AccountFailure {
    pub username: String,
    pub error: Error,
}

/// Result of uploading to every account.
#[derive(Debug, Default)]
pub struct BatchUpload {
    pub uploads: Vec<AccountUpload>,
    pub failures: Vec<AccountFailure>,
}

impl BatchUpload {
    /// Accesses to the new tilesets of every successful account.
    pub fn accesses(&self) -> Vec<TilesetAccess> {
        self.uploads.iter().map(|u| u.access.clone()).collect()
    }

    /// Pending retirements of every successful account, merged.
    pub fn retirement(&self) -> RetirementPlan {
        RetirementPlan {
            pending: self.uploads.iter().map(|u| u.retirement.clone()).collect(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail with every account failure if any account failed.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(Error::AccountsFailed {
            failures: self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.username, f.error))
                .collect(),
        })
    }
}

/// Stale tilesets of several accounts, retired in one go.
///
/// Only retire once the new generation has been published downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "stale tilesets are only removed by Coordinator::retire"]
pub struct RetirementPlan {
    pub pending: Vec<PendingRetirement>,
}

impl RetirementPlan {
    /// Total number of tilesets to retire.
    pub fn len(&self) -> usize {
        self.pending.iter().map(|p| p.tilesets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives every configured account.
pub struct Coordinator {
    accounts: Vec<Account>,
    uploader: Uploader,
}

impl Coordinator {
    /// Build all accounts concurrently, failing on the first failure.
    #[instrument(skip_all, fields(accounts = configs.len()))]
    pub async fn build(configs: Vec<AccountConfig>, uploader: Uploader) -> Result<Self> {
        let service = uploader.service();
        let accounts =
            try_join_all(configs.into_iter().map(|c| Account::build(c, service))).await?;
        Ok(Self::new(accounts, uploader))
    }

    pub fn new(accounts: Vec<Account>, uploader: Uploader) -> Self {
        Self { accounts, uploader }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Upload the owned files of `available` to every account.
    ///
    /// Waits for every account before returning. Nothing is retired here.
    #[instrument(skip_all, fields(accounts = self.accounts.len()))]
    pub async fn upload(&self, available: &GisFiles, cancel: &CancellationToken) -> BatchUpload {
        let results = join_all(
            self.accounts
                .iter()
                .map(|account| account.upload(available, &self.uploader, cancel)),
        )
        .await;

        let mut batch = BatchUpload::default();
        for (account, result) in self.accounts.iter().zip(results) {
            match result {
                Ok(upload) => {
                    info!(
                        username = %account.username(),
                        version = upload.version,
                        "Account upload complete"
                    );
                    batch.uploads.push(upload);
                }
                Err(e) => {
                    error!(username = %account.username(), error = %e, "Account upload failed");
                    batch.failures.push(AccountFailure {
                        username: account.username().to_string(),
                        error: e,
                    });
                }
            }
        }
        batch
    }

    /// Retire every pending tileset, accounts concurrently.
    ///
    /// Best effort: all accounts are attempted and their failures reported
    /// together.
    #[instrument(skip_all, fields(tilesets = plan.len()))]
    pub async fn retire(&self, plan: RetirementPlan) -> Result<()> {
        let service = self.uploader.service();
        let results = join_all(plan.pending.iter().map(|pending| async move {
            match self.account(&pending.username) {
                Some(account) => account.retire(service, &pending.tilesets).await,
                None => Err(Error::Service(format!(
                    "unknown Mapbox account '{}'",
                    pending.username
                ))),
            }
        }))
        .await;

        let mut failures = Vec::new();
        for (pending, result) in plan.pending.iter().zip(results) {
            match result {
                Ok(()) => {}
                Err(Error::RetirementFailed { failures: inner }) => failures.extend(inner),
                Err(e) => failures.push(format!("{}: {}", pending.username, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::RetirementFailed { failures })
        }
    }

    /// Rotate the user token of every account, one account at a time.
    ///
    /// Stops at the first failure.
    #[instrument(skip_all, fields(accounts = self.accounts.len()))]
    pub async fn rotate_user_tokens(&mut self) -> Result<()> {
        let service = self.uploader.service();
        for account in &mut self.accounts {
            account.rotate_user_token(service).await?;
        }
        Ok(())
    }

    fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username() == username)
    }
}
