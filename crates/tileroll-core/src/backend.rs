// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator traits implemented by the HTTP clients.
//!
//! The engine never talks to the network itself. It drives three
//! collaborators:
//! - [`TilingService`]: tileset listing, processing jobs, deletion and tokens
//! - [`ObjectStore`]: puts a local file into the staging bucket
//! - [`PermissionsStore`]: publishes roles and tileset accesses downstream

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AccessGrants, AccessToken, AccountAuth, JobStatus, StagingTarget, TokenRequest, Tileset,
};

/// Hosted tiling service holding the tilesets of every account.
#[async_trait]
pub trait TilingService: Send + Sync {
    /// List the tilesets currently live in the account.
    async fn list_tilesets(&self, auth: &AccountAuth) -> Result<Vec<Tileset>>;

    /// Obtain a fresh staging location (and credentials) for one upload.
    async fn stage(&self, auth: &AccountAuth) -> Result<StagingTarget>;

    /// Start server-side processing of a staged object into `tileset`.
    ///
    /// Returns the identifier of the processing job.
    async fn create_job(
        &self,
        auth: &AccountAuth,
        tileset: &Tileset,
        source_url: &str,
    ) -> Result<String>;

    /// Observe a processing job once.
    async fn job_status(&self, auth: &AccountAuth, job_id: &str) -> Result<JobStatus>;

    /// Delete a single tileset.
    async fn delete_tileset(&self, auth: &AccountAuth, tileset_id: &str) -> Result<()>;

    /// Find an existing non-default public token of the account.
    async fn find_public_token(&self, auth: &AccountAuth) -> Result<Option<AccessToken>>;

    /// Issue a new token.
    async fn issue_token(&self, auth: &AccountAuth, request: &TokenRequest)
    -> Result<AccessToken>;

    /// Revoke a token by its identifier.
    async fn revoke_token(&self, auth: &AccountAuth, token_id: &str) -> Result<()>;
}

/// Object storage receiving source files before processing.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Put the file at `path` into `target`.
    async fn put_object(&self, path: &Path, target: &StagingTarget) -> Result<()>;
}

/// Store of roles, permissions and tileset accesses.
#[async_trait]
pub trait PermissionsStore: Send + Sync {
    /// Publish the grants and return the HTTP status code of the answer.
    ///
    /// Transport failures are errors; any status code is returned as is so
    /// that callers can tell transient from fatal answers.
    async fn publish(&self, grants: &AccessGrants) -> Result<u16>;
}
