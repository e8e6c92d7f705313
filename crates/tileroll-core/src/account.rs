// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-account upload orchestration.
//!
//! An [`Account`] selects the files it owns, uploads them as the next
//! generation of its tilesets and reports which live tilesets became stale.
//! Stale tilesets are never deleted during an upload; they are handed back
//! as a [`PendingRetirement`] that the caller retires once the new
//! generation has been published downstream.

use futures::future::{try_join, try_join_all};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::TilingService;
use crate::error::{Error, Result};
use crate::types::{
    AccessToken, AccountAuth, FileNames, GisFile, GisFiles, Tileset, TilesetAccess, Tilesets,
    TokenRequest,
};
use crate::upload::Uploader;
use crate::versioning::VersionPlan;

/// Scopes of the token handed to downstream users.
pub const USER_TOKEN_SCOPES: [&str; 3] = ["styles:tiles", "styles:read", "fonts:read"];

/// URLs the user token is restricted to.
pub const USER_TOKEN_ALLOWED_URLS: [&str; 2] =
    ["https://api.mapbox.com", "https://events.mapbox.com"];

/// Configuration of one tiling service account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub auth: AccountAuth,
    /// Vector files whose tileset name does not match are not uploaded.
    pub groups_regex: String,
    /// Names of the GIS files owned by the account.
    pub files: FileNames,
}

/// Tilesets an account no longer needs once its new generation is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRetirement {
    pub username: String,
    pub tilesets: Vec<Tileset>,
}

impl PendingRetirement {
    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }
}

/// Outcome of uploading the files of one account.
#[derive(Debug, Clone)]
pub struct AccountUpload {
    /// Access to the freshly published tilesets.
    pub access: TilesetAccess,
    /// Stale tilesets, to be retired by the caller.
    pub retirement: PendingRetirement,
    /// Generation of the published tilesets.
    pub version: u32,
}

/// A tiling service account and its user-facing token.
#[derive(Debug)]
pub struct Account {
    auth: AccountAuth,
    groups: Regex,
    files: FileNames,
    user_token: AccessToken,
}

impl Account {
    /// Build an account, reusing its public token or issuing one.
    #[instrument(skip_all, fields(username = %config.auth.username))]
    pub async fn build(config: AccountConfig, service: &dyn TilingService) -> Result<Self> {
        let user_token = match service.find_public_token(&config.auth).await? {
            Some(token) => {
                debug!(token_id = %token.id, "Reusing public token");
                token
            }
            None => {
                info!("No public token found, creating one");
                issue_user_token(service, &config.auth).await?
            }
        };
        Self::new(config, user_token)
    }

    pub fn new(config: AccountConfig, user_token: AccessToken) -> Result<Self> {
        let groups =
            Regex::new(&config.groups_regex).map_err(|source| Error::InvalidGroupsRegex {
                username: config.auth.username.clone(),
                source,
            })?;
        Ok(Self {
            auth: config.auth,
            groups,
            files: config.files,
            user_token,
        })
    }

    pub fn username(&self) -> &str {
        &self.auth.username
    }

    pub fn auth(&self) -> &AccountAuth {
        &self.auth
    }

    pub fn user_token(&self) -> &AccessToken {
        &self.user_token
    }

    /// The files of `available` owned by this account.
    ///
    /// Every owned name must resolve to at least one file of its kind. All
    /// files sharing a name are selected. Vector files are then narrowed to
    /// those whose tileset name matches the groups regex.
    pub fn select_files(&self, available: &GisFiles) -> Result<GisFiles> {
        let raster = self.resolve(&self.files.raster, &available.raster)?;
        let vector = self
            .resolve(&self.files.vector, &available.vector)?
            .into_iter()
            .filter(|file| self.groups.is_match(&file.tileset_name()))
            .collect();
        Ok(GisFiles { raster, vector })
    }

    fn resolve(&self, names: &[String], available: &[GisFile]) -> Result<Vec<GisFile>> {
        let mut selected = Vec::new();
        for name in names {
            let before = selected.len();
            selected.extend(available.iter().filter(|f| &f.name == name).cloned());
            if selected.len() == before {
                return Err(Error::FileNotFound {
                    file: name.clone(),
                    username: self.auth.username.clone(),
                });
            }
        }
        Ok(selected)
    }

    /// Upload the owned files of `available` as the next generation.
    ///
    /// Raster and vector files are uploaded concurrently. The first failing
    /// upload fails the whole account and drops the uploads still running.
    #[instrument(skip_all, fields(username = %self.auth.username))]
    pub async fn upload(
        &self,
        available: &GisFiles,
        uploader: &Uploader,
        cancel: &CancellationToken,
    ) -> Result<AccountUpload> {
        let selected = self.select_files(available)?;
        info!(
            raster = ?names(&selected.raster),
            vector = ?names(&selected.vector),
            "Files to upload"
        );

        info!("Fetching uploaded tilesets");
        let live = uploader.service().list_tilesets(&self.auth).await?;
        let plan = VersionPlan::from_live(&live);
        debug!(
            current = plan.current,
            next = plan.next,
            retire_at_or_below = plan.retire_at_or_below,
            "Planned next generation"
        );

        let raster = try_join_all(
            selected
                .raster
                .iter()
                .map(|file| uploader.upload(&self.auth, file, plan.next, cancel)),
        );
        let vector = try_join_all(
            selected
                .vector
                .iter()
                .map(|file| uploader.upload(&self.auth, file, plan.next, cancel)),
        );
        let (raster, vector) = try_join(raster, vector).await?;
        let tilesets = Tilesets { raster, vector };

        let stale: Vec<Tileset> = plan
            .stale(&live)
            .filter(|t| !tilesets.contains_id(&t.id))
            .cloned()
            .collect();
        debug!(stale = stale.len(), "Computed pending retirement");

        Ok(AccountUpload {
            access: self.access(tilesets),
            retirement: PendingRetirement {
                username: self.auth.username.clone(),
                tilesets: stale,
            },
            version: plan.next,
        })
    }

    /// Delete `tilesets` one after the other.
    ///
    /// Every tileset is attempted; failures are reported together.
    #[instrument(skip_all, fields(username = %self.auth.username, count = tilesets.len()))]
    pub async fn retire(&self, service: &dyn TilingService, tilesets: &[Tileset]) -> Result<()> {
        if tilesets.is_empty() {
            debug!("No stale tilesets");
            return Ok(());
        }
        info!("Removing old tilesets");

        let mut failures = Vec::new();
        for tileset in tilesets {
            match service.delete_tileset(&self.auth, &tileset.id).await {
                Ok(()) => debug!(id = %tileset.id, "Tileset retired"),
                Err(e) => {
                    warn!(id = %tileset.id, error = %e, "Failed to retire tileset");
                    failures.push(format!("{}: {}", tileset.id, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::RetirementFailed { failures })
        }
    }

    /// Revoke the user token and issue a new one.
    #[instrument(skip_all, fields(username = %self.auth.username))]
    pub async fn rotate_user_token(&mut self, service: &dyn TilingService) -> Result<()> {
        service.revoke_token(&self.auth, &self.user_token.id).await?;
        self.user_token = issue_user_token(service, &self.auth).await?;
        info!(token_id = %self.user_token.id, "User token rotated");
        Ok(())
    }

    /// What downstream users need to read `tilesets`.
    pub fn access(&self, tilesets: Tilesets) -> TilesetAccess {
        TilesetAccess {
            username: self.auth.username.clone(),
            token: self.user_token.token.clone(),
            tilesets,
        }
    }
}

fn names(files: &[GisFile]) -> Vec<&str> {
    files.iter().map(|f| f.name.as_str()).collect()
}

/// The token request every user token is issued with.
pub fn user_token_request(username: &str) -> TokenRequest {
    TokenRequest {
        note: format!("Public token for {username}"),
        scopes: USER_TOKEN_SCOPES.iter().map(|s| s.to_string()).collect(),
        allowed_urls: USER_TOKEN_ALLOWED_URLS.iter().map(|s| s.to_string()).collect(),
    }
}

async fn issue_user_token(service: &dyn TilingService, auth: &AccountAuth) -> Result<AccessToken> {
    let request = user_token_request(&auth.username);
    let token = service.issue_token(auth, &request).await?;
    verify_user_token(&token, &request, &auth.username)?;
    Ok(token)
}

/// A freshly issued token must carry exactly the requested permissions.
fn verify_user_token(token: &AccessToken, request: &TokenRequest, username: &str) -> Result<()> {
    if token.scopes != request.scopes {
        return Err(Error::InvalidToken {
            username: username.to_string(),
            reason: format!("unexpected scopes {:?}", token.scopes),
        });
    }
    if token.allowed_urls != request.allowed_urls {
        return Err(Error::InvalidToken {
            username: username.to_string(),
            reason: format!("unexpected allowed URLs {:?}", token.allowed_urls),
        });
    }
    Ok(())
}
