// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain types shared by the engine and its collaborators.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// GIS files
// ============================================================================

/// Kind of source file, which decides the kind of tileset it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Raster,
    Vector,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raster => "raster",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named source file available on the local file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GisFile {
    /// Logical name that accounts reference.
    pub name: String,
    /// Local path of the file.
    pub path: PathBuf,
}

impl GisFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Unversioned tileset name derived from the file stem.
    pub fn tileset_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Resolved source files, partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GisFiles {
    pub raster: Vec<GisFile>,
    pub vector: Vec<GisFile>,
}

/// Names of the files owned by an account, per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNames {
    #[serde(default)]
    pub raster: Vec<String>,
    #[serde(default)]
    pub vector: Vec<String>,
}

impl FileNames {
    pub fn of_kind(&self, kind: FileKind) -> &[String] {
        match kind {
            FileKind::Raster => &self.raster,
            FileKind::Vector => &self.vector,
        }
    }
}

// ============================================================================
// Tilesets
// ============================================================================

/// A tileset living on the tiling service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tileset {
    pub name: String,
    pub id: String,
}

impl Tileset {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Tilesets partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tilesets {
    pub raster: Vec<Tileset>,
    pub vector: Vec<Tileset>,
}

impl Tilesets {
    pub fn iter(&self) -> impl Iterator<Item = &Tileset> {
        self.raster.iter().chain(self.vector.iter())
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.iter().any(|t| t.id == id)
    }
}

/// What downstream users need to read an account's tilesets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesetAccess {
    pub username: String,
    pub token: String,
    #[serde(flatten)]
    pub tilesets: Tilesets,
}

// ============================================================================
// Accounts and tokens
// ============================================================================

/// Credentials used to act on behalf of an account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountAuth {
    pub username: String,
    pub admin_token: String,
}

impl AccountAuth {
    pub fn new(username: impl Into<String>, admin_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            admin_token: admin_token.into(),
        }
    }
}

impl fmt::Debug for AccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountAuth")
            .field("username", &self.username)
            .field("admin_token", &"<redacted>")
            .finish()
    }
}

/// An access token as reported by the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Identifier of the token, not the token itself.
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub allowed_urls: Vec<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("allowed_urls", &self.allowed_urls)
            .finish()
    }
}

/// Request for a new user-facing token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub note: String,
    pub scopes: Vec<String>,
    pub allowed_urls: Vec<String>,
}

// ============================================================================
// Processing jobs
// ============================================================================

/// Temporary credentials for the staging bucket.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Bucket region, when the issuer names one.
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for StagingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Where a source file must be put before a processing job can read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTarget {
    pub bucket: String,
    pub key: String,
    /// URL the processing job reads the staged object from.
    pub url: String,
    pub credentials: StagingCredentials,
}

/// One observation of a processing job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobStatus {
    /// Progress between `0.0` (started) and `1.0` (completed), if reported.
    #[serde(default)]
    pub progress: Option<f64>,
    /// Explanation of a failed job; `None` while in progress or done.
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Permissions store
// ============================================================================

/// A permission that roles can grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    pub description: String,
}

/// A user role bound to an account and a set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub description: String,
    pub users_regex: String,
    pub mapbox_account: String,
    pub permissions: Vec<String>,
}

/// Everything the permissions store learns about a new tileset generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrants {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    #[serde(rename = "mapboxAccesses")]
    pub accesses: Vec<TilesetAccess>,
}
