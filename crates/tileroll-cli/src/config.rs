// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment config: which files go to which Mapbox account, and the roles
//! and permissions published alongside.
//!
//! The file is YAML with kebab-case keys, so JSON configs load too. String
//! values of the form `${{ secrets.NAME }}` are replaced by the value of
//! `NAME` in the secrets context before the document is deserialized.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use tileroll_core::{AccountAuth, AccountConfig, FileKind, FileNames, Permission, Role};

static SECRET_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\{\{\s*secrets\.(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Errors raised while loading the deployment config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config is not valid YAML: {0}")]
    Syntax(#[source] serde_yaml::Error),

    #[error("Config does not have the expected shape: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("Config references secrets but SECRETS_CONTEXT is not set")]
    MissingSecretsContext,

    #[error("SECRETS_CONTEXT is not a JSON object: {0}")]
    InvalidSecretsContext(String),

    #[error("Secret '{0}' is not defined in SECRETS_CONTEXT")]
    MissingSecret(String),

    /// Every consistency check that failed, numbered.
    #[error("Invalid config:\n{0}")]
    Invalid(String),
}

/// A GIS file and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GisFileConfig {
    pub name: String,
    /// URL of the blob holding the file.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GisFilesConfig {
    #[serde(default)]
    pub raster: Vec<GisFileConfig>,
    #[serde(default)]
    pub vector: Vec<GisFileConfig>,
}

impl GisFilesConfig {
    pub fn of_kind(&self, kind: FileKind) -> &[GisFileConfig] {
        match kind {
            FileKind::Raster => &self.raster,
            FileKind::Vector => &self.vector,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MapboxAccountConfig {
    pub username: String,
    pub admin_access_token: String,
    pub groups_regex: String,
    pub gis_files: FileNames,
}

impl fmt::Debug for MapboxAccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapboxAccountConfig")
            .field("username", &self.username)
            .field("admin_access_token", &"<redacted>")
            .field("groups_regex", &self.groups_regex)
            .field("gis_files", &self.gis_files)
            .finish()
    }
}

impl From<&MapboxAccountConfig> for AccountConfig {
    fn from(config: &MapboxAccountConfig) -> Self {
        AccountConfig {
            auth: AccountAuth::new(&config.username, &config.admin_access_token),
            groups_regex: config.groups_regex.clone(),
            files: config.gis_files.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionConfig {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoleConfig {
    pub id: String,
    pub description: String,
    pub users_regex: String,
    pub mapbox_account: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// The whole deployment config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentConfig {
    #[serde(default)]
    pub rotate_mapbox_tokens: bool,
    /// Feature properties the vector files are split by.
    #[serde(default)]
    pub group_by: Vec<String>,
    pub gis_files: GisFilesConfig,
    pub mapbox_accounts: Vec<MapboxAccountConfig>,
    #[serde(default)]
    pub permissions: Vec<PermissionConfig>,
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
}

impl DeploymentConfig {
    /// Read, interpolate and validate the config at `path`.
    pub fn load(path: &Path, secrets: Option<&str>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, secrets)
    }

    /// Same as [`Self::load`], from the text of the config.
    pub fn parse(text: &str, secrets: Option<&str>) -> Result<Self, ConfigError> {
        let mut document: Value = serde_yaml::from_str(text).map_err(ConfigError::Syntax)?;
        interpolate_secrets(&mut document, secrets)?;
        let config: Self = serde_json::from_value(document).map_err(ConfigError::Shape)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross references of the config, reporting every failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let mut usernames = HashSet::new();
        for account in &self.mapbox_accounts {
            if !usernames.insert(account.username.as_str()) {
                errors.push(format!(
                    "Mapbox account '{}' is defined more than once.",
                    account.username
                ));
            }
            for kind in [FileKind::Raster, FileKind::Vector] {
                let defined: HashSet<&str> = self
                    .gis_files
                    .of_kind(kind)
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect();
                for name in account.gis_files.of_kind(kind) {
                    if !defined.contains(name.as_str()) {
                        errors.push(format!(
                            "Mapbox account '{}' has the {} GIS file '{}', which does not exist.",
                            account.username, kind, name
                        ));
                    }
                }
            }
            if Regex::new(&account.groups_regex).is_err() {
                errors.push(format!(
                    "Mapbox account '{}' has the groups regex '{}', which does not compile.",
                    account.username, account.groups_regex
                ));
            }
        }

        let permissions: HashSet<&str> = self.permissions.iter().map(|p| p.id.as_str()).collect();
        for role in &self.roles {
            if !usernames.contains(role.mapbox_account.as_str()) {
                errors.push(format!(
                    "User role '{}' has the Mapbox account '{}', which does not exist.",
                    role.id, role.mapbox_account
                ));
            }
            for permission in &role.permissions {
                if !permissions.contains(permission.as_str()) {
                    errors.push(format!(
                        "User role '{}' has the permission '{}', which does not exist.",
                        role.id, permission
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(number_errors(&errors)))
        }
    }

    /// Account configs for the engine.
    pub fn account_configs(&self) -> Vec<AccountConfig> {
        self.mapbox_accounts.iter().map(AccountConfig::from).collect()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.roles
            .iter()
            .map(|r| Role {
                id: r.id.clone(),
                description: r.description.clone(),
                users_regex: r.users_regex.clone(),
                mapbox_account: r.mapbox_account.clone(),
                permissions: r.permissions.clone(),
            })
            .collect()
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.permissions
            .iter()
            .map(|p| Permission {
                id: p.id.clone(),
                description: p.description.clone(),
            })
            .collect()
    }
}

/// `Error 1: …\nError 2: …\n`
fn number_errors(errors: &[String]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Error {}: {}\n", i + 1, e))
        .collect()
}

/// Replace every secret placeholder in `document`.
///
/// The secrets context is only parsed when a placeholder exists.
pub fn interpolate_secrets(document: &mut Value, secrets: Option<&str>) -> Result<(), ConfigError> {
    let mut names = Vec::new();
    collect_placeholders(document, &mut names);
    if names.is_empty() {
        return Ok(());
    }

    let secrets = secrets.ok_or(ConfigError::MissingSecretsContext)?;
    let context: Map<String, Value> = serde_json::from_str(secrets)
        .map_err(|e| ConfigError::InvalidSecretsContext(e.to_string()))?;
    if let Some(missing) = names.iter().find(|name| !context.contains_key(name.as_str())) {
        return Err(ConfigError::MissingSecret(missing.clone()));
    }
    replace_placeholders(document, &context);
    Ok(())
}

fn placeholder(value: &str) -> Option<String> {
    SECRET_PLACEHOLDER
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
}

fn collect_placeholders(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => names.extend(placeholder(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, names)),
        _ => {}
    }
}

fn replace_placeholders(value: &mut Value, context: &Map<String, Value>) {
    match value {
        Value::String(s) => {
            if let Some(secret) = placeholder(s).and_then(|name| context.get(&name)) {
                *value = secret.clone();
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|v| replace_placeholders(v, context)),
        Value::Object(map) => map
            .values_mut()
            .for_each(|v| replace_placeholders(v, context)),
        _ => {}
    }
}
