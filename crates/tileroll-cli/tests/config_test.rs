// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Loading and validation of deployment configs.

use serde_json::json;
use tileroll_cli::{ConfigError, DeploymentConfig};

fn config() -> serde_json::Value {
    json!({
        "rotate-mapbox-tokens": true,
        "group-by": ["ConsVAT"],
        "gis-files": {
            "raster": [{"name": "dem", "path": "https://blobs.example.net/gis/dem.tif"}],
            "vector": [{"name": "fields", "path": "https://blobs.example.net/gis/fields.geojsonl"}]
        },
        "mapbox-accounts": [{
            "username": "acme",
            "admin-access-token": "${{ secrets.MAPBOX_ACME }}",
            "groups-regex": "^fields_",
            "gis-files": {"raster": ["dem"], "vector": ["fields"]}
        }],
        "permissions": [{"id": "read", "description": "Read maps"}],
        "roles": [{
            "id": "viewer",
            "description": "Views the maps of acme",
            "users-regex": ".*@acme.com",
            "mapbox-account": "acme",
            "permissions": ["read"]
        }]
    })
}

#[test]
fn test_load_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tileroll.json");
    std::fs::write(&path, config().to_string()).unwrap();

    let config =
        DeploymentConfig::load(&path, Some(r#"{"MAPBOX_ACME": "sk.acme"}"#)).unwrap();

    assert!(config.rotate_mapbox_tokens);
    assert_eq!(config.group_by, vec!["ConsVAT"]);
    assert_eq!(config.mapbox_accounts[0].admin_access_token, "sk.acme");

    let accounts = config.account_configs();
    assert_eq!(accounts[0].auth.username, "acme");
    assert_eq!(accounts[0].auth.admin_token, "sk.acme");
    assert_eq!(accounts[0].files.vector, vec!["fields"]);

    let roles = config.roles();
    assert_eq!(roles[0].mapbox_account, "acme");
    assert_eq!(roles[0].users_regex, ".*@acme.com");
    assert_eq!(config.permissions()[0].id, "read");
}

const YAML_CONFIG: &str = r#"
rotate-mapbox-tokens: false
group-by:
  - ConsVAT
gis-files:
  raster:
    - name: dem
      path: https://blobs.example.net/gis/dem.tif
  vector:
    - name: fields
      path: https://blobs.example.net/gis/fields.geojsonl
mapbox-accounts:
  - username: acme
    admin-access-token: ${{ secrets.MAPBOX_ACME }}
    groups-regex: ^fields_
    gis-files:
      raster: [dem]
      vector: [fields]
permissions:
  - id: read
    description: Read maps
roles:
  - id: viewer
    description: Views the maps of acme
    users-regex: ".*@acme.com"
    mapbox-account: acme
    permissions: [read]
"#;

#[test]
fn test_load_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tileroll.yml");
    std::fs::write(&path, YAML_CONFIG).unwrap();

    let config =
        DeploymentConfig::load(&path, Some(r#"{"MAPBOX_ACME": "sk.acme"}"#)).unwrap();

    assert!(!config.rotate_mapbox_tokens);
    assert_eq!(config.gis_files.raster[0].name, "dem");
    assert_eq!(config.mapbox_accounts[0].admin_access_token, "sk.acme");
    assert_eq!(config.mapbox_accounts[0].groups_regex, "^fields_");
    assert_eq!(config.account_configs()[0].files.raster, vec!["dem"]);
    assert_eq!(config.roles()[0].users_regex, ".*@acme.com");
}

#[test]
fn test_invalid_yaml_is_syntax_error() {
    let result = DeploymentConfig::parse("gis-files: [raster\nmapbox-accounts: {", None);

    assert!(matches!(result, Err(ConfigError::Syntax(_))));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = DeploymentConfig::load(&dir.path().join("absent.json"), None);

    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_defaults_for_optional_sections() {
    let text = json!({
        "gis-files": {"raster": [], "vector": []},
        "mapbox-accounts": []
    })
    .to_string();

    let config = DeploymentConfig::parse(&text, None).unwrap();

    assert!(!config.rotate_mapbox_tokens);
    assert!(config.group_by.is_empty());
    assert!(config.roles.is_empty());
}

#[test]
fn test_placeholder_requires_secrets_context() {
    let result = DeploymentConfig::parse(&config().to_string(), None);

    assert!(matches!(result, Err(ConfigError::MissingSecretsContext)));
}

#[test]
fn test_wrong_shape() {
    let text = json!({"gis-files": {"raster": []}, "mapbox-accounts": "acme"}).to_string();

    let result = DeploymentConfig::parse(&text, None);

    assert!(matches!(result, Err(ConfigError::Shape(_))));
}

#[test]
fn test_validation_reports_every_failure() {
    let mut doc = config();
    doc["mapbox-accounts"][0]["gis-files"]["vector"] = json!(["fields", "roads"]);
    doc["mapbox-accounts"][0]["groups-regex"] = json!("(unclosed");
    doc["roles"][0]["mapbox-account"] = json!("globex");
    doc["roles"][0]["permissions"] = json!(["read", "write"]);

    let err = DeploymentConfig::parse(&doc.to_string(), Some(r#"{"MAPBOX_ACME": "sk"}"#))
        .unwrap_err();

    let ConfigError::Invalid(message) = err else {
        panic!("unexpected error: {err}");
    };
    let lines: Vec<&str> = message.lines().collect();
    assert_eq!(lines.len(), 4, "{message}");
    assert!(lines[0].starts_with("Error 1: ") && lines[0].contains("'roads'"));
    assert!(lines[1].starts_with("Error 2: ") && lines[1].contains("groups regex"));
    assert!(lines[2].starts_with("Error 3: ") && lines[2].contains("'globex'"));
    assert!(lines[3].starts_with("Error 4: ") && lines[3].contains("'write'"));
}

#[test]
fn test_duplicate_accounts_are_rejected() {
    let mut doc = config();
    let account = doc["mapbox-accounts"][0].clone();
    doc["mapbox-accounts"] = json!([account.clone(), account]);

    let err = DeploymentConfig::parse(&doc.to_string(), Some(r#"{"MAPBOX_ACME": "sk"}"#))
        .unwrap_err();

    assert!(err.to_string().contains("defined more than once"));
}
