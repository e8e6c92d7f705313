// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Splitting of vector files by feature properties.
//!
//! A vector file holds one GeoJSON feature per line. Grouping writes one
//! `FeatureCollection` per distinct combination of the property values,
//! named `<name>_<value 1>_<value 2>….geojson`, so that each group becomes
//! a tileset of its own.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};

use tileroll_core::GisFile;

/// A vector file that cannot be grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedFile {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for MalformedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}): {}", self.name, self.path.display(), self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    #[error("Failed to group '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Malformed files:\n{}\nDo the features have the properties {properties:?}?",
        list(.files)
    )]
    Malformed {
        files: Vec<MalformedFile>,
        properties: Vec<String>,
    },
}

fn list(files: &[MalformedFile]) -> String {
    files.iter().map(|f| format!("  {f}\n")).collect()
}

enum FileError {
    Io(PathBuf, std::io::Error),
    Malformed(MalformedFile),
}

/// Group the features of every file in `files` by `properties`.
///
/// Returns the generated files, each carrying the name of its source file.
/// Without properties the files are returned as they are.
#[instrument(skip_all, fields(files = files.len(), properties = ?properties))]
pub async fn group_vector_files(
    files: &[GisFile],
    out_dir: &Path,
    properties: &[String],
) -> Result<Vec<GisFile>, GroupingError> {
    if properties.is_empty() {
        debug!("No grouping properties, keeping the vector files as they are");
        return Ok(files.to_vec());
    }
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|source| GroupingError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

    let results = join_all(
        files
            .iter()
            .map(|file| group_file(file, out_dir, properties)),
    )
    .await;

    let mut grouped = Vec::new();
    let mut malformed = Vec::new();
    for result in results {
        match result {
            Ok(files) => grouped.extend(files),
            Err(FileError::Malformed(file)) => malformed.push(file),
            Err(FileError::Io(path, source)) => return Err(GroupingError::Io { path, source }),
        }
    }
    if !malformed.is_empty() {
        return Err(GroupingError::Malformed {
            files: malformed,
            properties: properties.to_vec(),
        });
    }

    info!(
        sources = files.len(),
        groups = grouped.len(),
        "Vector files grouped"
    );
    Ok(grouped)
}

async fn group_file(
    file: &GisFile,
    out_dir: &Path,
    properties: &[String],
) -> Result<Vec<GisFile>, FileError> {
    let io = |e| FileError::Io(file.path.clone(), e);
    let malformed = |reason: String| {
        FileError::Malformed(MalformedFile {
            name: file.name.clone(),
            path: file.path.clone(),
            reason,
        })
    };

    let source = tokio::fs::File::open(&file.path).await.map_err(io)?;
    let mut lines = BufReader::new(source).lines();
    let mut groups: BTreeMap<Vec<String>, Vec<Value>> = BTreeMap::new();
    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await.map_err(io)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let feature: Value = serde_json::from_str(&line)
            .map_err(|e| malformed(format!("line {line_number} is not JSON: {e}")))?;
        let key = group_key(&feature, properties).ok_or_else(|| {
            malformed(format!(
                "the feature on line {line_number} misses a grouping property"
            ))
        })?;
        groups.entry(key).or_default().push(feature);
    }

    let mut generated = Vec::with_capacity(groups.len());
    for (values, features) in groups {
        let path = out_dir.join(group_file_name(&file.name, &values));
        let collection = json!({
            "type": "FeatureCollection",
            "features": features,
        });
        let bytes = serde_json::to_vec(&collection)
            .map_err(|e| malformed(format!("features cannot be serialized: {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| FileError::Io(path.clone(), e))?;
        debug!(path = %path.display(), "Group written");
        generated.push(GisFile::new(&file.name, path));
    }
    Ok(generated)
}

/// Values of `properties` in `feature`, or `None` if one is missing.
fn group_key(feature: &Value, properties: &[String]) -> Option<Vec<String>> {
    let props = feature.get("properties")?;
    properties
        .iter()
        .map(|p| match props.get(p)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect()
}

fn group_file_name(name: &str, values: &[String]) -> String {
    let mut file_name = name.to_string();
    for value in values {
        file_name.push('_');
        file_name.extend(value.chars().map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        }));
    }
    file_name.push_str(".geojson");
    file_name
}
