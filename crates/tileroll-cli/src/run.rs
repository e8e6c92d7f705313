// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! One rollout, from the config to the retirement of superseded tilesets.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::future::{try_join, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use tileroll_clients::{
    AzureCredential, BlobStorageClient, FunctionsClient, HttpClient, MapboxClient, MapboxConfig,
    S3Config, S3ObjectStore, StoreConfig,
};
use tileroll_core::{
    AccessGrants, Coordinator, FileKind, GisFile, GisFiles, RetryConfig, UploadSettings, Uploader,
    publish_with_retry,
};

use crate::cli::Args;
use crate::config::{DeploymentConfig, GisFileConfig, GisFilesConfig};
use crate::grouping::group_vector_files;

/// Directory, below the work directory, receiving the grouped vector files.
pub const GROUPED_VECTOR_DIR: &str = "vector";

/// Tuning of a rollout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSettings {
    pub upload: UploadSettings,
    pub retry: RetryConfig,
}

/// Extension a downloaded file of `kind` is saved with.
pub fn file_extension(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Raster => "geotiff",
        FileKind::Vector => "geojsonl",
    }
}

/// Roll every configured file out to every configured account.
///
/// Superseded tilesets are only retired once the new accesses have been
/// published to the permissions store.
pub async fn run(
    args: &Args,
    settings: &RunSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let config = DeploymentConfig::load(&args.config, args.secrets_context.as_deref())
        .context("Failed to load the deployment config")?;
    debug!(?config, "Config loaded");

    let http = HttpClient::traced().context("Failed to build the HTTP client")?;

    info!("Authenticating for Azure resources...");
    let credential = AzureCredential::new(
        http.clone(),
        &args.tenant_id,
        &args.client_id,
        &args.client_secret,
    )
    .with_authority(&args.authority);
    let (functions, blobs) = try_join(
        FunctionsClient::build(http.clone(), &credential, StoreConfig::new(&args.store_url)),
        BlobStorageClient::build(http.clone(), &credential),
    )
    .await
    .context("Azure authentication failed")?;

    info!("Accessing Mapbox accounts...");
    let mut staging = S3Config::new();
    if let Some(endpoint) = &args.staging_endpoint {
        staging = staging.with_endpoint(endpoint);
    }
    let uploader = Uploader::new(
        Arc::new(MapboxClient::new(
            http,
            MapboxConfig::new().with_base_url(&args.mapbox_url),
        )),
        Arc::new(S3ObjectStore::new(staging)),
    )
    .with_settings(settings.upload);
    let mut coordinator = Coordinator::build(config.account_configs(), uploader)
        .await
        .context("Failed to access the Mapbox accounts")?;

    if config.rotate_mapbox_tokens {
        info!("Rotating Mapbox tokens...");
        if let Err(e) = coordinator.rotate_user_tokens().await {
            error!(error = %e, "Mapbox user access tokens could not be rotated");
        }
    }

    info!("Fetching files...");
    tokio::fs::create_dir_all(&args.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.work_dir.display()))?;
    let mut files = fetch_gis_files(&blobs, &config.gis_files, &args.work_dir)
        .await
        .context("Failed to fetch the GIS files")?;

    info!("Grouping...");
    files.vector = group_vector_files(
        &files.vector,
        &args.work_dir.join(GROUPED_VECTOR_DIR),
        &config.group_by,
    )
    .await?;
    debug!(?files, "Files after grouping");

    info!("Uploading files to Mapbox...");
    let batch = coordinator.upload(&files, cancel).await;
    batch.ensure_complete()?;

    info!("Updating store with new roles and Mapbox access data...");
    let grants = AccessGrants {
        roles: config.roles(),
        permissions: config.permissions(),
        accesses: batch.accesses(),
    };
    publish_with_retry(&functions, &grants, &settings.retry, cancel)
        .await
        .context("Failed to update the permissions store")?;

    info!("Removing superseded tilesets...");
    coordinator
        .retire(batch.retirement())
        .await
        .context("Failed to retire superseded tilesets")?;

    info!("Done!");
    Ok(())
}

/// Download every configured file into `dir`, all concurrently.
pub async fn fetch_gis_files(
    blobs: &BlobStorageClient,
    config: &GisFilesConfig,
    dir: &Path,
) -> tileroll_clients::Result<GisFiles> {
    let fetch = move |kind: FileKind| {
        try_join_all(
            config
                .of_kind(kind)
                .iter()
                .map(move |file| fetch_file(blobs, file, dir, kind)),
        )
    };
    let (raster, vector) = try_join(fetch(FileKind::Raster), fetch(FileKind::Vector)).await?;
    Ok(GisFiles { raster, vector })
}

async fn fetch_file(
    blobs: &BlobStorageClient,
    file: &GisFileConfig,
    dir: &Path,
    kind: FileKind,
) -> tileroll_clients::Result<GisFile> {
    let file_name = format!("{}.{}", file.name, file_extension(kind));
    let path = blobs.download(&file.path, dir, Some(&file_name)).await?;
    Ok(GisFile::new(&file.name, path))
}
