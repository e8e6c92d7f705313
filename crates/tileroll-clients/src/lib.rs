// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tileroll clients
//!
//! HTTP implementations of the collaborators that `tileroll-core` works
//! against:
//! - [`MapboxClient`]: tileset listing, staging, processing jobs and tokens
//! - [`S3ObjectStore`]: uploads to the staging bucket
//! - [`FunctionsClient`]: the permissions store
//!
//! plus [`AzureCredential`] and [`BlobStorageClient`] to fetch the source
//! files.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tileroll_clients::{HttpClient, MapboxClient, MapboxConfig, S3Config, S3ObjectStore};
//! use tileroll_core::Uploader;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = HttpClient::traced()?;
//! let uploader = Uploader::new(
//!     Arc::new(MapboxClient::new(http.clone(), MapboxConfig::new())),
//!     Arc::new(S3ObjectStore::new(S3Config::new())),
//! );
//! # Ok(())
//! # }
//! ```

mod azure;
mod error;
mod http;
mod mapbox;
mod s3;

pub use azure::{
    AzureCredential, BLOB_API_VERSION, BlobStorageClient, DEFAULT_AUTHORITY, FunctionsClient,
    Scope, StoreConfig,
};
pub use error::{ClientError, Result};
pub use http::{HttpClient, HttpObserver, TracingObserver, decode, redact};
pub use mapbox::{DEFAULT_MAPBOX_URL, MapboxClient, MapboxConfig, staged_object_url};
pub use s3::{
    DEFAULT_MULTIPART_THRESHOLD, DEFAULT_PART_SIZE, DEFAULT_REGION, S3Config, S3ObjectStore,
};
