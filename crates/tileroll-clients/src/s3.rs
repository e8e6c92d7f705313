// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Staging bucket uploads through the AWS SDK.
//!
//! Files are streamed from disk and never held in memory as a whole. Files
//! above the multipart threshold are sent in parts read straight from their
//! offsets in the file.

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use aws_smithy_types::byte_stream::{ByteStream, Length};
use tracing::{debug, instrument, warn};

use tileroll_core::{ObjectStore, StagingCredentials, StagingTarget};

use crate::error::{ClientError, Result};

/// Region of the Mapbox staging buckets.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Files larger than this are uploaded in parts.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Size of every part but the last one.
pub const DEFAULT_PART_SIZE: u64 = 16 * 1024 * 1024;

const CREDENTIALS_PROVIDER: &str = "mapbox-staging";

/// Configuration of the staging store.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Region used when the staging credentials name none.
    pub region: String,
    /// Path-style endpoint replacing `https://<bucket>.s3.amazonaws.com`.
    pub endpoint: Option<String>,
    pub multipart_threshold: u64,
    pub part_size: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl S3Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the size above which files are uploaded in parts.
    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    /// Set the part size of multipart uploads (at least one byte).
    pub fn with_part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes.max(1);
        self
    }
}

/// [`ObjectStore`] putting files into S3 buckets.
///
/// Every staging target comes with its own short-lived credentials, so a
/// client is built per upload.
#[derive(Debug, Clone, Default)]
pub struct S3ObjectStore {
    config: S3Config,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> Self {
        Self { config }
    }

    /// Region the upload to `credentials`' bucket is signed for.
    pub fn region_for<'a>(&'a self, credentials: &'a StagingCredentials) -> &'a str {
        credentials
            .region
            .as_deref()
            .filter(|region| !region.is_empty())
            .unwrap_or(self.config.region.as_str())
    }

    fn client(&self, credentials: &StagingCredentials) -> Client {
        let static_credentials = Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            Some(credentials.session_token.clone()),
            None,
            CREDENTIALS_PROVIDER,
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region_for(credentials).to_string()))
            .credentials_provider(static_credentials)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
            if endpoint.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }
        Client::from_conf(builder.build())
    }

    #[instrument(skip_all, fields(bucket = %target.bucket, key = %target.key))]
    async fn put(&self, path: &Path, target: &StagingTarget) -> Result<()> {
        let length = tokio::fs::metadata(path).await?.len();
        let client = self.client(&target.credentials);

        if length > self.config.multipart_threshold {
            return self.put_multipart(&client, path, length, target).await;
        }

        debug!(length, "Uploading to the staging bucket");
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| ClientError::S3(format!("cannot stream {}: {e}", path.display())))?;
        client
            .put_object()
            .bucket(&target.bucket)
            .key(&target.key)
            .body(body)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        client: &Client,
        path: &Path,
        length: u64,
        target: &StagingTarget,
    ) -> Result<()> {
        let created = client
            .create_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .send()
            .await
            .map_err(s3_error)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| ClientError::S3("multipart upload started without an id".into()))?
            .to_string();

        debug!(length, upload_id = %upload_id, "Uploading to the staging bucket in parts");
        match self.upload_parts(client, path, length, target, &upload_id).await {
            Ok(parts) => {
                client
                    .complete_multipart_upload()
                    .bucket(&target.bucket)
                    .key(&target.key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(s3_error)?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort) = client
                    .abort_multipart_upload()
                    .bucket(&target.bucket)
                    .key(&target.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(&abort),
                        "Failed to abort multipart upload, orphaned parts may remain"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        client: &Client,
        path: &Path,
        length: u64,
        target: &StagingTarget,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut offset = 0;
        let mut part_number = 1;
        while offset < length {
            let size = self.config.part_size.min(length - offset);
            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(size))
                .build()
                .await
                .map_err(|e| ClientError::S3(format!("cannot stream {}: {e}", path.display())))?;
            let uploaded = client
                .upload_part()
                .bucket(&target.bucket)
                .key(&target.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(s3_error)?;
            debug!(part_number, size, "Uploaded part");
            parts.push(
                CompletedPart::builder()
                    .e_tag(uploaded.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
            offset += size;
            part_number += 1;
        }
        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, path: &Path, target: &StagingTarget) -> tileroll_core::Result<()> {
        Ok(self.put(path, target).await?)
    }
}

fn s3_error<E, R>(err: SdkError<E, R>) -> ClientError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    ClientError::S3(DisplayErrorContext(&err).to_string())
}
