// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Azure identity, blob downloads and the permissions store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use tileroll_core::{AccessGrants, PermissionsStore};

use crate::error::{ClientError, Result};
use crate::http::HttpClient;

/// Default Microsoft identity platform authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Storage service version sent with blob requests.
pub const BLOB_API_VERSION: &str = "2021-06-08";

/// Resource an access token is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The Functions app registered under the client id.
    Functions,
    /// Azure Blob Storage.
    BlobStorage,
}

impl Scope {
    pub fn value(&self, client_id: &str) -> String {
        match self {
            Self::Functions => format!("{client_id}/.default"),
            Self::BlobStorage => "https://storage.azure.com/.default".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials identity of the service principal.
#[derive(Clone)]
pub struct AzureCredential {
    http: HttpClient,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority: String,
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl AzureCredential {
    pub fn new(
        http: HttpClient,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Obtain a bearer token for `scope`.
    #[instrument(skip(self), fields(tenant = %self.tenant_id))]
    pub async fn token(&self, scope: Scope) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority,
            urlencoding::encode(&self.tenant_id)
        );
        let scope = scope.value(&self.client_id);
        let request = self.http.request(Method::POST, url).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ]);
        let token: TokenResponse = self.http.send_json(request).await.map_err(|e| match e {
            ClientError::Status { status, body } => {
                ClientError::Auth(format!("token request failed with {status}: {body}"))
            }
            other => other,
        })?;
        debug!("Obtained access token");
        Ok(token.access_token)
    }
}

/// Downloads blobs to the local file system.
#[derive(Clone)]
pub struct BlobStorageClient {
    http: HttpClient,
    token: String,
}

impl std::fmt::Debug for BlobStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorageClient").finish_non_exhaustive()
    }
}

impl BlobStorageClient {
    pub fn new(http: HttpClient, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
        }
    }

    /// Authenticate against blob storage and build a client.
    pub async fn build(http: HttpClient, credential: &AzureCredential) -> Result<Self> {
        let token = credential.token(Scope::BlobStorage).await?;
        Ok(Self::new(http, token))
    }

    /// Stream the blob at `url` into `dir/file_name`.
    ///
    /// Without `file_name`, the last segment of the URL is used.
    #[instrument(skip(self, dir))]
    pub async fn download(
        &self,
        url: &str,
        dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let file_name = match file_name {
            Some(name) => name.to_string(),
            None => url
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ClientError::InvalidUrl(format!("{url} does not point to a file"))
                })?,
        };
        let output = dir.join(file_name);

        let request = self
            .http
            .request(Method::GET, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header("x-ms-version", BLOB_API_VERSION);
        let response = self.http.send(request).await?;

        let mut file = tokio::fs::File::create(&output).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!(path = %output.display(), bytes = written, "Blob downloaded");
        Ok(output)
    }
}

/// Configuration of the permissions store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the Functions API, without trailing slash.
    pub base_url: String,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Permissions store backed by an Azure Functions API.
#[derive(Clone)]
pub struct FunctionsClient {
    http: HttpClient,
    token: String,
    config: StoreConfig,
}

impl std::fmt::Debug for FunctionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionsClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FunctionsClient {
    pub fn new(http: HttpClient, token: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            http,
            token: token.into(),
            config,
        }
    }

    /// Authenticate against the Functions app and build a client.
    pub async fn build(
        http: HttpClient,
        credential: &AzureCredential,
        config: StoreConfig,
    ) -> Result<Self> {
        let token = credential.token(Scope::Functions).await?;
        Ok(Self::new(http, token, config))
    }

    async fn put_roles(&self, grants: &AccessGrants) -> Result<u16> {
        let request = self
            .http
            .request(Method::PUT, format!("{}/roles", self.config.base_url))
            .bearer_auth(&self.token)
            .json(grants);
        let response = self.http.execute(request).await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl PermissionsStore for FunctionsClient {
    async fn publish(&self, grants: &AccessGrants) -> tileroll_core::Result<u16> {
        Ok(self.put_roles(grants).await?)
    }
}
