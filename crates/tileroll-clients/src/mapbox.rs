// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mapbox Uploads, Tilesets and Tokens APIs.
//!
//! Every request authenticates with the admin token of the account as the
//! `access_token` query parameter. Requests whose answers change while a
//! job runs carry a `timestamp` parameter so that no cache serves them.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tileroll_core::{
    AccessToken, AccountAuth, JobStatus, StagingCredentials, StagingTarget, Tileset,
    TilingService, TokenRequest,
};

use crate::error::Result;
use crate::http::{HttpClient, decode};

/// Base URL of the public Mapbox API.
pub const DEFAULT_MAPBOX_URL: &str = "https://api.mapbox.com";

/// Maximum page size of the tileset listing.
const TILESET_PAGE_LIMIT: u32 = 500;

/// Configuration of the Mapbox client.
#[derive(Debug, Clone)]
pub struct MapboxConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
}

impl Default for MapboxConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MAPBOX_URL.to_string(),
        }
    }
}

impl MapboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MapboxTileset {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagingResponse {
    bucket: String,
    key: String,
    #[serde(flatten)]
    credentials: StagingCredentials,
}

#[derive(Debug, Serialize)]
struct CreateUpload<'a> {
    name: &'a str,
    tileset: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapboxToken {
    id: String,
    token: String,
    usage: String,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    allowed_urls: Vec<String>,
}

impl From<MapboxToken> for AccessToken {
    fn from(token: MapboxToken) -> Self {
        AccessToken {
            id: token.id,
            token: token.token,
            scopes: token.scopes,
            allowed_urls: token.allowed_urls,
        }
    }
}

/// URL of a staged object as the Uploads API expects it.
pub fn staged_object_url(bucket: &str, key: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}")
}

/// Mapbox implementation of [`TilingService`].
#[derive(Debug, Clone)]
pub struct MapboxClient {
    http: HttpClient,
    config: MapboxConfig,
}

impl MapboxClient {
    pub fn new(http: HttpClient, config: MapboxConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authed(&self, method: Method, path: &str, auth: &AccountAuth) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .query(&[("access_token", auth.admin_token.as_str())])
    }

    /// Same as [`Self::authed`], bypassing any cache.
    fn uncached(&self, method: Method, path: &str, auth: &AccountAuth) -> RequestBuilder {
        let timestamp = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros());
        self.authed(method, path, auth)
            .query(&[("timestamp", timestamp)])
    }
}

fn user(auth: &AccountAuth) -> String {
    urlencoding::encode(&auth.username).into_owned()
}

#[async_trait]
impl TilingService for MapboxClient {
    #[instrument(skip_all, fields(username = %auth.username))]
    async fn list_tilesets(&self, auth: &AccountAuth) -> tileroll_core::Result<Vec<Tileset>> {
        let request = self
            .authed(Method::GET, &format!("/tilesets/v1/{}", user(auth)), auth)
            .query(&[("limit", TILESET_PAGE_LIMIT)]);
        let tilesets: Vec<MapboxTileset> = self.http.send_json(request).await?;
        debug!(count = tilesets.len(), "Listed tilesets");
        Ok(tilesets
            .into_iter()
            .map(|t| Tileset::new(t.name, t.id))
            .collect())
    }

    #[instrument(skip_all, fields(username = %auth.username))]
    async fn stage(&self, auth: &AccountAuth) -> tileroll_core::Result<StagingTarget> {
        debug!("Retrieving credentials for the staging bucket");
        let request = self.uncached(
            Method::GET,
            &format!("/uploads/v1/{}/credentials", user(auth)),
            auth,
        );
        let staging: StagingResponse = self.http.send_json(request).await?;
        Ok(StagingTarget {
            url: staged_object_url(&staging.bucket, &staging.key),
            bucket: staging.bucket,
            key: staging.key,
            credentials: staging.credentials,
        })
    }

    #[instrument(skip_all, fields(username = %auth.username, tileset = %tileset.id))]
    async fn create_job(
        &self,
        auth: &AccountAuth,
        tileset: &Tileset,
        source_url: &str,
    ) -> tileroll_core::Result<String> {
        let request = self
            .authed(Method::POST, &format!("/uploads/v1/{}", user(auth)), auth)
            .json(&CreateUpload {
                name: &tileset.name,
                tileset: &tileset.id,
                url: source_url,
            });
        let response = self.http.send_expecting(request, StatusCode::CREATED).await?;
        let created: UploadCreated = decode(response).await?;
        Ok(created.id)
    }

    async fn job_status(
        &self,
        auth: &AccountAuth,
        job_id: &str,
    ) -> tileroll_core::Result<JobStatus> {
        let request = self.uncached(
            Method::GET,
            &format!(
                "/uploads/v1/{}/{}",
                user(auth),
                urlencoding::encode(job_id)
            ),
            auth,
        );
        Ok(self.http.send_json(request).await?)
    }

    #[instrument(skip_all, fields(username = %auth.username, tileset = %tileset_id))]
    async fn delete_tileset(
        &self,
        auth: &AccountAuth,
        tileset_id: &str,
    ) -> tileroll_core::Result<()> {
        let request = self.authed(
            Method::DELETE,
            &format!("/tilesets/v1/{}", urlencoding::encode(tileset_id)),
            auth,
        );
        self.http.send_expecting(request, StatusCode::OK).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(username = %auth.username))]
    async fn find_public_token(
        &self,
        auth: &AccountAuth,
    ) -> tileroll_core::Result<Option<AccessToken>> {
        let request = self.authed(Method::GET, &format!("/tokens/v2/{}", user(auth)), auth);
        let tokens: Vec<MapboxToken> = self.http.send_json(request).await?;
        Ok(tokens
            .into_iter()
            .find(|t| !t.default && t.usage == "pk")
            .map(AccessToken::from))
    }

    #[instrument(skip_all, fields(username = %auth.username))]
    async fn issue_token(
        &self,
        auth: &AccountAuth,
        request: &TokenRequest,
    ) -> tileroll_core::Result<AccessToken> {
        let builder = self
            .authed(Method::POST, &format!("/tokens/v2/{}", user(auth)), auth)
            .json(request);
        let response = self.http.send_expecting(builder, StatusCode::CREATED).await?;
        let token: MapboxToken = decode(response).await?;
        Ok(token.into())
    }

    #[instrument(skip_all, fields(username = %auth.username, token_id = %token_id))]
    async fn revoke_token(&self, auth: &AccountAuth, token_id: &str) -> tileroll_core::Result<()> {
        let request = self.authed(
            Method::DELETE,
            &format!(
                "/tokens/v2/{}/{}",
                user(auth),
                urlencoding::encode(token_id)
            ),
            auth,
        );
        self.http.send_expecting(request, StatusCode::NO_CONTENT).await?;
        Ok(())
    }
}
