// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mapbox client against a mock API.

use std::sync::{Arc, Mutex};

use reqwest::{Method, StatusCode, Url};
use serde_json::json;
use tileroll_clients::{HttpClient, HttpObserver, MapboxClient, MapboxConfig};
use tileroll_core::{AccountAuth, Error, Tileset, TilingService, TokenRequest};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingObserver {
    urls: Mutex<Vec<String>>,
    failures: Mutex<Vec<u16>>,
}

impl HttpObserver for RecordingObserver {
    fn on_request(&self, _method: &Method, url: &Url) {
        self.urls
            .lock()
            .unwrap()
            .push(tileroll_clients::redact(url).to_string());
    }

    fn on_response(&self, _method: &Method, _url: &Url, _status: StatusCode) {}

    fn on_failure(&self, _method: &Method, _url: &Url, status: StatusCode, _body: &str) {
        self.failures.lock().unwrap().push(status.as_u16());
    }
}

fn client(server: &MockServer) -> MapboxClient {
    let http = HttpClient::traced().unwrap();
    MapboxClient::new(http, MapboxConfig::new().with_base_url(server.uri()))
}

fn auth() -> AccountAuth {
    AccountAuth::new("acme", "sk.acme")
}

#[tokio::test]
async fn test_list_tilesets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tilesets/v1/acme"))
        .and(query_param("access_token", "sk.acme"))
        .and(query_param("limit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "acme.dem-3", "name": "dem-3", "type": "raster", "filesize": 1024},
            {"id": "acme.roads-3", "name": "roads-3", "type": "vector"}
        ])))
        .mount(&server)
        .await;

    let tilesets = client(&server).list_tilesets(&auth()).await.unwrap();

    assert_eq!(
        tilesets,
        vec![
            Tileset::new("dem-3", "acme.dem-3"),
            Tileset::new("roads-3", "acme.roads-3"),
        ]
    );
}

#[tokio::test]
async fn test_stage_returns_credentials_and_source_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uploads/v1/acme/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": "tilestream-tilesets-production",
            "key": "a1/_pending/xyz/acme",
            "accessKeyId": "ASIA123",
            "secretAccessKey": "secret",
            "sessionToken": "session",
            "url": "https://tilestream-tilesets-production.s3.amazonaws.com/a1/_pending/xyz/acme"
        })))
        .mount(&server)
        .await;

    let target = client(&server).stage(&auth()).await.unwrap();

    assert_eq!(target.bucket, "tilestream-tilesets-production");
    assert_eq!(target.key, "a1/_pending/xyz/acme");
    assert_eq!(
        target.url,
        "https://tilestream-tilesets-production.s3.amazonaws.com/a1/_pending/xyz/acme"
    );
    assert_eq!(target.credentials.access_key_id, "ASIA123");
    assert_eq!(target.credentials.session_token, "session");
}

#[tokio::test]
async fn test_create_job_posts_upload_and_requires_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/v1/acme"))
        .and(body_json(json!({
            "name": "roads-4",
            "tileset": "acme.roads-4",
            "url": "https://bucket.s3.amazonaws.com/key"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": "job-1", "complete": false})),
        )
        .mount(&server)
        .await;

    let job = client(&server)
        .create_job(
            &auth(),
            &Tileset::new("roads-4", "acme.roads-4"),
            "https://bucket.s3.amazonaws.com/key",
        )
        .await
        .unwrap();

    assert_eq!(job, "job-1");
}

#[tokio::test]
async fn test_create_job_rejects_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/v1/acme"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "bad url"})))
        .mount(&server)
        .await;

    let result = client(&server)
        .create_job(&auth(), &Tileset::new("roads-4", "acme.roads-4"), "nowhere")
        .await;

    assert!(matches!(result, Err(Error::Service(msg)) if msg.contains("422")));
}

#[tokio::test]
async fn test_job_status_reads_progress_and_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uploads/v1/acme/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-1", "complete": false, "progress": 0.25, "error": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uploads/v1/acme/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-2", "complete": false, "progress": 0, "error": "Invalid GeoJSON"
        })))
        .mount(&server)
        .await;

    let mapbox = client(&server);
    let running = mapbox.job_status(&auth(), "job-1").await.unwrap();
    let failed = mapbox.job_status(&auth(), "job-2").await.unwrap();

    assert_eq!(running.progress, Some(0.25));
    assert_eq!(running.error, None);
    assert_eq!(failed.error.as_deref(), Some("Invalid GeoJSON"));
}

#[tokio::test]
async fn test_delete_tileset() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/tilesets/v1/acme.roads-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete_tileset(&auth(), "acme.roads-2")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_find_public_token_skips_default_and_secret_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokens/v2/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "default", "token": "pk.default", "usage": "pk", "default": true, "scopes": []},
            {"id": "admin", "token": "sk.acme", "usage": "sk", "default": false, "scopes": []},
            {"id": "viewer", "token": "pk.viewer", "usage": "pk", "default": false,
             "scopes": ["styles:tiles"], "allowedUrls": ["https://api.mapbox.com"]}
        ])))
        .mount(&server)
        .await;

    let token = client(&server)
        .find_public_token(&auth())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(token.id, "viewer");
    assert_eq!(token.token, "pk.viewer");
    assert_eq!(token.allowed_urls, vec!["https://api.mapbox.com"]);
}

#[tokio::test]
async fn test_find_public_token_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokens/v2/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "default", "token": "pk.default", "usage": "pk", "default": true}
        ])))
        .mount(&server)
        .await;

    let token = client(&server).find_public_token(&auth()).await.unwrap();

    assert!(token.is_none());
}

#[tokio::test]
async fn test_issue_and_revoke_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/v2/acme"))
        .and(body_json(json!({
            "note": "Public token for acme",
            "scopes": ["styles:tiles"],
            "allowedUrls": ["https://api.mapbox.com"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "tok-2", "token": "pk.new", "usage": "pk", "default": false,
            "scopes": ["styles:tiles"], "allowedUrls": ["https://api.mapbox.com"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tokens/v2/acme/tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mapbox = client(&server);
    mapbox.revoke_token(&auth(), "tok-1").await.unwrap();
    let issued = mapbox
        .issue_token(
            &auth(),
            &TokenRequest {
                note: "Public token for acme".into(),
                scopes: vec!["styles:tiles".into()],
                allowed_urls: vec!["https://api.mapbox.com".into()],
            },
        )
        .await
        .unwrap();

    assert_eq!(issued.id, "tok-2");
    assert_eq!(issued.scopes, vec!["styles:tiles"]);
}

#[tokio::test]
async fn test_observer_sees_redacted_requests_and_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tilesets/v1/acme"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Not Authorized"))
        .mount(&server)
        .await;

    let observer = Arc::new(RecordingObserver::default());
    let http = HttpClient::new(observer.clone()).unwrap();
    let mapbox = MapboxClient::new(http, MapboxConfig::new().with_base_url(server.uri()));

    let result = mapbox.list_tilesets(&auth()).await;

    assert!(result.is_err());
    let urls = observer.urls.lock().unwrap();
    assert_eq!(urls.len(), 1);
    assert!(!urls[0].contains("sk.acme"));
    assert_eq!(*observer.failures.lock().unwrap(), vec![401]);
}
