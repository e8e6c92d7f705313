// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared HTTP plumbing with an injected request observer.
//!
//! Every client owns an [`HttpClient`], which reports each request and
//! response to its [`HttpObserver`]. There is no process-wide hook: what
//! gets logged is decided by whoever builds the clients.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Query parameters whose values never reach an observer.
const SECRET_PARAMS: [&str; 1] = ["access_token"];

/// Receives every request and response of an [`HttpClient`].
pub trait HttpObserver: Send + Sync {
    /// A request is about to be sent.
    fn on_request(&self, method: &Method, url: &Url);

    /// A response was received, whatever its status.
    fn on_response(&self, method: &Method, url: &Url, status: StatusCode);

    /// A response with an unexpected status was received.
    fn on_failure(&self, method: &Method, url: &Url, status: StatusCode, body: &str);
}

/// Logs requests at `debug` and failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl HttpObserver for TracingObserver {
    fn on_request(&self, method: &Method, url: &Url) {
        debug!("Sending {} request to '{}'", method, redact(url));
    }

    fn on_response(&self, method: &Method, url: &Url, status: StatusCode) {
        debug!(
            status = status.as_u16(),
            "Received a response from a {} request to '{}'",
            method,
            redact(url)
        );
    }

    fn on_failure(&self, method: &Method, url: &Url, status: StatusCode, body: &str) {
        warn!(
            status = status.as_u16(),
            body = %body,
            "{} request to '{}' failed",
            method,
            redact(url)
        );
    }
}

/// `url` with the values of secret query parameters masked.
pub fn redact(url: &Url) -> Url {
    if !url.query_pairs().any(|(k, _)| SECRET_PARAMS.contains(&k.as_ref())) {
        return url.clone();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}

/// A `reqwest` client paired with its observer.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    observer: Arc<dyn HttpObserver>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Default limit on establishing a connection.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default limit on a connection staying silent.
    ///
    /// Transfers of large files may take any time as long as data keeps
    /// flowing, so there is no limit on a request as a whole.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(observer: Arc<dyn HttpObserver>) -> Result<Self> {
        Self::with_timeouts(
            observer,
            Self::DEFAULT_CONNECT_TIMEOUT,
            Self::DEFAULT_READ_TIMEOUT,
        )
    }

    pub fn with_timeouts(
        observer: Arc<dyn HttpObserver>,
        connect: Duration,
        read: Duration,
    ) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()?;
        Ok(Self::with_client(inner, observer))
    }

    pub fn with_client(inner: reqwest::Client, observer: Arc<dyn HttpObserver>) -> Self {
        Self { inner, observer }
    }

    /// A client logging through `tracing`.
    pub fn traced() -> Result<Self> {
        Self::new(Arc::new(TracingObserver))
    }

    pub fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.inner.request(method, url)
    }

    /// Send a request and return its response, whatever the status.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let (_, response) = self.dispatch(builder).await?;
        Ok(response)
    }

    /// Send a request and require a success status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let (method, response) = self.dispatch(builder).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(self.failure(&method, response).await)
        }
    }

    /// Send a request and require exactly `expected`.
    pub async fn send_expecting(
        &self,
        builder: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response> {
        let (method, response) = self.dispatch(builder).await?;
        if response.status() == expected {
            Ok(response)
        } else {
            Err(self.failure(&method, response).await)
        }
    }

    /// Send a request, require a success status and decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        decode(response).await
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<(Method, Response)> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        self.observer.on_request(&method, &url);
        let response = self.inner.execute(request).await?;
        self.observer.on_response(&method, &url, response.status());
        Ok((method, response))
    }

    async fn failure(&self, method: &Method, response: Response) -> ClientError {
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        self.observer.on_failure(method, &url, status, &body);
        ClientError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

/// Decode the JSON body of a response.
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
