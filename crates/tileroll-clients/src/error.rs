// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tileroll-clients.

use thiserror::Error;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by the HTTP clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or its response not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status code.
    #[error("unexpected response {status}: {body}")]
    Status { status: u16, body: String },

    /// Local file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body is not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The staging bucket rejected or failed an upload.
    #[error("S3 error: {0}")]
    S3(String),

    /// Authentication against an identity provider failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A URL could not be built or does not point where expected.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<ClientError> for tileroll_core::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Io(e) => tileroll_core::Error::Io(e),
            other => tileroll_core::Error::Service(other.to_string()),
        }
    }
}
