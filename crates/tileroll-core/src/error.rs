// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tileroll-core.

use thiserror::Error;

use crate::polling::PollError;

/// Errors raised while publishing, retiring or granting access to tilesets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An account references a GIS file that is not among the resolved files.
    #[error("File '{file}' not found for Mapbox account '{username}'")]
    FileNotFound { file: String, username: String },

    /// The failed-attempt budget of a polled job was used up.
    #[error("Polling failed due to too many failed attempts ({attempts})")]
    PollingExhausted { attempts: u32 },

    /// The tiling service reported an explicit error for a processing job.
    #[error("Upload of tileset '{tileset}' failed with error: {message}")]
    JobFailed { tileset: String, message: String },

    /// The surrounding operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The permissions store answered with a non-success status code.
    #[error("Unexpected response from permissions store: {status}")]
    Publish { status: u16 },

    /// One or more accounts failed during a multi-account upload.
    #[error("{} account(s) failed to upload: {}", .failures.len(), .failures.join("; "))]
    AccountsFailed { failures: Vec<String> },

    /// One or more stale tilesets could not be deleted.
    #[error("{} tileset(s) could not be retired: {}", .failures.len(), .failures.join("; "))]
    RetirementFailed { failures: Vec<String> },

    /// A freshly issued access token does not carry the expected permissions.
    #[error("Access token of Mapbox account '{username}' is invalid: {reason}")]
    InvalidToken { username: String, reason: String },

    /// The groups regex of an account does not compile.
    #[error("Invalid groups regex of Mapbox account '{username}': {source}")]
    InvalidGroupsRegex {
        username: String,
        #[source]
        source: regex::Error,
    },

    /// A collaborator (HTTP client, object store, ...) failed.
    #[error("Service error: {0}")]
    Service(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PollError<Error>> for Error {
    fn from(err: PollError<Error>) -> Self {
        match err {
            PollError::Exhausted { attempts } => Error::PollingExhausted { attempts },
            PollError::Cancelled => Error::Cancelled,
            PollError::Aborted(inner) => inner,
        }
    }
}

/// Result type using tileroll-core's Error.
pub type Result<T> = std::result::Result<T, Error>;
