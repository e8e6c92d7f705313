// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Publishing of a single GIS file as a tileset.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::backend::{ObjectStore, TilingService};
use crate::error::{Error, Result};
use crate::polling::{PollStatus, PollingConfig, poll};
use crate::types::{AccountAuth, GisFile, JobStatus, Tileset};
use crate::versioning::{tileset_id, versioned_name};

/// Default wait between two observations of a processing job.
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// Default number of consecutive failed observations tolerated per job.
pub const DEFAULT_JOB_POLL_ATTEMPTS: u32 = 2;

/// Settings of single-file uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// How processing jobs are tracked.
    pub polling: PollingConfig,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            polling: PollingConfig::new()
                .with_interval(DEFAULT_JOB_POLL_INTERVAL)
                .with_attempts(DEFAULT_JOB_POLL_ATTEMPTS),
        }
    }
}

impl UploadSettings {
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }
}

/// Classify one observation of the job producing `tileset`.
///
/// An explicit error is fatal, a missing progress is a failed observation,
/// and any reported progress is classified by [`PollStatus::from_progress`].
pub fn classify_job(status: &JobStatus, tileset: &str) -> Result<PollStatus> {
    if let Some(message) = &status.error {
        return Err(Error::JobFailed {
            tileset: tileset.to_string(),
            message: message.clone(),
        });
    }
    Ok(match status.progress {
        Some(progress) => PollStatus::from_progress(progress),
        None => PollStatus::Failed,
    })
}

/// Logs the progress of a job once per percent.
struct ProgressLog<'a> {
    tileset: &'a str,
    last_percent: Option<i64>,
}

impl<'a> ProgressLog<'a> {
    fn new(tileset: &'a str) -> Self {
        Self {
            tileset,
            last_percent: None,
        }
    }

    fn observe(&mut self, status: &JobStatus) {
        let Some(progress) = status.progress else {
            return;
        };
        let percent = (progress * 100.0).round() as i64;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            info!("[{}] {}%", self.tileset, percent);
        }
    }
}

/// Stages, processes and tracks single files.
#[derive(Clone)]
pub struct Uploader {
    service: Arc<dyn TilingService>,
    store: Arc<dyn ObjectStore>,
    settings: UploadSettings,
}

impl Uploader {
    pub fn new(service: Arc<dyn TilingService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            service,
            store,
            settings: UploadSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn service(&self) -> &dyn TilingService {
        self.service.as_ref()
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Publish `file` as generation `version` of its tileset.
    ///
    /// Returns once the processing job has completed.
    #[instrument(skip_all, fields(username = %auth.username, file = %file.name, version = version))]
    pub async fn upload(
        &self,
        auth: &AccountAuth,
        file: &GisFile,
        version: u32,
        cancel: &CancellationToken,
    ) -> Result<Tileset> {
        let name = versioned_name(&file.tileset_name(), version);
        let tileset = Tileset::new(&name, tileset_id(&name, &auth.username));

        let target = self.service.stage(auth).await?;
        debug!(
            tileset = %tileset.name,
            bucket = %target.bucket,
            key = %target.key,
            "Staging source file"
        );
        self.store.put_object(&file.path, &target).await?;

        debug!(tileset = %tileset.name, id = %tileset.id, "Starting processing job");
        let job_id = self.service.create_job(auth, &tileset, &target.url).await?;

        debug!(tileset = %tileset.name, job_id = %job_id, "Waiting for the processing job");
        let service = self.service.as_ref();
        let mut progress = ProgressLog::new(&tileset.name);
        poll(
            || service.job_status(auth, &job_id),
            |status| {
                let classified = classify_job(&status, &name);
                progress.observe(&status);
                classified
            },
            &self.settings.polling,
            cancel,
        )
        .await?;

        info!(tileset = %tileset.name, id = %tileset.id, "Tileset published");
        Ok(tileset)
    }
}
