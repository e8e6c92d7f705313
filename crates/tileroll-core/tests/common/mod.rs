// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory collaborators for tileroll-core scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tileroll_core::account::user_token_request;
use tileroll_core::{
    AccessGrants, AccessToken, AccountAuth, AccountConfig, Error, FileNames, GisFile, GisFiles,
    JobStatus, ObjectStore, PermissionsStore, PollingConfig, Result, StagingCredentials,
    StagingTarget, Tileset, TilingService, TokenRequest, UploadSettings, Uploader,
};

/// How the processing jobs of an account behave.
#[derive(Debug, Clone)]
pub enum JobBehavior {
    /// Completes on the first observation.
    Complete,
    /// Reports the given progress values in order, then completion.
    Progress(Vec<f64>),
    /// Never reports any progress.
    Silent,
    /// Reports an explicit error.
    Fails(String),
}

#[derive(Default)]
struct ServiceState {
    live: HashMap<String, Vec<Tileset>>,
    behaviors: HashMap<String, JobBehavior>,
    jobs: HashMap<String, (String, VecDeque<JobStatus>)>,
    public_tokens: HashMap<String, AccessToken>,
    failing_deletes: HashSet<String>,
    created: Vec<(String, Tileset, String)>,
    deleted: Vec<(String, String)>,
    probes: HashMap<String, usize>,
    events: Vec<String>,
    staged: usize,
    issued: usize,
    wrong_scopes: bool,
}

/// Tiling service keeping everything in memory.
#[derive(Default)]
pub struct FakeTilingService {
    state: Mutex<ServiceState>,
    token_latency: Duration,
}

impl FakeTilingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_latency(mut self, latency: Duration) -> Self {
        self.token_latency = latency;
        self
    }

    pub fn with_live(self, username: &str, names: &[&str]) -> Self {
        let tilesets = names
            .iter()
            .map(|name| Tileset::new(*name, format!("{username}.{name}")))
            .collect();
        self.with_live_tilesets(username, tilesets)
    }

    pub fn with_live_tilesets(self, username: &str, tilesets: Vec<Tileset>) -> Self {
        self.state
            .lock()
            .unwrap()
            .live
            .insert(username.to_string(), tilesets);
        self
    }

    pub fn with_behavior(self, username: &str, behavior: JobBehavior) -> Self {
        self.state
            .lock()
            .unwrap()
            .behaviors
            .insert(username.to_string(), behavior);
        self
    }

    pub fn with_public_token(self, username: &str, id: &str, token: &str) -> Self {
        self.state.lock().unwrap().public_tokens.insert(
            username.to_string(),
            AccessToken {
                id: id.to_string(),
                token: token.to_string(),
                scopes: vec![],
                allowed_urls: vec![],
            },
        );
        self
    }

    pub fn with_failing_delete(self, tileset_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(tileset_id.to_string());
        self
    }

    /// Issue tokens whose scopes differ from the requested ones.
    pub fn with_wrong_scopes(self) -> Self {
        self.state.lock().unwrap().wrong_scopes = true;
        self
    }

    /// Tilesets a processing job was started for, per account.
    pub fn created(&self, username: &str) -> Vec<Tileset> {
        self.state
            .lock()
            .unwrap()
            .created
            .iter()
            .filter(|(u, _, _)| u == username)
            .map(|(_, t, _)| t.clone())
            .collect()
    }

    /// Ids of the deleted tilesets, per account, in deletion order.
    pub fn deleted(&self, username: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .iter()
            .filter(|(u, _)| u == username)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn deleted_count(&self) -> usize {
        self.state.lock().unwrap().deleted.len()
    }

    /// Number of job observations made for an account.
    pub fn probes(&self, username: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .probes
            .get(username)
            .copied()
            .unwrap_or(0)
    }

    /// Token events (`revoke:<user>:<id>`, `issue:<user>`) in order.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    fn script(behavior: &JobBehavior) -> VecDeque<JobStatus> {
        let done = JobStatus {
            progress: Some(1.0),
            error: None,
        };
        match behavior {
            JobBehavior::Complete => VecDeque::from([done]),
            JobBehavior::Progress(values) => values
                .iter()
                .map(|p| JobStatus {
                    progress: Some(*p),
                    error: None,
                })
                .chain(std::iter::once(done))
                .collect(),
            JobBehavior::Silent => VecDeque::new(),
            JobBehavior::Fails(message) => VecDeque::from([JobStatus {
                progress: Some(0.3),
                error: Some(message.clone()),
            }]),
        }
    }
}

#[async_trait]
impl TilingService for FakeTilingService {
    async fn list_tilesets(&self, auth: &AccountAuth) -> Result<Vec<Tileset>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .live
            .get(&auth.username)
            .cloned()
            .unwrap_or_default())
    }

    async fn stage(&self, auth: &AccountAuth) -> Result<StagingTarget> {
        let mut state = self.state.lock().unwrap();
        state.staged += 1;
        let key = format!("{}/{}", auth.username, state.staged);
        Ok(StagingTarget {
            bucket: "staging".to_string(),
            url: format!("https://staging.s3.amazonaws.com/{key}"),
            key,
            credentials: StagingCredentials {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "session".to_string(),
                region: None,
            },
        })
    }

    async fn create_job(
        &self,
        auth: &AccountAuth,
        tileset: &Tileset,
        source_url: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let behavior = state
            .behaviors
            .get(&auth.username)
            .cloned()
            .unwrap_or(JobBehavior::Complete);
        let job_id = format!("job-{}", state.jobs.len() + 1);
        state.jobs.insert(
            job_id.clone(),
            (auth.username.clone(), Self::script(&behavior)),
        );
        state.created.push((
            auth.username.clone(),
            tileset.clone(),
            source_url.to_string(),
        ));
        Ok(job_id)
    }

    async fn job_status(&self, _auth: &AccountAuth, job_id: &str) -> Result<JobStatus> {
        let mut state = self.state.lock().unwrap();
        let (username, next) = match state.jobs.get_mut(job_id) {
            Some((username, script)) => (username.clone(), script.pop_front()),
            None => return Err(Error::Service(format!("unknown job {job_id}"))),
        };
        *state.probes.entry(username).or_default() += 1;
        Ok(next.unwrap_or_default())
    }

    async fn delete_tileset(&self, auth: &AccountAuth, tileset_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(tileset_id) {
            return Err(Error::Service(format!("cannot delete {tileset_id}")));
        }
        state
            .deleted
            .push((auth.username.clone(), tileset_id.to_string()));
        Ok(())
    }

    async fn find_public_token(&self, auth: &AccountAuth) -> Result<Option<AccessToken>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .public_tokens
            .get(&auth.username)
            .cloned())
    }

    async fn issue_token(
        &self,
        auth: &AccountAuth,
        request: &TokenRequest,
    ) -> Result<AccessToken> {
        tokio::time::sleep(self.token_latency).await;
        let mut state = self.state.lock().unwrap();
        state.issued += 1;
        state.events.push(format!("issue:{}", auth.username));
        let mut scopes = request.scopes.clone();
        if state.wrong_scopes {
            scopes.push("tilesets:write".to_string());
        }
        Ok(AccessToken {
            id: format!("issued-{}", state.issued),
            token: format!("pk.{}.{}", auth.username, state.issued),
            scopes,
            allowed_urls: request.allowed_urls.clone(),
        })
    }

    async fn revoke_token(&self, auth: &AccountAuth, token_id: &str) -> Result<()> {
        tokio::time::sleep(self.token_latency).await;
        self.state
            .lock()
            .unwrap()
            .events
            .push(format!("revoke:{}:{}", auth.username, token_id));
        Ok(())
    }
}

/// Object store remembering what was put where.
#[derive(Default)]
pub struct FakeObjectStore {
    puts: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeObjectStore {
    pub fn puts(&self) -> Vec<(PathBuf, String)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put_object(&self, path: &Path, target: &StagingTarget) -> Result<()> {
        self.puts
            .lock()
            .unwrap()
            .push((path.to_path_buf(), target.key.clone()));
        Ok(())
    }
}

/// Permissions store answering with scripted status codes, then 200.
#[derive(Default)]
pub struct FakePermissionsStore {
    statuses: Mutex<VecDeque<u16>>,
    published: Mutex<Vec<AccessGrants>>,
}

impl FakePermissionsStore {
    pub fn answering(statuses: &[u16]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<AccessGrants> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PermissionsStore for FakePermissionsStore {
    async fn publish(&self, grants: &AccessGrants) -> Result<u16> {
        self.published.lock().unwrap().push(grants.clone());
        Ok(self.statuses.lock().unwrap().pop_front().unwrap_or(200))
    }
}

/// Fast polling so paused-clock tests stay short.
pub fn fast_settings(attempts: u32) -> UploadSettings {
    UploadSettings::default().with_polling(
        PollingConfig::new()
            .with_interval(Duration::from_millis(10))
            .with_attempts(attempts),
    )
}

pub fn uploader(service: Arc<FakeTilingService>, attempts: u32) -> Uploader {
    Uploader::new(service, Arc::new(FakeObjectStore::default()))
        .with_settings(fast_settings(attempts))
}

pub fn account_config(username: &str, raster: &[&str], vector: &[&str]) -> AccountConfig {
    AccountConfig {
        auth: AccountAuth::new(username, format!("sk.{username}")),
        groups_regex: ".*".to_string(),
        files: FileNames {
            raster: raster.iter().map(|s| s.to_string()).collect(),
            vector: vector.iter().map(|s| s.to_string()).collect(),
        },
    }
}

/// A token matching what user tokens are issued with.
pub fn user_token(username: &str) -> AccessToken {
    let request = user_token_request(username);
    AccessToken {
        id: format!("{username}-token"),
        token: format!("pk.{username}"),
        scopes: request.scopes,
        allowed_urls: request.allowed_urls,
    }
}

pub fn gis_files() -> GisFiles {
    GisFiles {
        raster: vec![
            GisFile::new("dem", "/data/dem.geotiff"),
            GisFile::new("hillshade", "/data/hillshade.geotiff"),
        ],
        vector: vec![
            GisFile::new("roads", "/data/roads.geojsonl"),
            GisFile::new("rivers", "/data/rivers.geojsonl"),
        ],
    }
}
