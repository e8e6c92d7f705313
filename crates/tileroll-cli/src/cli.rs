// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command line arguments and their environment fallbacks.

use std::path::PathBuf;

use clap::Parser;
use tileroll_clients::{DEFAULT_AUTHORITY, DEFAULT_MAPBOX_URL};

/// Roll GIS files out to Mapbox accounts as a new tileset generation.
#[derive(Debug, Clone, Parser)]
#[command(name = "tileroll", version, about)]
pub struct Args {
    /// Deployment config file (YAML).
    #[arg(long, env = "TILEROLL_CONFIG", default_value = "tileroll.yml")]
    pub config: PathBuf,

    /// Directory the GIS files are downloaded to.
    #[arg(long, env = "TILEROLL_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Base URL of the permissions store API.
    #[arg(long, env = "TILEROLL_STORE_URL")]
    pub store_url: String,

    /// Base URL of the Mapbox API.
    #[arg(long, env = "TILEROLL_MAPBOX_URL", default_value = DEFAULT_MAPBOX_URL)]
    pub mapbox_url: String,

    /// Path-style endpoint replacing the S3 staging buckets.
    #[arg(long, env = "TILEROLL_STAGING_ENDPOINT")]
    pub staging_endpoint: Option<String>,

    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: String,

    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    #[arg(long, env = "AZURE_AUTHORITY_HOST", default_value = DEFAULT_AUTHORITY)]
    pub authority: String,

    /// JSON object of the secrets referenced by the config.
    #[arg(long, env = "SECRETS_CONTEXT", hide_env_values = true)]
    pub secrets_context: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "tileroll=debug"
        } else {
            "tileroll=info"
        }
    }
}
