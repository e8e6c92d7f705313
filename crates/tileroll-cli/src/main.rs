// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tileroll - rolls GIS files out to Mapbox accounts.
//!
//! Every run publishes a new generation of tilesets, hands the accesses to
//! the permissions store and then retires the generations that are no
//! longer needed. See `tileroll --help` for the settings.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tileroll_cli::{Args, RunSettings, run};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present, before the arguments read their fallbacks
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_filter().into()),
        )
        .init();

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received, cancelling the run");
                cancel.cancel();
            }
        }
    });

    info!(config = %args.config.display(), "Starting tileroll");
    match run(&args, &RunSettings::default(), &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
