// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tileroll command line runner.
//!
//! Loads a deployment config, fetches the GIS files it names, rolls them
//! out to every Mapbox account as a new tileset generation, publishes the
//! resulting accesses and finally retires the superseded tilesets.

pub mod cli;
pub mod config;
pub mod grouping;
pub mod run;

pub use cli::Args;
pub use config::{ConfigError, DeploymentConfig};
pub use grouping::{GroupingError, MalformedFile, group_vector_files};
pub use run::{RunSettings, fetch_gis_files, run};
