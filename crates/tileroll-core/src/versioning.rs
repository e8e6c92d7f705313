// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tileset generations.
//!
//! Every upload publishes a new generation of an account's tilesets, encoded
//! as a `-<version>` suffix on the tileset name. Versions are scoped per
//! account and start at 1, so the first real upload of an account becomes
//! version 2.
//!
//! When publishing generation `n + 1`, generation `n` is kept alive as a
//! rollback buffer; only generations `<= n - 1` and unversioned tilesets are
//! retired.

use crate::types::Tileset;

/// Separator between a tileset name and its version.
pub const VERSION_SEPARATOR: char = '-';

/// Longest tileset id the tiling service accepts, excluding `<owner>.`.
pub const MAX_TILESET_ID_LEN: usize = 32;

/// Version encoded in the suffix of `name`, if any.
///
/// The suffix is everything after the last separator and must consist of
/// ASCII digits only.
pub fn parse_version(name: &str) -> Option<u32> {
    let (_, suffix) = name.rsplit_once(VERSION_SEPARATOR)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Highest version among `tilesets`, never lower than 1.
///
/// Unversioned tilesets are ignored.
pub fn highest_version<'a>(tilesets: impl IntoIterator<Item = &'a Tileset>) -> u32 {
    tilesets
        .into_iter()
        .filter_map(|t| parse_version(&t.name))
        .fold(1, u32::max)
}

/// Whether `tileset` must be retired when everything at or below
/// `retire_at_or_below` is superseded.
pub fn is_stale(tileset: &Tileset, retire_at_or_below: u32) -> bool {
    match parse_version(&tileset.name) {
        Some(version) => version <= retire_at_or_below,
        None => true,
    }
}

/// `name` with the version suffix for `version` appended.
pub fn versioned_name(name: &str, version: u32) -> String {
    format!("{name}{VERSION_SEPARATOR}{version}")
}

/// Tileset id of `name` within the account of `owner`.
///
/// Characters other than ASCII alphanumerics, `-` and `_` become `-`. Names
/// longer than [`MAX_TILESET_ID_LEN`] are shortened from the end of the base
/// name so that a version suffix always survives.
pub fn tileset_id(name: &str, owner: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    // `sanitized` is ASCII from here on, so byte offsets are char offsets.
    let shortened = if sanitized.len() <= MAX_TILESET_ID_LEN {
        sanitized
    } else {
        match parse_version(&sanitized).and_then(|_| sanitized.rfind(VERSION_SEPARATOR)) {
            Some(at) if sanitized.len() - at < MAX_TILESET_ID_LEN => {
                let suffix = &sanitized[at..];
                let keep = MAX_TILESET_ID_LEN - suffix.len();
                format!("{}{}", &sanitized[..keep], suffix)
            }
            _ => sanitized[..MAX_TILESET_ID_LEN].to_string(),
        }
    };

    format!("{owner}.{shortened}")
}

/// Versions involved in publishing the next generation of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPlan {
    /// Highest live version (at least 1).
    pub current: u32,
    /// Version given to the tilesets about to be uploaded.
    pub next: u32,
    /// Live tilesets at or below this version are retired.
    pub retire_at_or_below: u32,
}

impl VersionPlan {
    /// Plan the next generation from the currently live tilesets.
    pub fn from_live<'a>(live: impl IntoIterator<Item = &'a Tileset>) -> Self {
        Self::from_current(highest_version(live))
    }

    pub fn from_current(current: u32) -> Self {
        Self {
            current,
            next: current.saturating_add(1),
            retire_at_or_below: current.saturating_sub(1),
        }
    }

    /// Live tilesets that become stale once `next` is published.
    pub fn stale<'a>(&self, live: &'a [Tileset]) -> impl Iterator<Item = &'a Tileset> + use<'a> {
        let threshold = self.retire_at_or_below;
        live.iter().filter(move |t| is_stale(t, threshold))
    }
}
