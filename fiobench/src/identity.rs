// Copyright (c) 2023-2025 Retake, Inc.
//
// This file is part of ParadeDB - Postgres for Search and Analytics
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 (AGPLv3) or (at your option)
// any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Working out which logical iteration an artifact belongs to, from its path
//! alone.
//!
//! Strategies are tried in order and the first one that recognizes the path
//! wins:
//!
//! 1. an enclosing directory named like `iter3`,
//! 2. the file name itself containing `iter3`,
//! 3. a `YYYYmmdd_HHMMSS` timestamp in the file name, hashed to a key,
//! 4. otherwise iteration 1.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Keys derived from timestamps live in `TIMESTAMP_KEY_BASE..TIMESTAMP_KEY_BASE * 2`
/// so they stand apart from ordinary iteration numbers.
pub const TIMESTAMP_KEY_BASE: u32 = 1000;

pub const DEFAULT_ITERATION: u32 = 1;

static ITERATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"iter(\d+)").expect("iteration marker pattern must compile"));

static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{8}_\d{6})").expect("timestamp pattern must compile"));

/// How an artifact's group key was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    IterationDirectory { iteration: u32 },
    IterationFileName { iteration: u32 },
    /// Not collision free: distinct timestamps can share a key.
    Timestamp { stamp: String, key: u32 },
    Default,
}

impl Resolution {
    pub fn key(&self) -> u32 {
        match self {
            Resolution::IterationDirectory { iteration }
            | Resolution::IterationFileName { iteration } => *iteration,
            Resolution::Timestamp { key, .. } => *key,
            Resolution::Default => DEFAULT_ITERATION,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::IterationDirectory { iteration } => {
                write!(f, "iteration {iteration} (directory)")
            }
            Resolution::IterationFileName { iteration } => {
                write!(f, "iteration {iteration} (file name)")
            }
            Resolution::Timestamp { stamp, key } => write!(f, "group {key} (timestamp {stamp})"),
            Resolution::Default => write!(f, "iteration {DEFAULT_ITERATION} (default)"),
        }
    }
}

pub trait IdentityStrategy {
    fn resolve(&self, path: &Path) -> Option<Resolution>;
}

fn iteration_in(name: &str) -> Option<u32> {
    ITERATION_MARKER
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Closest enclosing directory whose name carries `iter<N>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryMarker;

impl IdentityStrategy for DirectoryMarker {
    fn resolve(&self, path: &Path) -> Option<Resolution> {
        path.parent()?
            .ancestors()
            .filter_map(|dir| dir.file_name()?.to_str())
            .find_map(iteration_in)
            .map(|iteration| Resolution::IterationDirectory { iteration })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameMarker;

impl IdentityStrategy for FileNameMarker {
    fn resolve(&self, path: &Path) -> Option<Resolution> {
        let name = path.file_name()?.to_str()?;
        iteration_in(name).map(|iteration| Resolution::IterationFileName { iteration })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampHash;

impl IdentityStrategy for TimestampHash {
    fn resolve(&self, path: &Path) -> Option<Resolution> {
        let name = path.file_name()?.to_str()?;
        let stamp = TIMESTAMP.captures(name)?.get(1)?.as_str();
        Some(Resolution::Timestamp {
            stamp: stamp.to_string(),
            key: timestamp_key(stamp),
        })
    }
}

/// FNV-1a folded into `TIMESTAMP_KEY_BASE..TIMESTAMP_KEY_BASE * 2`.
pub fn timestamp_key(stamp: &str) -> u32 {
    let hash = stamp.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    });
    TIMESTAMP_KEY_BASE + (hash % u64::from(TIMESTAMP_KEY_BASE)) as u32
}

pub struct IdentityResolver {
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DirectoryMarker),
            Box::new(FileNameMarker),
            Box::new(TimestampHash),
        ])
    }
}

impl IdentityResolver {
    pub fn new(strategies: Vec<Box<dyn IdentityStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn resolve(&self, path: &Path) -> Resolution {
        self.strategies
            .iter()
            .find_map(|s| s.resolve(path))
            .unwrap_or(Resolution::Default)
    }
}
