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

//! Extraction of pgbench summary figures, either from the labelled block of
//! a results sheet or straight from pgbench's own stdout.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::FioBenchError;
use crate::locator::{found, FieldLocator, LocatorChain};
use crate::record::TransactionalMetricRecord;

#[derive(Debug, Clone)]
pub struct PgbenchLocators {
    pub tps: LocatorChain,
    pub latency_avg: LocatorChain,
    pub latency_stddev: LocatorChain,
    pub transactions: LocatorChain,
    pub failed: LocatorChain,
    pub scaling_factor: LocatorChain,
    pub clients: LocatorChain,
    pub connection_time: LocatorChain,
    /// Group 1: percentile number, group 2: value in ms.
    pub percentiles: Vec<FieldLocator>,
}

/// A results-sheet label first, then the phrase pgbench itself prints.
fn chain(field: &'static str, sheet_label: &str, pgbench_stdout: &str) -> LocatorChain {
    LocatorChain::new(
        field,
        vec![
            FieldLocator::new(field, sheet_label).expect("built-in pgbench pattern must compile"),
            FieldLocator::new(field, pgbench_stdout)
                .expect("built-in pgbench pattern must compile"),
        ],
    )
}

static DEFAULT_LOCATORS: Lazy<PgbenchLocators> = Lazy::new(|| PgbenchLocators {
    tps: chain("tps", r"(?m)^\s*TPS[^:\n]*:\s*([\d.]+)", r"tps = ([\d.]+)"),
    latency_avg: chain(
        "latency_avg",
        r"(?mi)^\s*Latency Avg[^:\n]*:\s*([\d.]+)",
        r"latency average = ([\d.]+) ms",
    ),
    latency_stddev: chain(
        "latency_stddev",
        r"(?mi)^\s*Latency Stddev[^:\n]*:\s*([\d.]+)",
        r"latency stddev = ([\d.]+) ms",
    ),
    transactions: chain(
        "transactions_processed",
        r"(?mi)^\s*Transactions Processed:\s*(\d+)",
        r"number of transactions actually processed: (\d+)",
    ),
    failed: chain(
        "failed_transactions",
        r"(?mi)^\s*Failed Transactions:\s*(\d+)",
        r"number of failed transactions: (\d+)",
    ),
    scaling_factor: chain(
        "scaling_factor",
        r"(?mi)^\s*Scaling Factor:\s*(\d+)",
        r"scaling factor: (\d+)",
    ),
    clients: chain(
        "clients",
        r"(?mi)^\s*Clients:\s*(\d+)",
        r"number of clients: (\d+)",
    ),
    connection_time: chain(
        "connection_time",
        r"(?mi)^\s*Initial Connection Time:\s*([\d.]+)",
        r"initial connection time = ([\d.]+) ms",
    ),
    percentiles: vec![
        FieldLocator::new("percentile", r"(?m)^\s*(\d+)th:\s*([\d.]+) ms")
            .expect("built-in pgbench pattern must compile"),
        FieldLocator::new("percentile", r"latency (\d+)th percentile = ([\d.]+) ms")
            .expect("built-in pgbench pattern must compile"),
    ],
});

impl Default for PgbenchLocators {
    fn default() -> Self {
        DEFAULT_LOCATORS.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PgbenchExtractor {
    locators: PgbenchLocators,
}

impl PgbenchExtractor {
    pub fn new(locators: PgbenchLocators) -> Self {
        Self { locators }
    }

    pub fn extract(&self, text: &str) -> TransactionalMetricRecord {
        let l = &self.locators;

        let mut percentiles_ms = BTreeMap::new();
        for loc in &l.percentiles {
            for caps in loc.captures_iter(text) {
                let (Some(p), Some(v)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                if let Ok(v) = v.as_str().parse::<f64>() {
                    percentiles_ms
                        .entry(format!("{}th", p.as_str()))
                        .or_insert(v);
                }
            }
        }

        TransactionalMetricRecord {
            tps: found(l.tps.locate_f64(text)),
            latency_avg_ms: found(l.latency_avg.locate_f64(text)),
            latency_stddev_ms: found(l.latency_stddev.locate_f64(text)),
            transactions_processed: found(l.transactions.locate_u64(text)),
            failed_transactions: found(l.failed.locate_u64(text)),
            scaling_factor: found(l.scaling_factor.locate_u64(text)),
            clients: found(l.clients.locate_u64(text)),
            connection_time_ms: found(l.connection_time.locate_f64(text)),
            percentiles_ms,
        }
    }

    /// Extract a captured pgbench stdout. An unreadable capture is logged and
    /// treated as a run that produced nothing.
    pub fn extract_file(&self, path: &Path) -> TransactionalMetricRecord {
        match fs::read_to_string(path) {
            Ok(text) => self.extract(&text),
            Err(source) => {
                let err = FioBenchError::ArtifactUnreadable {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(%err, "pgbench output unreadable");
                TransactionalMetricRecord::default()
            }
        }
    }
}
