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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latency readings of one test, all in milliseconds. Each field is found
/// (or not) independently of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub min_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

impl LatencyBreakdown {
    pub fn is_empty(&self) -> bool {
        [self.min_ms, self.avg_ms, self.max_ms, self.p95_ms, self.p99_ms]
            .iter()
            .all(Option::is_none)
    }
}

/// One fio test's readings as extracted from a single artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetricRecord {
    /// e.g. "Sequential Read", or "Mixed RW (Write)" for one side of a mixed run.
    pub test_name: String,

    /// Operations per second.
    pub iops: Option<f64>,

    /// Normalized to MiB/s.
    pub bandwidth_mib_s: Option<f64>,

    pub latency: LatencyBreakdown,
}

impl RawMetricRecord {
    /// A record with every reading missing.
    pub fn missing(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            ..Default::default()
        }
    }

    pub fn has_any_metric(&self) -> bool {
        self.iops.is_some() || self.bandwidth_mib_s.is_some() || !self.latency.is_empty()
    }
}

/// One pgbench run's readings.
///
/// A skipped or failed run is a record with every field `None`, never a
/// zero-filled one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionalMetricRecord {
    //--------------------------------------------------------
    // Summary figures
    //--------------------------------------------------------
    pub tps: Option<f64>,
    pub latency_avg_ms: Option<f64>,
    pub latency_stddev_ms: Option<f64>,
    pub transactions_processed: Option<u64>,

    //--------------------------------------------------------
    // Run description, when pgbench printed it
    //--------------------------------------------------------
    pub failed_transactions: Option<u64>,
    pub scaling_factor: Option<u64>,
    pub clients: Option<u64>,
    pub connection_time_ms: Option<f64>,

    /// Latency percentiles in ms keyed by percentile ("50th", "99th", ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub percentiles_ms: BTreeMap<String, f64>,
}

impl TransactionalMetricRecord {
    pub fn is_empty(&self) -> bool {
        self.tps.is_none()
            && self.latency_avg_ms.is_none()
            && self.latency_stddev_ms.is_none()
            && self.transactions_processed.is_none()
            && self.failed_transactions.is_none()
            && self.scaling_factor.is_none()
            && self.clients.is_none()
            && self.connection_time_ms.is_none()
            && self.percentiles_ms.is_empty()
    }

    /// Whether any of the summary figures that get aggregated is present.
    pub fn has_any_metric(&self) -> bool {
        self.tps.is_some()
            || self.latency_avg_ms.is_some()
            || self.latency_stddev_ms.is_some()
            || self.transactions_processed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_record_has_no_metrics() {
        let rec = RawMetricRecord::missing("Random Read");
        assert_eq!(rec.test_name, "Random Read");
        assert!(!rec.has_any_metric());
    }

    #[test]
    fn any_latency_field_counts_as_a_metric() {
        let mut rec = RawMetricRecord::missing("Random Read");
        rec.latency.p99_ms = Some(3.5);
        assert!(rec.has_any_metric());
    }

    #[test]
    fn missing_fields_serialize_as_null() {
        let rec = RawMetricRecord {
            test_name: "Sequential Write".into(),
            iops: Some(100.0),
            ..Default::default()
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["iops"], json!(100.0));
        assert_eq!(v["bandwidth_mib_s"], json!(null));
        assert_eq!(v["latency"]["p95_ms"], json!(null));
    }

    #[test]
    fn default_transactional_record_is_empty() {
        assert!(TransactionalMetricRecord::default().is_empty());
        let rec = TransactionalMetricRecord {
            clients: Some(32),
            ..Default::default()
        };
        assert!(!rec.is_empty());
        assert!(!rec.has_any_metric());
    }
}
