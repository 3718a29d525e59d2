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

//! Parsing of fio and pgbench benchmark output into per-test metric records,
//! and aggregation of those records across iterations and VMs into
//! mean / standard deviation figures.

pub mod aggregate;
pub mod error;
pub mod fio;
pub mod identity;
pub mod locator;
pub mod pgbench;
pub mod record;
pub mod report;
pub mod sheet;
pub mod units;

pub use aggregate::{
    aggregate, aggregate_dir, AggregatedStatistic, AggregationResult, ParsedArtifact,
    TestAggregate, TransactionalAggregate,
};
pub use error::{FioBenchError, Result};
pub use fio::{FioExtractor, WorkloadMode};
pub use identity::{IdentityResolver, Resolution};
pub use pgbench::PgbenchExtractor;
pub use record::{LatencyBreakdown, RawMetricRecord, TransactionalMetricRecord};
pub use report::{render_report, write_outputs, OutputPaths};
pub use sheet::{ResultsSheet, SheetContents, SheetReader, TestParams, SHEET_PREFIX};
