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

//! Results sheets: the per-run text artifact that aggregation consumes.
//!
//! A sheet carries one block per fio test, written in fio's own dialect so
//! reading it back goes through the same extractor as raw fio output:
//!
//! ```text
//! === Test 4: Random Read ===
//!   read: IOPS=48213, BW=188MiB/s
//!     clat (usec): min=71.000, max=18231.000, avg=1320.450
//!      | 95.00th=[2040.000], 99.00th=[2671.000]
//! ```
//!
//! A block runs until the next line starting with `===`. Mixed tests are
//! headed `=== Test 5: Mixed RW [mixed] ===` and hold a `write:` and a
//! `read:` section. Human-readable tables and the pgbench block follow.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use strum::Display;
use tracing::{info, warn};

use crate::error::FioBenchError;
use crate::fio::{FioExtractor, MixedRecords, WorkloadMode};
use crate::pgbench::PgbenchExtractor;
use crate::record::{RawMetricRecord, TransactionalMetricRecord};

pub const SHEET_PREFIX: &str = "results_sheet_";

static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^=== Test \d+: (.+?)( \[mixed\])? ===\s*$")
        .expect("block header pattern must compile")
});

static LEGACY_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(.+?)\s+(\S+)\s+(\S+)\s+(\S+)\s*$")
        .expect("legacy row pattern must compile")
});

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w-]").expect("file name pattern must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

/// What a planned test drives: one direction, or read and write at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedKind {
    Single(Direction),
    Mixed,
}

impl PlannedKind {
    pub fn mode(self) -> WorkloadMode {
        match self {
            PlannedKind::Single(_) => WorkloadMode::Single,
            PlannedKind::Mixed => WorkloadMode::Mixed,
        }
    }
}

/// One entry of the standard test plan.
#[derive(Debug, Clone, Copy)]
pub struct PlannedTest {
    pub name: &'static str,
    /// fio `--rw` value the test runs with.
    pub rw: &'static str,
    pub kind: PlannedKind,
}

pub const STANDARD_PLAN: [PlannedTest; 5] = [
    PlannedTest {
        name: "Sequential Write",
        rw: "write",
        kind: PlannedKind::Single(Direction::Write),
    },
    PlannedTest {
        name: "Sequential Read",
        rw: "read",
        kind: PlannedKind::Single(Direction::Read),
    },
    PlannedTest {
        name: "Random Write",
        rw: "randwrite",
        kind: PlannedKind::Single(Direction::Write),
    },
    PlannedTest {
        name: "Random Read",
        rw: "randread",
        kind: PlannedKind::Single(Direction::Read),
    },
    PlannedTest {
        name: "Mixed RW",
        rw: "randrw",
        kind: PlannedKind::Mixed,
    },
];

/// Replace anything but word characters and `-` with `_`, trim underscores
/// and keep at most 50 characters.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILE_CHARS
        .replace_all(name, "_")
        .trim_matches('_')
        .chars()
        .take(50)
        .collect()
}

/// A bare number is taken as KiB.
pub fn format_block_size(bs: &str) -> String {
    if !bs.is_empty() && bs.chars().all(|c| c.is_ascii_digit() || c == '.') {
        format!("{bs}k")
    } else {
        bs.to_string()
    }
}

/// Where the fio output of `test_name` for `suite` is expected.
pub fn fio_output_path(results_dir: &Path, test_name: &str, suite: &str) -> PathBuf {
    results_dir.join(format!(
        "{}_{}_results.txt",
        sanitize_file_name(test_name),
        sanitize_file_name(suite)
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestParams {
    pub suite: String,
    pub size: String,
    pub block_size: String,
    /// Percentage of writes in the mixed test.
    pub write_mix: String,
    pub io_depth: u32,
    pub runtime_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetTest {
    Single {
        number: usize,
        direction: Direction,
        record: RawMetricRecord,
    },
    Mixed {
        number: usize,
        name: String,
        records: MixedRecords,
    },
}

impl SheetTest {
    fn rows(&self) -> Vec<(usize, &RawMetricRecord)> {
        match self {
            SheetTest::Single { number, record, .. } => vec![(*number, record)],
            SheetTest::Mixed {
                number, records, ..
            } => vec![(*number, &records.write), (*number, &records.read)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSheet {
    pub params: TestParams,
    pub created_at: NaiveDateTime,
    pub tests: Vec<SheetTest>,
    /// `None` when pgbench was not run or produced nothing.
    pub pgbench: Option<TransactionalMetricRecord>,
}

impl ResultsSheet {
    /// Build a sheet from the fio outputs of the standard plan found in
    /// `results_dir`, plus an optional pgbench stdout capture.
    pub fn collect(
        results_dir: &Path,
        params: TestParams,
        created_at: NaiveDateTime,
        pgbench_output: Option<&Path>,
    ) -> Self {
        let fio = FioExtractor::default();
        let mut tests = Vec::with_capacity(STANDARD_PLAN.len());

        for (idx, planned) in STANDARD_PLAN.iter().enumerate() {
            let number = idx + 1;
            let path = fio_output_path(results_dir, planned.name, &params.suite);
            info!(test = planned.name, rw = planned.rw, path = %path.display(), "collecting fio output");
            let mut records = fio
                .extract_file(&path, planned.name, planned.kind.mode())
                .into_iter();
            let test = match planned.kind {
                PlannedKind::Single(direction) => SheetTest::Single {
                    number,
                    direction,
                    record: records
                        .next()
                        .unwrap_or_else(|| RawMetricRecord::missing(planned.name)),
                },
                PlannedKind::Mixed => {
                    let mut both = MixedRecords::missing(planned.name);
                    if let (Some(write), Some(read)) = (records.next(), records.next()) {
                        both = MixedRecords { write, read };
                    }
                    SheetTest::Mixed {
                        number,
                        name: planned.name.to_string(),
                        records: both,
                    }
                }
            };
            tests.push(test);
        }

        let pgbench = pgbench_output.and_then(|path| {
            let rec = PgbenchExtractor::default().extract_file(path);
            if rec.tps.is_none() {
                warn!(path = %path.display(), "pgbench output has no tps figure, leaving pgbench out of the sheet");
                return None;
            }
            Some(rec)
        });

        Self {
            params,
            created_at,
            tests,
            pgbench,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{SHEET_PREFIX}{}_{}.txt",
            sanitize_file_name(&self.params.suite),
            self.created_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create directory: {}", dir.display()))?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_string())
            .with_context(|| format!("Could not write results sheet: {}", path.display()))?;
        Ok(path)
    }
}

fn cell(v: Option<f64>, precision: usize) -> String {
    v.map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "N/A".to_string())
}

fn write_direction(f: &mut fmt::Formatter<'_>, dir: Direction, rec: &RawMetricRecord) -> fmt::Result {
    let mut head = Vec::new();
    if let Some(iops) = rec.iops {
        head.push(format!("IOPS={iops}"));
    }
    if let Some(bw) = rec.bandwidth_mib_s {
        head.push(format!("BW={bw}MiB/s"));
    }
    writeln!(f, "  {dir}: {}", head.join(", "))?;

    let lat = &rec.latency;
    let usec = |ms: f64| ms * 1000.0;
    if let (Some(min), Some(max), Some(avg)) = (lat.min_ms, lat.max_ms, lat.avg_ms) {
        writeln!(
            f,
            "    clat (usec): min={:.3}, max={:.3}, avg={:.3}",
            usec(min),
            usec(max),
            usec(avg)
        )?;
    }
    let mut pct = Vec::new();
    if let Some(p95) = lat.p95_ms {
        pct.push(format!("95.00th=[{:.3}]", usec(p95)));
    }
    if let Some(p99) = lat.p99_ms {
        pct.push(format!("99.00th=[{:.3}]", usec(p99)));
    }
    if !pct.is_empty() {
        writeln!(f, "     | {}", pct.join(", "))?;
    }
    Ok(())
}

impl fmt::Display for SheetTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetTest::Single {
                number,
                direction,
                record,
            } => {
                writeln!(f, "=== Test {number}: {} ===", record.test_name)?;
                write_direction(f, *direction, record)
            }
            SheetTest::Mixed {
                number,
                name,
                records,
            } => {
                writeln!(f, "=== Test {number}: {name} [mixed] ===")?;
                write_direction(f, Direction::Write, &records.write)?;
                write_direction(f, Direction::Read, &records.read)
            }
        }
    }
}

impl fmt::Display for ResultsSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        writeln!(f, "Results sheet: {}", p.suite)?;
        writeln!(f, "Test date: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f)?;
        writeln!(f, "Test parameters:")?;
        writeln!(f, "  - Suite name: {}", p.suite)?;
        writeln!(f, "  - Test file size: {}", p.size)?;
        writeln!(f, "  - Block size: {}", p.block_size)?;
        writeln!(f, "  - Write share in mixed test: {}%", p.write_mix)?;
        writeln!(f, "  - IO depth: {}", p.io_depth)?;
        match p.runtime_secs {
            Some(secs) => writeln!(f, "  - Runtime, s: {secs}")?,
            None => writeln!(f, "  - Runtime, s: auto")?,
        }

        for test in &self.tests {
            writeln!(f)?;
            write!(f, "{test}")?;
        }

        let rows: Vec<_> = self.tests.iter().flat_map(SheetTest::rows).collect();

        let columns = format!(
            "{:<10} {:<30} {:<15} {:<20} {:<15}",
            "Test No.", "Test Name", "IOPS", "Bandwidth (MiB/s)", "Latency (ms)"
        );
        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(columns.len()))?;
        writeln!(f, "Main results: {}", p.suite)?;
        writeln!(f, "{columns}")?;
        writeln!(f, "{}", "_".repeat(columns.len()))?;
        for (number, rec) in &rows {
            writeln!(
                f,
                "{:<10} {:<30} {:<15} {:<20} {:<15}",
                number,
                rec.test_name,
                cell(rec.iops, 1),
                cell(rec.bandwidth_mib_s, 1),
                cell(rec.latency.avg_ms, 2)
            )?;
        }

        let columns = format!(
            "{:<10} {:<30} {:<15} {:<15} {:<15} {:<15} {:<15}",
            "Test No.", "Test Name", "Min (ms)", "Avg (ms)", "Max (ms)", "95th (ms)", "99th (ms)"
        );
        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(columns.len()))?;
        writeln!(f, "Latency details")?;
        writeln!(f, "{columns}")?;
        writeln!(f, "{}", "_".repeat(columns.len()))?;
        for (number, rec) in &rows {
            let lat = &rec.latency;
            writeln!(
                f,
                "{:<10} {:<30} {:<15} {:<15} {:<15} {:<15} {:<15}",
                number,
                rec.test_name,
                cell(lat.min_ms, 2),
                cell(lat.avg_ms, 2),
                cell(lat.max_ms, 2),
                cell(lat.p95_ms, 2),
                cell(lat.p99_ms, 2)
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(60))?;
        match &self.pgbench {
            Some(pg) => {
                let int = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into());
                let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into());
                writeln!(f, "pgbench (OLTP)")?;
                writeln!(f, "{}", "=".repeat(60))?;
                writeln!(f, "TPS (Transactions Per Second): {}", num(pg.tps))?;
                writeln!(f, "Latency Avg: {} ms", num(pg.latency_avg_ms))?;
                writeln!(f, "Latency Stddev: {} ms", num(pg.latency_stddev_ms))?;
                writeln!(f, "Transactions Processed: {}", int(pg.transactions_processed))?;
                writeln!(f, "Failed Transactions: {}", int(pg.failed_transactions))?;
                writeln!(f, "Scaling Factor: {}", int(pg.scaling_factor))?;
                writeln!(f, "Clients: {}", int(pg.clients))?;
                writeln!(f, "Initial Connection Time: {} ms", num(pg.connection_time_ms))?;
                if !pg.percentiles_ms.is_empty() {
                    writeln!(f, "Latency percentiles:")?;
                    for (p, v) in &pg.percentiles_ms {
                        writeln!(f, "  {p}: {v} ms")?;
                    }
                }
            }
            None => {
                writeln!(f, "pgbench: not run or failed")?;
                writeln!(f, "{}", "=".repeat(60))?;
            }
        }
        Ok(())
    }
}

/// What one sheet yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetContents {
    pub tests: Vec<RawMetricRecord>,
    pub transactional: Option<TransactionalMetricRecord>,
}

impl SheetContents {
    pub fn has_any_metric(&self) -> bool {
        self.tests.iter().any(RawMetricRecord::has_any_metric)
            || self
                .transactional
                .as_ref()
                .is_some_and(TransactionalMetricRecord::has_any_metric)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SheetReader {
    fio: FioExtractor,
    pgbench: PgbenchExtractor,
}

struct Block<'t> {
    name: &'t str,
    mode: WorkloadMode,
    body: String,
}

fn blocks(text: &str) -> Vec<Block<'_>> {
    let mut out: Vec<Block<'_>> = Vec::new();
    let mut open = false;
    for line in text.lines() {
        if let Some(caps) = BLOCK_HEADER.captures(line) {
            let Some(name) = caps.get(1) else {
                open = false;
                continue;
            };
            let mode = if caps.get(2).is_some() {
                WorkloadMode::Mixed
            } else {
                WorkloadMode::Single
            };
            out.push(Block {
                name: name.as_str(),
                mode,
                body: String::new(),
            });
            open = true;
        } else if line.starts_with("===") {
            open = false;
        } else if open {
            if let Some(block) = out.last_mut() {
                block.body.push_str(line);
                block.body.push('\n');
            }
        }
    }
    out
}

/// Whether the legacy table's IOPS column is headed `kIOPS`. Those sheets
/// stored the number in front of fio's `k`/`M` suffix with the suffix
/// dropped, so a row may be in operations or in thousands of operations.
fn legacy_iops_in_thousands(text: &str) -> bool {
    text.lines()
        .find(|l| l.contains("Test No."))
        .is_some_and(|header| header.split_whitespace().any(|col| col == "kIOPS"))
}

/// Rows of the first table headed `Test No.`, as older sheets carry them:
/// `<no> <name> <iops> <bandwidth> <latency>`.
fn legacy_rows(text: &str) -> Vec<RawMetricRecord> {
    if legacy_iops_in_thousands(text) {
        warn!(
            "legacy sheet has a kIOPS column; its IOPS values lost fio's k/M suffix \
             and are kept as written, so they may not share a scale with newer sheets"
        );
    }
    let num = |s: &str| s.parse::<f64>().ok();
    text.lines()
        .skip_while(|l| !l.contains("Test No."))
        .skip(1)
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| LEGACY_ROW.captures(l))
        .map(|caps| {
            let mut rec = RawMetricRecord::missing(caps[2].trim());
            rec.iops = num(&caps[3]);
            rec.bandwidth_mib_s = num(&caps[4]);
            rec.latency.avg_ms = num(&caps[5]);
            rec
        })
        .collect()
}

impl SheetReader {
    pub fn new(fio: FioExtractor, pgbench: PgbenchExtractor) -> Self {
        Self { fio, pgbench }
    }

    pub fn parse(&self, text: &str) -> SheetContents {
        let blocks = blocks(text);
        let tests = if blocks.is_empty() {
            legacy_rows(text)
        } else {
            blocks
                .iter()
                .flat_map(|b| self.fio.extract_report(&b.body, b.name, b.mode))
                .collect()
        };
        let transactional = Some(self.pgbench.extract(text)).filter(|r| !r.is_empty());
        SheetContents {
            tests,
            transactional,
        }
    }

    pub fn read(&self, path: &Path) -> Result<SheetContents, FioBenchError> {
        let text = fs::read_to_string(path).map_err(|source| FioBenchError::ArtifactUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse(&text))
    }
}
