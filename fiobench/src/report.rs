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

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use itertools::Itertools;
use tracing::info;

use crate::aggregate::{AggregatedStatistic, AggregationResult};

const WIDTH: usize = 80;

/// `mean ±stdev`, right aligned, or `N/A` when nothing was pooled.
fn mean_stdev(stat: Option<AggregatedStatistic>, precision: usize) -> String {
    match stat {
        Some(s) => format!("{:>8.p$} ±{:>6.p$}", s.mean, s.stdev, p = precision),
        None => format!("{:>16}", "N/A"),
    }
}

fn count(stat: Option<AggregatedStatistic>) -> usize {
    stat.map_or(0, |s| s.sample_count)
}

/// `<label>: mean ± stdev<unit> (n=<samples>)`; each figure carries its own count.
fn stat_line(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    stat: Option<AggregatedStatistic>,
    precision: usize,
    unit: &str,
) -> fmt::Result {
    match stat {
        Some(s) => writeln!(
            f,
            "{label}: {:.p$} ± {:.p$}{unit} (n={})",
            s.mean,
            s.stdev,
            s.sample_count,
            p = precision
        ),
        None => writeln!(f, "{label}: N/A (n=0)"),
    }
}

/// The fixed-width plaintext report of an aggregation.
pub struct Report<'a> {
    pub result: &'a AggregationResult,
    pub generated_at: NaiveDateTime,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;
        let rule = "=".repeat(WIDTH);

        writeln!(f, "{rule}")?;
        writeln!(f, "AGGREGATED TEST RESULTS")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Report generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(
            f,
            "Iterations: {} ({})",
            r.iterations.len(),
            r.iterations.iter().join(", ")
        )?;
        writeln!(f, "VMs per iteration: {}", r.num_vms)?;
        writeln!(f)?;

        if !r.tests.is_empty() {
            writeln!(f, "{rule}")?;
            writeln!(f, "fio - disk subsystem (mean values)")?;
            writeln!(f, "{rule}")?;
            writeln!(f)?;
            writeln!(
                f,
                "{:<30} {:<18} {:<18} {:<18} {}",
                "Test Name", "IOPS", "Bandwidth (MiB/s)", "Latency (ms)", "Samples"
            )?;
            writeln!(f, "{}", "-".repeat(WIDTH + 20))?;
            for (name, t) in &r.tests {
                writeln!(
                    f,
                    "{:<30} {}   {}   {}   {}/{}/{}",
                    name,
                    mean_stdev(t.iops, 1),
                    mean_stdev(t.bandwidth_mib_s, 1),
                    mean_stdev(t.latency_ms, 2),
                    count(t.iops),
                    count(t.bandwidth_mib_s),
                    count(t.latency_ms),
                )?;
            }
            writeln!(f)?;

            if r
                .tests
                .values()
                .any(|t| t.latency_p95_ms.is_some() || t.latency_p99_ms.is_some())
            {
                writeln!(
                    f,
                    "{:<30} {:<18} {:<18} {}",
                    "Latency percentiles", "95th (ms)", "99th (ms)", "Samples"
                )?;
                writeln!(f, "{}", "-".repeat(WIDTH))?;
                for (name, t) in &r.tests {
                    writeln!(
                        f,
                        "{:<30} {}   {}   {}/{}",
                        name,
                        mean_stdev(t.latency_p95_ms, 2),
                        mean_stdev(t.latency_p99_ms, 2),
                        count(t.latency_p95_ms),
                        count(t.latency_p99_ms),
                    )?;
                }
                writeln!(f)?;
            }
        }

        writeln!(f, "{rule}")?;
        match &r.transactional {
            Some(pg) => {
                writeln!(f, "pgbench - PostgreSQL OLTP (mean values)")?;
                writeln!(f, "{rule}")?;
                writeln!(f)?;
                stat_line(f, "TPS (Transactions Per Second)", Some(pg.tps), 2, "")?;
                stat_line(f, "Latency Avg", pg.latency_avg_ms, 3, " ms")?;
                stat_line(f, "Latency Stddev", pg.latency_stddev_ms, 3, " ms")?;
                stat_line(f, "Transactions Processed", pg.transactions_processed, 0, "")?;
            }
            None => {
                writeln!(f, "pgbench - PostgreSQL OLTP")?;
                writeln!(f, "{rule}")?;
                writeln!(f)?;
                writeln!(
                    f,
                    "No pgbench data: transactional benchmark not run or produced no data"
                )?;
            }
        }
        writeln!(f)?;

        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Note: values are 'mean ± stdev'; Samples and n= count the measurements behind each figure"
        )?;
        writeln!(f, "{rule}")
    }
}

pub fn render_report(result: &AggregationResult, generated_at: NaiveDateTime) -> String {
    Report {
        result,
        generated_at,
    }
    .to_string()
}

pub fn to_json(result: &AggregationResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub report: PathBuf,
    pub json: PathBuf,
}

/// Write `<base_name>.txt` and `<base_name>.json` into `dir`.
pub fn write_outputs(
    result: &AggregationResult,
    dir: &Path,
    base_name: &str,
    generated_at: NaiveDateTime,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Could not create output directory: {}", dir.display()))?;

    let report = dir.join(format!("{base_name}.txt"));
    fs::write(&report, render_report(result, generated_at))
        .with_context(|| format!("Could not write report: {}", report.display()))?;

    let json = dir.join(format!("{base_name}.json"));
    let body = to_json(result).context("Could not serialize aggregation result")?;
    fs::write(&json, body).with_context(|| format!("Could not write JSON: {}", json.display()))?;

    info!(report = %report.display(), json = %json.display(), "wrote aggregated outputs");
    Ok(OutputPaths { report, json })
}
