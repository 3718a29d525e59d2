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

//! Extraction of IOPS, bandwidth and latency readings from fio's
//! human-readable ("normal") output.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::FioBenchError;
use crate::locator::{found, FieldLocator};
use crate::record::{LatencyBreakdown, RawMetricRecord};
use crate::units::{normalize_bandwidth, normalize_latency, LatencyUnit};

/// Whether a run drove one direction only or read and write concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadMode {
    Single,
    Mixed,
}

/// The patterns used to find each reading. Swap one out when a fio release
/// changes how that reading is printed.
#[derive(Debug, Clone)]
pub struct FioLocators {
    /// Group 1: value, group 2: optional `k`/`M` multiplier.
    pub iops: FieldLocator,
    /// Group 1: value, group 2: unit such as `MiB/s`.
    pub bandwidth: FieldLocator,
    /// Groups 1-3: min, max, avg of the completion latency block.
    pub clat: FieldLocator,
    pub clat_unit: FieldLocator,
    pub p95: FieldLocator,
    pub p99: FieldLocator,
    pub percentile_unit: FieldLocator,
    pub write_marker: Regex,
    pub read_marker: Regex,
}

fn builtin(field: &'static str, pattern: &str) -> FieldLocator {
    FieldLocator::new(field, pattern).expect("built-in fio pattern must compile")
}

static DEFAULT_LOCATORS: Lazy<FioLocators> = Lazy::new(|| FioLocators {
    iops: builtin("iops", r"(?i)IOPS=\s*([\d.]+)([km]?)"),
    bandwidth: builtin("bandwidth", r"(?i)\bBW=\s*([\d.]+)\s*([a-z]+/s)"),
    clat: builtin(
        "clat",
        r"(?s)clat.*?min=\s*([\d.]+)\D*max=\s*([\d.]+)\D*avg=\s*([\d.]+)",
    ),
    clat_unit: builtin("clat_unit", r"clat\s*\((\w+)\)"),
    p95: builtin("p95", r"95\.00th=\[\s*([\d.]+)\]"),
    p99: builtin("p99", r"99\.00th=\[\s*([\d.]+)\]"),
    percentile_unit: builtin("percentile_unit", r"percentiles\s*\((\w+)\)"),
    write_marker: Regex::new(r"(?i)\bwrite\b").expect("built-in fio pattern must compile"),
    read_marker: Regex::new(r"(?i)\bread\b").expect("built-in fio pattern must compile"),
});

impl Default for FioLocators {
    fn default() -> Self {
        DEFAULT_LOCATORS.clone()
    }
}

/// The two halves of a mixed read+write run.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedRecords {
    pub write: RawMetricRecord,
    pub read: RawMetricRecord,
}

impl MixedRecords {
    pub fn missing(base_name: &str) -> Self {
        Self {
            write: RawMetricRecord::missing(format!("{base_name} (Write)")),
            read: RawMetricRecord::missing(format!("{base_name} (Read)")),
        }
    }

    pub fn into_vec(self) -> Vec<RawMetricRecord> {
        vec![self.write, self.read]
    }
}

#[derive(Debug, Clone, Default)]
pub struct FioExtractor {
    locators: FioLocators,
}

impl FioExtractor {
    pub fn new(locators: FioLocators) -> Self {
        Self { locators }
    }

    /// Extract a single-direction report. Every field that cannot be found
    /// is left missing; this never fails as a whole.
    pub fn extract(&self, text: &str, test_name: &str) -> RawMetricRecord {
        RawMetricRecord {
            test_name: test_name.to_string(),
            iops: self.iops(text),
            bandwidth_mib_s: self.bandwidth(text),
            latency: self.latency(text),
        }
    }

    /// Split a mixed report at its write and read markers and extract each
    /// half on its own.
    pub fn extract_mixed(&self, text: &str, base_name: &str) -> MixedRecords {
        let l = &self.locators;
        let write_name = format!("{base_name} (Write)");
        let read_name = format!("{base_name} (Read)");
        MixedRecords {
            write: section(text, &l.write_marker, &l.read_marker)
                .map(|s| self.extract(s, &write_name))
                .unwrap_or_else(|| RawMetricRecord::missing(write_name.as_str())),
            read: section(text, &l.read_marker, &l.write_marker)
                .map(|s| self.extract(s, &read_name))
                .unwrap_or_else(|| RawMetricRecord::missing(read_name.as_str())),
        }
    }

    pub fn extract_report(
        &self,
        text: &str,
        test_name: &str,
        mode: WorkloadMode,
    ) -> Vec<RawMetricRecord> {
        match mode {
            WorkloadMode::Single => vec![self.extract(text, test_name)],
            WorkloadMode::Mixed => self.extract_mixed(text, test_name).into_vec(),
        }
    }

    /// Read a fio output file and extract it. A file that cannot be read
    /// yields fully missing records.
    pub fn extract_file(
        &self,
        path: &Path,
        test_name: &str,
        mode: WorkloadMode,
    ) -> Vec<RawMetricRecord> {
        match fs::read_to_string(path) {
            Ok(text) => self.extract_report(&text, test_name, mode),
            Err(source) => {
                let err = FioBenchError::ArtifactUnreadable {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(%err, test_name, "fio output unreadable, recording as missing");
                match mode {
                    WorkloadMode::Single => vec![RawMetricRecord::missing(test_name)],
                    WorkloadMode::Mixed => MixedRecords::missing(test_name).into_vec(),
                }
            }
        }
    }

    fn iops(&self, text: &str) -> Option<f64> {
        let caps = found(self.locators.iops.captures(text))?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let scale = match caps.get(2).map(|m| m.as_str()) {
            Some("k") | Some("K") => 1_000.0,
            Some("m") | Some("M") => 1_000_000.0,
            _ => 1.0,
        };
        Some(value * scale)
    }

    fn bandwidth(&self, text: &str) -> Option<f64> {
        let caps = found(self.locators.bandwidth.captures(text))?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = caps.get(2)?.as_str();
        Some(normalize_bandwidth(value, unit))
    }

    /// min/avg/max come from the `clat` block, p95/p99 from the percentile
    /// table; either may be present without the other.
    pub fn latency(&self, text: &str) -> LatencyBreakdown {
        let l = &self.locators;
        let mut out = LatencyBreakdown::default();

        if let Some(caps) = found(l.clat.captures(text)) {
            let unit = found(l.clat_unit.locate(text));
            let ms = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .map(|v| to_millis(v, unit))
            };
            out.min_ms = ms(1);
            out.max_ms = ms(2);
            out.avg_ms = ms(3);
        }

        let pct_unit = found(l.percentile_unit.locate(text));
        out.p95_ms = found(l.p95.locate_f64(text)).map(|v| to_millis(v, pct_unit));
        out.p99_ms = found(l.p99.locate_f64(text)).map(|v| to_millis(v, pct_unit));

        out
    }
}

/// fio prints latencies in microseconds unless the block says otherwise.
fn to_millis(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some(unit) => normalize_latency(value, unit),
        None => LatencyUnit::Microseconds.to_millis(value),
    }
}

/// The text from the first `start` marker up to the next `stop` marker after
/// it, or to the end of the text.
fn section<'t>(text: &'t str, start: &Regex, stop: &Regex) -> Option<&'t str> {
    let begin = start.find(text)?;
    let end = stop
        .find_at(text, begin.end())
        .map(|m| m.start())
        .unwrap_or(text.len());
    Some(&text[begin.start()..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RANDREAD: &str = "\
Random Read: (groupid=0, jobs=4): err= 0: pid=4121: Mon Mar  3 10:12:01 2025
  read: IOPS=48213, BW=188MiB/s (197MB/s)(11.0GiB/60002msec)
    slat (usec): min=2, max=412, avg= 6.11, stdev= 3.02
    clat (usec): min=71, max=18231, avg=1320.45, stdev=402.18
     lat (usec): min=80, max=18240, avg=1326.80, stdev=402.30
    clat percentiles (usec):
     |  1.00th=[  506],  5.00th=[  766], 10.00th=[  889], 20.00th=[ 1045],
     | 90.00th=[ 1795], 95.00th=[ 2040], 99.00th=[ 2671], 99.50th=[ 2999],
   bw (  KiB/s): min=180112, max=199321, per=100.00%, avg=192871.17
  cpu          : usr=4.31%, sys=12.02%, ctx=1702394, majf=0, minf=301

Run status group 0 (all jobs):
   READ: bw=188MiB/s (197MB/s), 188MiB/s-188MiB/s (197MB/s-197MB/s), io=11.0GiB
";

    #[test]
    fn single_mode_reads_every_field() {
        let rec = FioExtractor::default().extract(RANDREAD, "Random Read");
        assert_eq!(rec.test_name, "Random Read");
        assert_eq!(rec.iops, Some(48213.0));
        assert_eq!(rec.bandwidth_mib_s, Some(188.0));
        assert_eq!(rec.latency.min_ms, Some(0.071));
        assert_eq!(rec.latency.max_ms, Some(18.231));
        assert!((rec.latency.avg_ms.unwrap() - 1.32045).abs() < 1e-9);
        assert_eq!(rec.latency.p95_ms, Some(2.04));
        assert_eq!(rec.latency.p99_ms, Some(2.671));
    }

    #[rstest]
    #[case("IOPS=1234.5", 1234.5)]
    #[case("read: iops=77, bw=1MiB/s", 77.0)]
    #[case("write: IOPS=12.5k, BW=48.8MiB/s", 12_500.0)]
    #[case("IOPS=2M", 2_000_000.0)]
    fn iops_is_taken_verbatim_or_scaled_by_suffix(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(FioExtractor::default().extract(text, "t").iops, Some(expected));
    }

    #[test]
    fn absent_tokens_are_missing_not_zero() {
        let rec = FioExtractor::default().extract("fio: job failed to start", "Sequential Read");
        assert_eq!(rec, RawMetricRecord::missing("Sequential Read"));
    }

    #[test]
    fn kib_bandwidth_is_normalized() {
        let rec = FioExtractor::default().extract("write: IOPS=10, BW=2048KiB/s", "t");
        assert_eq!(rec.bandwidth_mib_s, Some(2.0));
    }

    #[test]
    fn explicit_clat_unit_is_honoured() {
        let text = "clat (nsec): min=500000, max=3000000, avg=1500000.0, stdev=1";
        let lat = FioExtractor::default().latency(text);
        assert_eq!(lat.min_ms, Some(0.5));
        assert_eq!(lat.max_ms, Some(3.0));
        assert_eq!(lat.avg_ms, Some(1.5));
        assert_eq!(lat.p95_ms, None);
    }

    #[test]
    fn percentiles_without_clat_block() {
        let text = "     | 95.00th=[ 4000], 99.00th=[ 9000], 99.90th=[12000]";
        let lat = FioExtractor::default().latency(text);
        assert_eq!(lat.min_ms, None);
        assert_eq!(lat.avg_ms, None);
        assert_eq!(lat.p95_ms, Some(4.0));
        assert_eq!(lat.p99_ms, Some(9.0));
    }

    #[test]
    fn percentile_unit_annotation_is_read() {
        let text = "clat percentiles (msec):\n | 95.00th=[ 4], 99.00th=[ 9]";
        let lat = FioExtractor::default().latency(text);
        assert_eq!(lat.p95_ms, Some(4.0));
        assert_eq!(lat.p99_ms, Some(9.0));
    }

    #[test]
    fn mixed_sections_do_not_bleed_into_each_other() {
        let text = "WRITE: bw=500MiB/s (524MB/s)\nREAD: bw=200MiB/s (209MB/s)\n";
        let mixed = FioExtractor::default().extract_mixed(text, "Mixed RW");
        assert_eq!(mixed.write.test_name, "Mixed RW (Write)");
        assert_eq!(mixed.read.test_name, "Mixed RW (Read)");
        assert_eq!(mixed.write.bandwidth_mib_s, Some(500.0));
        assert_eq!(mixed.read.bandwidth_mib_s, Some(200.0));
    }

    #[test]
    fn mixed_fio_output_splits_per_direction() {
        let text = "\
Mixed RW: (groupid=0, jobs=4): err= 0: pid=9
  read: IOPS=6000, BW=23.4MiB/s (24.6MB/s)
    clat (usec): min=100, max=9000, avg=2000.00, stdev=10
     | 95.00th=[ 3000], 99.00th=[ 5000]
  write: IOPS=4000, BW=15.6MiB/s (16.4MB/s)
    clat (msec): min=1, max=20, avg=4.00, stdev=1
     | 95.00th=[ 7000], 99.00th=[ 11000]
Run status group 0 (all jobs):
   READ: bw=23.4MiB/s
  WRITE: bw=15.6MiB/s
";
        let mixed = FioExtractor::default().extract_mixed(text, "Mixed RW");
        assert_eq!(mixed.read.iops, Some(6000.0));
        assert_eq!(mixed.read.latency.avg_ms, Some(2.0));
        assert_eq!(mixed.read.latency.p99_ms, Some(5.0));
        assert_eq!(mixed.write.iops, Some(4000.0));
        assert_eq!(mixed.write.bandwidth_mib_s, Some(15.6));
        assert_eq!(mixed.write.latency.avg_ms, Some(4.0));
        assert_eq!(mixed.write.latency.p95_ms, Some(7.0));
    }

    #[test]
    fn mixed_without_a_read_marker_leaves_read_missing() {
        let mixed = FioExtractor::default().extract_mixed("write: IOPS=10", "Mixed RW");
        assert_eq!(mixed.write.iops, Some(10.0));
        assert_eq!(mixed.read, RawMetricRecord::missing("Mixed RW (Read)"));
    }

    #[test]
    fn unreadable_file_yields_missing_records_for_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does_not_exist.txt");
        let recs = FioExtractor::default().extract_file(&path, "Mixed RW", WorkloadMode::Mixed);
        assert_eq!(recs, MixedRecords::missing("Mixed RW").into_vec());
        assert!(recs.iter().all(|r| !r.has_any_metric()));
    }

    #[test]
    fn custom_locator_replaces_one_field() {
        let mut locators = FioLocators::default();
        locators.iops = FieldLocator::new("iops", r"ops/s:\s*([\d.]+)()").unwrap();
        let rec = FioExtractor::new(locators).extract("ops/s: 99 BW=1MiB/s", "t");
        assert_eq!(rec.iops, Some(99.0));
        assert_eq!(rec.bandwidth_mib_s, Some(1.0));
    }
}
