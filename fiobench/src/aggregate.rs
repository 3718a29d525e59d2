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

//! Pooling of per-artifact readings into mean / standard deviation figures
//! per test.
//!
//! [`aggregate`] is a pure function of the parsed artifacts; [`aggregate_dir`]
//! adds discovery and reading of the artifacts under a results root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{FioBenchError, Result};
use crate::identity::{IdentityResolver, Resolution};
use crate::record::{RawMetricRecord, TransactionalMetricRecord};
use crate::sheet::{SheetContents, SheetReader};

/// Mean and sample standard deviation of the samples that were present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatistic {
    pub mean: f64,
    /// `n - 1` denominator; `0.0` for a single sample.
    pub stdev: f64,
    pub sample_count: usize,
}

impl AggregatedStatistic {
    /// `None` when there is nothing to average.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;

        let stdev = if samples.len() > 1 {
            let mut sum_sq = 0f64;
            for &val in samples {
                let diff = val - mean;
                sum_sq += diff * diff;
            }
            (sum_sq / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            mean,
            stdev,
            sample_count: samples.len(),
        })
    }
}

/// Pooled figures of one fio test. A metric no artifact supplied is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestAggregate {
    pub iops: Option<AggregatedStatistic>,
    pub bandwidth_mib_s: Option<AggregatedStatistic>,
    /// Average completion latency.
    pub latency_ms: Option<AggregatedStatistic>,
    pub latency_p95_ms: Option<AggregatedStatistic>,
    pub latency_p99_ms: Option<AggregatedStatistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionalAggregate {
    pub tps: AggregatedStatistic,
    pub latency_avg_ms: Option<AggregatedStatistic>,
    pub latency_stddev_ms: Option<AggregatedStatistic>,
    pub transactions_processed: Option<AggregatedStatistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub tests: BTreeMap<String, TestAggregate>,
    /// `None` when no artifact carried a usable pgbench `tps`.
    pub transactional: Option<TransactionalAggregate>,
    /// Group keys seen, ascending.
    pub iterations: Vec<u32>,
    /// Artifacts in the first group; groups are assumed equally sized.
    pub num_vms: usize,
}

/// One artifact after reading and identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArtifact {
    pub path: PathBuf,
    pub identity: Resolution,
    /// Empty when the file could not be read.
    pub contents: SheetContents,
}

/// Artifacts sharing a group key, i.e. samples of the same iteration.
struct RunGroup<'a> {
    members: Vec<&'a SheetContents>,
}

impl<'a> RunGroup<'a> {
    fn records_by_test(&self) -> BTreeMap<&'a str, Vec<&'a RawMetricRecord>> {
        let mut by_test: BTreeMap<&'a str, Vec<&'a RawMetricRecord>> = BTreeMap::new();
        for &member in &self.members {
            for rec in &member.tests {
                by_test.entry(rec.test_name.as_str()).or_default().push(rec);
            }
        }
        by_test
    }

    fn transactional(&self) -> impl Iterator<Item = &'a TransactionalMetricRecord> + '_ {
        self.members
            .iter()
            .copied()
            .filter_map(|m| m.transactional.as_ref())
    }
}

fn pool<'r, T: 'r>(
    records: impl IntoIterator<Item = &'r T>,
    metric: impl Fn(&T) -> Option<f64>,
) -> Option<AggregatedStatistic> {
    let samples: Vec<f64> = records.into_iter().filter_map(metric).collect();
    AggregatedStatistic::from_samples(&samples)
}

/// Group artifacts by identity, then pool every present sample of each
/// metric per test name across all groups.
pub fn aggregate(artifacts: &[ParsedArtifact]) -> Result<AggregationResult> {
    if artifacts.is_empty() {
        return Err(FioBenchError::NoInputData);
    }

    let mut groups: BTreeMap<u32, RunGroup<'_>> = BTreeMap::new();
    for artifact in artifacts {
        if !artifact.contents.has_any_metric() {
            warn!(path = %artifact.path.display(), "artifact has no usable metrics, skipping");
            continue;
        }
        groups
            .entry(artifact.identity.key())
            .or_insert_with(|| RunGroup { members: vec![] })
            .members
            .push(&artifact.contents);
    }

    let Some(first) = groups.values().next() else {
        return Err(FioBenchError::NoParsableData(artifacts.len()));
    };
    let num_vms = first.members.len();
    let sizes: BTreeSet<usize> = groups.values().map(|g| g.members.len()).collect();
    if sizes.len() > 1 {
        warn!(
            sizes = %sizes.iter().join(", "),
            "iteration groups differ in size, reporting the first group's size"
        );
    }

    let mut per_test: BTreeMap<&str, Vec<&RawMetricRecord>> = BTreeMap::new();
    for group in groups.values() {
        for (name, records) in group.records_by_test() {
            per_test.entry(name).or_default().extend(records);
        }
    }

    let tests = per_test
        .into_iter()
        .map(|(name, records)| {
            let agg = TestAggregate {
                iops: pool(records.iter().copied(), |r| r.iops),
                bandwidth_mib_s: pool(records.iter().copied(), |r| r.bandwidth_mib_s),
                latency_ms: pool(records.iter().copied(), |r| r.latency.avg_ms),
                latency_p95_ms: pool(records.iter().copied(), |r| r.latency.p95_ms),
                latency_p99_ms: pool(records.iter().copied(), |r| r.latency.p99_ms),
            };
            (name.to_string(), agg)
        })
        .collect();

    let pg: Vec<&TransactionalMetricRecord> =
        groups.values().flat_map(|g| g.transactional()).collect();
    let transactional = pool(pg.iter().copied(), |r| r.tps).map(|tps| TransactionalAggregate {
        tps,
        latency_avg_ms: pool(pg.iter().copied(), |r| r.latency_avg_ms),
        latency_stddev_ms: pool(pg.iter().copied(), |r| r.latency_stddev_ms),
        transactions_processed: pool(pg.iter().copied(), |r| {
            r.transactions_processed.map(|t| t as f64)
        }),
    });
    if transactional.is_none() {
        warn!("no pgbench data in any artifact: transactional benchmark not run or produced no data");
    }

    Ok(AggregationResult {
        tests,
        transactional,
        iterations: groups.keys().copied().collect(),
        num_vms,
    })
}

/// Every file under `root` (recursively) whose name starts with `prefix`
/// and ends in `.txt`, in path order.
pub fn discover_artifacts(root: &Path, prefix: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(%err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".txt"))
        })
        .map(|entry| entry.into_path())
        .sorted()
        .collect()
}

/// Read and resolve each artifact. Identity is resolved on the full path, so
/// an iteration marker on the results root itself applies to every sheet
/// below it. Unreadable files are logged and kept with empty contents.
pub fn load_artifacts(
    paths: &[PathBuf],
    reader: &SheetReader,
    resolver: &IdentityResolver,
) -> Vec<ParsedArtifact> {
    paths
        .iter()
        .map(|path| {
            let identity = resolver.resolve(path);
            info!(path = %path.display(), %identity, "reading results sheet");
            let contents = reader.read(path).unwrap_or_else(|err| {
                warn!(%err, "skipping unreadable artifact");
                SheetContents::default()
            });
            ParsedArtifact {
                path: path.clone(),
                identity,
                contents,
            }
        })
        .collect()
}

/// Discover, read and aggregate every results sheet under `root`.
pub fn aggregate_dir(root: &Path, prefix: &str) -> Result<AggregationResult> {
    let paths = discover_artifacts(root, prefix);
    info!(count = paths.len(), root = %root.display(), "discovered result artifacts");
    let artifacts = load_artifacts(
        &paths,
        &SheetReader::default(),
        &IdentityResolver::default(),
    );
    aggregate(&artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DEFAULT_ITERATION;
    use std::fs;

    fn artifact(iteration: u32, tests: Vec<RawMetricRecord>) -> ParsedArtifact {
        ParsedArtifact {
            path: PathBuf::from(format!("iter{iteration}/results_sheet.txt")),
            identity: Resolution::IterationDirectory { iteration },
            contents: SheetContents {
                tests,
                transactional: None,
            },
        }
    }

    fn iops(name: &str, v: f64) -> RawMetricRecord {
        RawMetricRecord {
            iops: Some(v),
            ..RawMetricRecord::missing(name)
        }
    }

    fn pg(tps: Option<f64>, latency_avg_ms: Option<f64>) -> TransactionalMetricRecord {
        TransactionalMetricRecord {
            tps,
            latency_avg_ms,
            ..Default::default()
        }
    }

    #[test]
    fn single_sample_has_zero_stdev() {
        let stat = AggregatedStatistic::from_samples(&[42.0]).unwrap();
        assert_eq!(stat.mean, 42.0);
        assert_eq!(stat.stdev, 0.0);
        assert_eq!(stat.sample_count, 1);
        assert_eq!(AggregatedStatistic::from_samples(&[]), None);
    }

    #[test]
    fn zero_artifacts_is_no_input() {
        assert!(matches!(aggregate(&[]), Err(FioBenchError::NoInputData)));
    }

    #[test]
    fn nothing_parsable_is_distinct_from_no_input() {
        let artifacts = vec![
            artifact(1, vec![RawMetricRecord::missing("Random Read")]),
            artifact(2, vec![]),
        ];
        assert!(matches!(
            aggregate(&artifacts),
            Err(FioBenchError::NoParsableData(2))
        ));
    }

    #[test]
    fn three_samples_in_one_group() {
        let artifacts: Vec<_> = [100.0, 200.0, 300.0]
            .into_iter()
            .map(|v| artifact(1, vec![iops("Random Read", v)]))
            .collect();
        let result = aggregate(&artifacts).unwrap();

        let stat = result.tests["Random Read"].iops.unwrap();
        assert_eq!(stat.mean, 200.0);
        assert_eq!(stat.sample_count, 3);
        assert!((stat.stdev - 100.0).abs() < 1e-9);
        assert_eq!(result.iterations, vec![1]);
        assert_eq!(result.num_vms, 3);
    }

    #[test]
    fn samples_pool_across_groups() {
        let artifacts = vec![
            artifact(2, vec![iops("Sequential Read", 10.0)]),
            artifact(1, vec![iops("Sequential Read", 20.0)]),
            artifact(1, vec![iops("Sequential Read", 30.0), iops("Random Write", 5.0)]),
            artifact(2, vec![iops("Sequential Read", 40.0)]),
        ];
        let result = aggregate(&artifacts).unwrap();
        assert_eq!(result.iterations, vec![1, 2]);
        assert_eq!(result.num_vms, 2);
        assert_eq!(result.tests["Sequential Read"].iops.unwrap().mean, 25.0);
        assert_eq!(result.tests["Sequential Read"].iops.unwrap().sample_count, 4);
        assert_eq!(result.tests["Random Write"].iops.unwrap().sample_count, 1);
    }

    #[test]
    fn missing_samples_are_not_counted_or_zeroed() {
        let mut only_bw = RawMetricRecord::missing("Random Read");
        only_bw.bandwidth_mib_s = Some(50.0);
        let artifacts = vec![
            artifact(1, vec![iops("Random Read", 100.0)]),
            artifact(1, vec![only_bw]),
        ];
        let result = aggregate(&artifacts).unwrap();
        let agg = &result.tests["Random Read"];
        assert_eq!(agg.iops.unwrap().sample_count, 1);
        assert_eq!(agg.iops.unwrap().mean, 100.0);
        assert_eq!(agg.bandwidth_mib_s.unwrap().sample_count, 1);
        assert_eq!(agg.latency_ms, None);
    }

    #[test]
    fn unusable_artifacts_do_not_count_toward_group_size() {
        let artifacts = vec![
            artifact(1, vec![iops("Random Read", 1.0)]),
            artifact(1, vec![RawMetricRecord::missing("Random Read")]),
        ];
        assert_eq!(aggregate(&artifacts).unwrap().num_vms, 1);
    }

    #[test]
    fn transactional_pools_only_present_values() {
        let mut a = artifact(1, vec![iops("Random Read", 1.0)]);
        a.contents.transactional = Some(pg(Some(1000.0), Some(10.0)));
        let mut b = artifact(2, vec![iops("Random Read", 2.0)]);
        b.contents.transactional = Some(pg(Some(3000.0), None));
        let c = artifact(3, vec![iops("Random Read", 3.0)]);

        let t = aggregate(&[a, b, c]).unwrap().transactional.unwrap();
        assert_eq!(t.tps.mean, 2000.0);
        assert_eq!(t.tps.sample_count, 2);
        assert_eq!(t.latency_avg_ms.unwrap().sample_count, 1);
        assert_eq!(t.latency_stddev_ms, None);
    }

    #[test]
    fn transactional_is_absent_without_tps() {
        let mut a = artifact(1, vec![iops("Random Read", 1.0)]);
        a.contents.transactional = Some(pg(None, Some(12.0)));
        let result = aggregate(&[a]).unwrap();
        assert_eq!(result.transactional, None);
        assert_eq!(result.tests["Random Read"].iops.unwrap().mean, 1.0);
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn block(iops: u32) -> String {
        format!("=== Test 4: Random Read ===\n  read: IOPS={iops}, BW=10MiB/s\n")
    }

    #[test]
    fn discovery_is_recursive_and_prefix_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("iter1/vm1/results_sheet_a.txt"), "");
        write(&root.join("results_sheet_b.txt"), "");
        write(&root.join("iter1/Random_Read_a_results.txt"), "");
        write(&root.join("results_sheet_c.json"), "");

        let found = discover_artifacts(root, "results_sheet_");
        assert_eq!(
            found,
            vec![
                root.join("iter1/vm1/results_sheet_a.txt"),
                root.join("results_sheet_b.txt"),
            ]
        );
    }

    #[test]
    fn aggregate_dir_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("iter1/vm1/results_sheet_s.txt"), &block(100));
        write(&root.join("iter1/vm2/results_sheet_s.txt"), &block(200));
        write(
            &root.join("iter2/vm1/results_sheet_s.txt"),
            &format!("{}\nTPS (Transactions Per Second): garbled\n", block(300)),
        );
        write(&root.join("iter2/vm2/results_sheet_s.txt"), &block(400));

        let result = aggregate_dir(root, "results_sheet_").unwrap();
        assert_eq!(result.iterations, vec![1, 2]);
        assert_eq!(result.num_vms, 2);
        let stat = result.tests["Random Read"].iops.unwrap();
        assert_eq!(stat.mean, 250.0);
        assert_eq!(stat.sample_count, 4);
        assert_eq!(result.tests["Random Read"].bandwidth_mib_s.unwrap().stdev, 0.0);
        assert_eq!(result.transactional, None);
    }

    #[test]
    fn iteration_marker_on_the_root_groups_every_sheet_below() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("iter3");
        write(&root.join("vm1/results_sheet_s_20250301_101500.txt"), &block(100));
        write(&root.join("vm2/results_sheet_s_20250301_101502.txt"), &block(300));

        let result = aggregate_dir(&root, "results_sheet_").unwrap();
        assert_eq!(result.iterations, vec![3]);
        assert_eq!(result.num_vms, 2);
        assert_eq!(result.tests["Random Read"].iops.unwrap().sample_count, 2);
    }

    #[test]
    fn unmarked_tree_falls_back_to_the_default_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("plain");
        write(&root.join("results_sheet_plain.txt"), &block(100));
        let result = aggregate_dir(&root, "results_sheet_").unwrap();
        assert_eq!(result.iterations, vec![DEFAULT_ITERATION]);
    }

    #[test]
    fn aggregate_dir_distinguishes_empty_from_unparsable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            aggregate_dir(dir.path(), "results_sheet_"),
            Err(FioBenchError::NoInputData)
        ));

        write(&dir.path().join("results_sheet_x.txt"), "fio crashed\n");
        assert!(matches!(
            aggregate_dir(dir.path(), "results_sheet_"),
            Err(FioBenchError::NoParsableData(1))
        ));
    }
}
