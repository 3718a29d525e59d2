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

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use fiobench::{aggregate_dir, render_report, write_outputs, ResultsSheet, TestParams};
use tracing::info;

pub fn aggregate(
    results_dir: &Path,
    output_dir: Option<PathBuf>,
    output_name: &str,
    pattern: &str,
) -> Result<()> {
    if !results_dir.is_dir() {
        bail!("Directory not found: {}", results_dir.display());
    }

    info!(root = %results_dir.display(), pattern, "aggregating results");
    let result = aggregate_dir(results_dir, pattern)
        .with_context(|| format!("Could not aggregate results under {}", results_dir.display()))?;

    let generated_at = Local::now().naive_local();
    println!("{}", render_report(&result, generated_at));

    let output_dir = output_dir.unwrap_or_else(|| results_dir.to_path_buf());
    let paths = write_outputs(&result, &output_dir, output_name, generated_at)?;
    println!("Report saved to: {}", paths.report.display());
    println!("JSON saved to: {}", paths.json.display());

    Ok(())
}

fn default_results_dir() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME is not set, pass --results-dir")?;
    Ok(PathBuf::from(home).join("results"))
}

pub fn collect(
    results_dir: Option<PathBuf>,
    params: TestParams,
    pgbench_output: Option<PathBuf>,
) -> Result<()> {
    let results_dir = match results_dir {
        Some(dir) => dir,
        None => default_results_dir()?,
    };

    let sheet = ResultsSheet::collect(
        &results_dir,
        params,
        Local::now().naive_local(),
        pgbench_output.as_deref(),
    );
    let path = sheet.write_to(&results_dir)?;

    println!("{sheet}");
    println!("Results sheet saved to: {}", path.display());
    Ok(())
}
