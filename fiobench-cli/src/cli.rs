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

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "fiobench", version, about = "Collect and aggregate fio / pgbench results")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Subcommand,
}

// Allows `Cli::default()` to parse the process arguments.
impl Default for Cli {
    fn default() -> Self {
        Self::parse()
    }
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Aggregate every results sheet under a directory tree.
    Aggregate {
        /// Root directory holding the per-iteration / per-VM results.
        #[arg(env = "FIOBENCH_RESULTS_DIR")]
        results_dir: PathBuf,
        /// Where to write the report. Defaults to the results directory.
        #[arg(long, env = "FIOBENCH_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
        #[arg(long, default_value = "aggregated_report", env = "FIOBENCH_OUTPUT_NAME")]
        output_name: String,
        /// File name prefix of the sheets to pick up.
        #[arg(long, default_value = fiobench::SHEET_PREFIX, env = "FIOBENCH_PATTERN")]
        pattern: String,
    },
    /// Build a results sheet from the fio outputs of one run.
    Collect {
        /// Defaults to `$HOME/results`.
        #[arg(long, env = "FIOBENCH_RESULTS_DIR")]
        results_dir: Option<PathBuf>,
        #[arg(long, default_value = "default test", env = "FIOBENCH_SUITE")]
        suite: String,
        #[arg(long, default_value = "10G", env = "FIOBENCH_SIZE")]
        size: String,
        /// Block size; a bare number is read as KiB.
        #[arg(long, default_value = "4k", env = "FIOBENCH_BS")]
        bs: String,
        /// Percentage of writes in the mixed test.
        #[arg(long, default_value = "60", env = "FIOBENCH_MIX")]
        mix: String,
        #[arg(long, default_value_t = 64, env = "FIOBENCH_IO_DEPTH")]
        io_depth: u32,
        #[arg(long, env = "FIOBENCH_RUNTIME")]
        runtime: Option<u32>,
        /// Captured pgbench stdout to include in the sheet.
        #[arg(long, env = "FIOBENCH_PGBENCH_OUTPUT")]
        pgbench_output: Option<PathBuf>,
    },
}
