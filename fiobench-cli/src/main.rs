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

mod cli;
mod subcommand;

use anyhow::Result;
use cli::{Cli, Subcommand};
use dotenvy::dotenv;
use fiobench::TestParams;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load env vars from a .env in any parent folder.
    dotenv().ok();

    let cli = Cli::default();
    match cli.subcommand {
        Subcommand::Aggregate {
            results_dir,
            output_dir,
            output_name,
            pattern,
        } => subcommand::aggregate(&results_dir, output_dir, &output_name, &pattern),
        Subcommand::Collect {
            results_dir,
            suite,
            size,
            bs,
            mix,
            io_depth,
            runtime,
            pgbench_output,
        } => {
            let params = TestParams {
                suite,
                size,
                block_size: fiobench::sheet::format_block_size(&bs),
                write_mix: mix,
                io_depth,
                runtime_secs: runtime,
            };
            subcommand::collect(results_dir, params, pgbench_output)
        }
    }
}
