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
use thiserror::Error;

/// Every condition the parsing and aggregation pipeline can run into.
///
/// Only [`FioBenchError::NoInputData`] and [`FioBenchError::NoParsableData`]
/// ever leave [`crate::aggregate::aggregate`]; the rest are logged and
/// recovered from where they happen.
#[derive(Debug, Error)]
pub enum FioBenchError {
    #[error("unrecognized unit `{0}`")]
    UnrecognizedUnit(String),

    #[error("field `{0}` not found in report text")]
    FieldMissing(&'static str),

    #[error("could not read artifact {path}: {source}")]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no result artifacts found to aggregate")]
    NoInputData,

    #[error("found {0} result artifact(s) but none yielded usable metrics")]
    NoParsableData(usize),
}

pub type Result<T> = std::result::Result<T, FioBenchError>;
