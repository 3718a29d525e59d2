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

//! Conversion of the latency and bandwidth units fio prints into the fixed
//! units every record carries: milliseconds and MiB/s.

use std::str::FromStr;

use strum::EnumString;
use tracing::warn;

use crate::error::{FioBenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LatencyUnit {
    #[strum(serialize = "nsec", serialize = "ns")]
    Nanoseconds,
    #[strum(serialize = "usec", serialize = "us")]
    Microseconds,
    #[strum(serialize = "msec", serialize = "ms")]
    Milliseconds,
}

impl LatencyUnit {
    pub fn to_millis(self, value: f64) -> f64 {
        match self {
            LatencyUnit::Nanoseconds => value / 1_000_000.0,
            LatencyUnit::Microseconds => value / 1_000.0,
            LatencyUnit::Milliseconds => value,
        }
    }
}

/// Bandwidth units with a known conversion. fio reports binary prefixes;
/// `GB/s` is treated as the binary gigabyte as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum BandwidthUnit {
    #[strum(serialize = "KiB/s")]
    KibPerSec,
    #[strum(serialize = "MiB/s")]
    MibPerSec,
    #[strum(serialize = "GiB/s", serialize = "GB/s")]
    GibPerSec,
}

impl BandwidthUnit {
    pub fn to_mib_per_sec(self, value: f64) -> f64 {
        match self {
            BandwidthUnit::KibPerSec => value / 1024.0,
            BandwidthUnit::MibPerSec => value,
            BandwidthUnit::GibPerSec => value * 1024.0,
        }
    }
}

pub fn try_normalize_latency(value: f64, unit: &str) -> Result<f64> {
    LatencyUnit::from_str(unit.trim())
        .map(|u| u.to_millis(value))
        .map_err(|_| FioBenchError::UnrecognizedUnit(unit.to_string()))
}

/// Convert a latency reading to milliseconds.
///
/// An unknown unit is logged and yields `0.0`, so a single odd token never
/// aborts extraction of the rest of the report.
pub fn normalize_latency(value: f64, unit: &str) -> f64 {
    try_normalize_latency(value, unit).unwrap_or_else(|err| {
        warn!(%err, value, "latency unit not recognized, using 0 ms");
        0.0
    })
}

pub fn try_normalize_bandwidth(value: f64, unit: &str) -> Result<f64> {
    BandwidthUnit::from_str(unit.trim())
        .map(|u| u.to_mib_per_sec(value))
        .map_err(|_| FioBenchError::UnrecognizedUnit(unit.to_string()))
}

/// Convert a bandwidth reading to MiB/s.
///
/// Unknown units pass the value through unconverted after logging it.
pub fn normalize_bandwidth(value: f64, unit: &str) -> f64 {
    try_normalize_bandwidth(value, unit).unwrap_or_else(|err| {
        warn!(%err, value, "bandwidth unit not recognized, keeping value as-is");
        value
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1_000_000.0, "nsec")]
    #[case(1_000.0, "usec")]
    #[case(1.0, "msec")]
    #[case(1_000.0, "USEC")]
    #[case(1_000.0, "us")]
    fn latency_units_agree_on_one_millisecond(#[case] value: f64, #[case] unit: &str) {
        assert!((normalize_latency(value, unit) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_latency_unit_yields_zero() {
        assert_eq!(normalize_latency(42.0, "fortnights"), 0.0);
        assert!(matches!(
            try_normalize_latency(42.0, "fortnights"),
            Err(FioBenchError::UnrecognizedUnit(u)) if u == "fortnights"
        ));
    }

    #[rstest]
    #[case(1024.0, "KiB/s", 1.0)]
    #[case(1.0, "GB/s", 1024.0)]
    #[case(2.0, "GiB/s", 2048.0)]
    #[case(512.5, "MiB/s", 512.5)]
    #[case(512.5, "mib/s", 512.5)]
    fn bandwidth_units_normalize_to_mib(
        #[case] value: f64,
        #[case] unit: &str,
        #[case] expected: f64,
    ) {
        assert_eq!(normalize_bandwidth(value, unit), expected);
    }

    #[test]
    fn unknown_bandwidth_unit_passes_through() {
        assert_eq!(normalize_bandwidth(300.0, "MB/s"), 300.0);
        assert!(try_normalize_bandwidth(300.0, "MB/s").is_err());
    }
}
