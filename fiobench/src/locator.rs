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

//! Field locators: one named pattern per metric, so a change in how fio or
//! pgbench prints a value means swapping a single locator.

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{FioBenchError, Result};

#[derive(Debug, Clone)]
pub struct FieldLocator {
    field: &'static str,
    pattern: Regex,
}

impl FieldLocator {
    pub fn new(field: &'static str, pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self::from_regex(field, Regex::new(pattern)?))
    }

    pub fn from_regex(field: &'static str, pattern: Regex) -> Self {
        Self { field, pattern }
    }

    pub fn captures<'t>(&self, text: &'t str) -> Result<Captures<'t>> {
        self.pattern
            .captures(text)
            .ok_or(FioBenchError::FieldMissing(self.field))
    }

    pub fn captures_iter<'r, 't>(
        &'r self,
        text: &'t str,
    ) -> impl Iterator<Item = Captures<'t>> + 'r
    where
        't: 'r,
    {
        self.pattern.captures_iter(text)
    }

    /// The first capture group of the first match.
    pub fn locate<'t>(&self, text: &'t str) -> Result<&'t str> {
        self.captures(text)?
            .get(1)
            .map(|m| m.as_str())
            .ok_or(FioBenchError::FieldMissing(self.field))
    }

    /// Like [`FieldLocator::locate`], parsed as a float. A capture that does
    /// not parse counts as missing.
    pub fn locate_f64(&self, text: &str) -> Result<f64> {
        self.locate(text)?
            .trim()
            .parse::<f64>()
            .map_err(|_| FioBenchError::FieldMissing(self.field))
    }

    pub fn locate_u64(&self, text: &str) -> Result<u64> {
        self.locate(text)?
            .trim()
            .parse::<u64>()
            .map_err(|_| FioBenchError::FieldMissing(self.field))
    }
}

/// Alternative locators for one field, tried in order.
#[derive(Debug, Clone)]
pub struct LocatorChain {
    field: &'static str,
    locators: Vec<FieldLocator>,
}

impl LocatorChain {
    pub fn new(field: &'static str, locators: Vec<FieldLocator>) -> Self {
        Self { field, locators }
    }

    pub fn locate_f64(&self, text: &str) -> Result<f64> {
        self.locators
            .iter()
            .find_map(|l| l.locate_f64(text).ok())
            .ok_or(FioBenchError::FieldMissing(self.field))
    }

    pub fn locate_u64(&self, text: &str) -> Result<u64> {
        self.locators
            .iter()
            .find_map(|l| l.locate_u64(text).ok())
            .ok_or(FioBenchError::FieldMissing(self.field))
    }
}

/// Turn a locator result into an optional value, noting what was missing.
pub(crate) fn found<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            debug!(%err, "field left missing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_reports_the_missing_field_by_name() {
        let loc = FieldLocator::new("iops", r"IOPS=([\d.]+)").unwrap();
        assert_eq!(loc.locate_f64("read: IOPS=12.5, BW=1MiB/s").unwrap(), 12.5);
        assert!(matches!(
            loc.locate_f64("nothing here"),
            Err(FioBenchError::FieldMissing("iops"))
        ));
    }

    #[test]
    fn unparsable_capture_is_missing_not_zero() {
        let loc = FieldLocator::new("tps", r"TPS:\s*(\S+)").unwrap();
        assert!(loc.locate_f64("TPS: N/A").is_err());
        assert_eq!(found(loc.locate_f64("TPS: N/A")), None);
    }

    #[test]
    fn chain_falls_back_in_order() {
        let chain = LocatorChain::new(
            "tps",
            vec![
                FieldLocator::new("tps", r"TPS[^:\n]*:\s*([\d.]+)").unwrap(),
                FieldLocator::new("tps", r"tps = ([\d.]+)").unwrap(),
            ],
        );
        assert_eq!(chain.locate_f64("tps = 812.4 (without initial)").unwrap(), 812.4);
        assert_eq!(
            chain
                .locate_f64("TPS (Transactions Per Second): 10.0\ntps = 812.4")
                .unwrap(),
            10.0
        );
        assert!(chain.locate_f64("").is_err());
    }
}
