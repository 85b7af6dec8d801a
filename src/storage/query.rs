//! # Range Query Engine
//!
//! Point-in-time range queries over the partitioned dose-rate log.
//!
//! Given a date (`DD/MM/YYYY`), a 12-hour start time (`H:MM AM/PM`), and a
//! duration in minutes, locates the day's `doserate.jsonl`, scans every
//! line, and returns the samples whose embedded timestamp falls inside the
//! half-open window `[start, start + duration)`, ascending by timestamp.
//!
//! This is a deliberate O(file size) linear scan with no index: each file
//! covers at most one calendar day of short JSON lines.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::{debug, warn};

use super::partition::{partition_path, PartitionKind};
use super::writer::{resolve_offset, DOSE_RATE_FILE, TIMESTAMP_FORMAT};
use crate::error::{RadScopeError, Result};

/// Default query window when the caller does not specify one
pub const DEFAULT_DURATION_MINUTES: i64 = 10;

/// One sample returned by a range query
#[derive(Debug, Clone, PartialEq)]
pub struct DoseRateSample {
    /// Dose rate as stored (3 decimal places)
    pub dose_rate: f64,
    /// Formatted timestamp string as stored (`YYYY-MM-DD HH:mm:ss`)
    pub time_stamp: String,
    /// Parsed timestamp in epoch milliseconds (offset-adjusted)
    pub timestamp_millis: i64,
}

/// Range query engine over a dose-rate log store base directory.
///
/// Must be constructed with the same UTC offset as the writer that produced
/// the store, otherwise queried windows shift against the stored strings.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    base: PathBuf,
    offset: FixedOffset,
}

impl RangeQuery {
    /// Create a query engine rooted at `base`.
    ///
    /// * `utc_offset_minutes` - same semantics as
    ///   [`DoseRateLog::new`](super::writer::DoseRateLog::new)
    pub fn new<P: AsRef<Path>>(base: P, utc_offset_minutes: Option<i32>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            offset: resolve_offset(utc_offset_minutes),
        }
    }

    /// Query samples for `date` (`DD/MM/YYYY`) starting at `start_time`
    /// (`H:MM AM/PM`), spanning `duration_minutes`.
    ///
    /// Returns samples ascending by timestamp. A missing log file is a
    /// normal outcome and yields an empty vector, not an error. Lines that
    /// fail to parse or lack a numeric `doseRate` are skipped with a
    /// warning; the scan continues.
    ///
    /// # Errors
    ///
    /// Returns [`RadScopeError::Query`] for unparsable `date`/`start_time`
    /// inputs, [`RadScopeError::Io`] if an existing file cannot be read.
    pub async fn query(
        &self,
        date: &str,
        start_time: &str,
        duration_minutes: i64,
    ) -> Result<Vec<DoseRateSample>> {
        let day = NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y")
            .map_err(|e| RadScopeError::Query(format!("bad date {:?}: {}", date, e)))?;
        let time = NaiveTime::parse_from_str(start_time.trim(), "%I:%M %p")
            .map_err(|e| RadScopeError::Query(format!("bad start time {:?}: {}", start_time, e)))?;

        let start_millis = self.to_millis(day.and_time(time));
        let end_millis = start_millis + duration_minutes * 60_000;

        let path = partition_path(&self.base, PartitionKind::DoseRate, day).join(DOSE_RATE_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // No data for this window is an expected outcome
                debug!("no dose-rate log at {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut all = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Some(sample) => all.push(sample),
                None => warn!(
                    "skipping malformed record at {}:{}",
                    path.display(),
                    lineno + 1
                ),
            }
        }

        let mut in_range: Vec<DoseRateSample> = all
            .iter()
            .filter(|s| s.timestamp_millis >= start_millis && s.timestamp_millis < end_millis)
            .cloned()
            .collect();

        // Append order should already be ascending; sort defensively anyway.
        in_range.sort_by_key(|s| s.timestamp_millis);

        if in_range.is_empty() && !all.is_empty() {
            // Diagnostic only: report the span the file actually covers.
            let min = all.iter().map(|s| s.timestamp_millis).min().unwrap_or(0);
            let max = all.iter().map(|s| s.timestamp_millis).max().unwrap_or(0);
            debug!(
                "no samples in [{}, {}); file spans [{}, {}]",
                start_millis, end_millis, min, max
            );
        }

        Ok(in_range)
    }

    /// Parse one JSONL record:
    /// `{"<ts>": {"doseRate": num, "time_stamp": "<ts>"}}`.
    /// Returns `None` for any shape violation.
    fn parse_line(&self, line: &str) -> Option<DoseRateSample> {
        let value: Value = serde_json::from_str(line).ok()?;
        let object = value.as_object()?;
        let (key, entry) = object.iter().next()?;

        let dose_rate = entry.get("doseRate")?.as_f64()?;
        let time_stamp = entry
            .get("time_stamp")
            .and_then(Value::as_str)
            .unwrap_or(key)
            .to_string();

        let parsed = NaiveDateTime::parse_from_str(&time_stamp, TIMESTAMP_FORMAT).ok()?;
        Some(DoseRateSample {
            dose_rate,
            timestamp_millis: self.to_millis(parsed),
            time_stamp,
        })
    }

    /// Interpret a naive (stored-local) datetime as epoch millis using the
    /// engine's offset.
    fn to_millis(&self, naive: NaiveDateTime) -> i64 {
        naive
            .and_local_timezone(self.offset)
            .single()
            .map(|dt| dt.timestamp_millis())
            // A fixed offset has no DST gaps; this arm is unreachable in
            // practice but keeps the conversion total.
            .unwrap_or_else(|| naive.and_utc().timestamp_millis())
    }
}
