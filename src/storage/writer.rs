//! # Line-Log Writer
//!
//! Appends dose-rate sample records to the per-day `doserate.jsonl` file
//! inside the date partition, one newline-terminated JSON object per line.
//! Files are append-only and never rewritten in place.
//!
//! Record shape (one line):
//!
//! ```text
//! {"<YYYY-MM-DD HH:mm:ss>": {"doseRate": <3-decimal number>, "time_stamp": "<same string>"}}
//! ```
//!
//! Timestamps are formatted after applying a configurable UTC offset. The
//! device firmware hard-coded UTC+5:30 here; this implementation defaults
//! to the runtime's local offset and accepts an explicit offset (330 for
//! parity with the firmware) through configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use super::partition::{partition_dir, PartitionKind};
use crate::error::Result;

/// Per-day dose-rate log file name
pub const DOSE_RATE_FILE: &str = "doserate.jsonl";

/// Sample timestamp format (`YYYY-MM-DD HH:mm:ss`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only writer for the partitioned dose-rate log store.
///
/// Cheap to clone; writers share nothing but the base path and offset.
/// Concurrent writers from multiple process instances are out of scope
/// (single-writer assumption, no locking).
#[derive(Debug, Clone)]
pub struct DoseRateLog {
    base: PathBuf,
    offset: FixedOffset,
}

/// Resolve the formatting offset: explicit minutes when configured,
/// otherwise the runtime's local offset.
pub(crate) fn resolve_offset(utc_offset_minutes: Option<i32>) -> FixedOffset {
    match utc_offset_minutes {
        Some(minutes) => match FixedOffset::east_opt(minutes * 60) {
            Some(offset) => offset,
            None => {
                error!("utc_offset_minutes {} out of range, falling back to UTC", minutes);
                Utc.fix()
            }
        },
        None => Local::now().offset().fix(),
    }
}

impl DoseRateLog {
    /// Create a writer rooted at `base`.
    ///
    /// * `utc_offset_minutes` - offset applied to sample epoch millis before
    ///   formatting; `None` uses the runtime's local offset.
    pub fn new<P: AsRef<Path>>(base: P, utc_offset_minutes: Option<i32>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            offset: resolve_offset(utc_offset_minutes),
        }
    }

    /// The formatting offset in effect.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Convert sample epoch millis to the offset-adjusted datetime used for
    /// both partitioning and the formatted timestamp string.
    fn local_datetime(&self, epoch_millis: i64) -> DateTime<FixedOffset> {
        let utc = DateTime::from_timestamp_millis(epoch_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        utc.with_timezone(&self.offset)
    }

    /// Append one dose-rate sample, creating the day's partition directory
    /// and file on first write.
    ///
    /// The dose rate is rounded to 3 decimal places before serialization.
    /// Returns the path of the file appended to.
    ///
    /// # Errors
    ///
    /// Directory-creation and write failures are logged and propagated; the
    /// caller (the session logger) does not retry — a failed periodic sample
    /// is simply lost (at-most-once, best-effort).
    pub async fn append(&self, dose_rate: f64, epoch_millis: i64) -> Result<PathBuf> {
        let local = self.local_datetime(epoch_millis);
        let dir = partition_dir(&self.base, PartitionKind::DoseRate, local.date_naive())
            .await
            .map_err(|e| {
                error!("failed to create dose-rate partition: {}", e);
                e
            })?;
        let path = dir.join(DOSE_RATE_FILE);

        let time_stamp = local.format(TIMESTAMP_FORMAT).to_string();
        let rounded = (dose_rate * 1000.0).round() / 1000.0;

        let mut record = serde_json::Map::new();
        record.insert(
            time_stamp.clone(),
            json!({ "doseRate": rounded, "time_stamp": time_stamp }),
        );
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // Create on first write, append afterwards
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!("failed to open {}: {}", path.display(), e);
                e
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            error!("failed to append to {}: {}", path.display(), e);
            e
        })?;
        file.flush().await.map_err(|e| {
            error!("failed to flush {}: {}", path.display(), e);
            e
        })?;

        debug!("appended sample {} to {}", rounded, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // UTC offset makes formatted timestamps deterministic in tests
    fn utc_log(base: &Path) -> DoseRateLog {
        DoseRateLog::new(base, Some(0))
    }

    #[tokio::test]
    async fn test_append_creates_partition_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = utc_log(tmp.path());

        // 2026-08-27 10:00:00 UTC
        let millis = 1_787_824_800_000;
        let path = log.append(0.123, millis).await.unwrap();

        assert!(path.ends_with("Doserate_data/2026/August/27/doserate.jsonl"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_append_line_shape_and_rounding() {
        let tmp = tempfile::tempdir().unwrap();
        let log = utc_log(tmp.path());

        let millis = 1_787_824_800_000; // 2026-08-27 10:00:00 UTC
        let path = log.append(0.4567, millis).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        let entry = &line["2026-08-27 10:00:00"];
        assert_eq!(entry["doseRate"], 0.457);
        assert_eq!(entry["time_stamp"], "2026-08-27 10:00:00");
    }

    #[tokio::test]
    async fn test_second_append_appends_not_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let log = utc_log(tmp.path());

        let millis = 1_787_824_800_000;
        log.append(0.1, millis).await.unwrap();
        let path = log.append(0.2, millis + 1000).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_fixed_offset_shifts_partition_day() {
        let tmp = tempfile::tempdir().unwrap();
        // UTC+5:30, the firmware's hard-coded offset
        let log = DoseRateLog::new(tmp.path(), Some(330));

        // 2026-08-27 23:00:00 UTC = 2026-08-28 04:30:00 at +5:30
        let millis = 1_787_871_600_000;
        let path = log.append(0.3, millis).await.unwrap();
        assert!(path.to_string_lossy().contains("August/28"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("2026-08-28 04:30:00"));
    }

    #[test]
    fn test_resolve_offset_out_of_range_falls_back_to_utc() {
        let offset = resolve_offset(Some(100_000));
        assert_eq!(offset.local_minus_utc(), 0);
    }
}
