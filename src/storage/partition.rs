//! # Directory Partitioner
//!
//! Maps a calendar date to a deterministic partition directory of the form
//! `<base>/<kind-subpath>/<YYYY>/<MonthName>/<DD>` and creates it on demand.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::error::Result;

/// English month names used in partition paths
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The two partitioned record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Periodic dose-rate samples (`doserate.jsonl` per day)
    DoseRate,
    /// Session lifecycle records
    Session,
}

impl PartitionKind {
    /// Subdirectory under the store base for this kind
    pub fn subpath(&self) -> &'static str {
        match self {
            PartitionKind::DoseRate => "Doserate_data",
            PartitionKind::Session => "Session_data",
        }
    }
}

/// Compute the partition directory for a date without touching the
/// filesystem. Used by the query engine, which must never create
/// directories for windows it merely inspects.
pub fn partition_path(base: &Path, kind: PartitionKind, date: NaiveDate) -> PathBuf {
    base.join(kind.subpath())
        .join(format!("{:04}", date.year()))
        .join(MONTH_NAMES[date.month0() as usize])
        .join(format!("{:02}", date.day()))
}

/// Compute the partition directory for a date, creating it on demand.
///
/// Creation is idempotent (`mkdir -p` semantics): pre-existing directories
/// at any level are not an error, and calling this twice for the same date
/// yields the same path with no duplicates.
///
/// # Errors
///
/// Returns the underlying I/O error if a directory cannot be created.
pub async fn partition_dir(base: &Path, kind: PartitionKind, date: NaiveDate) -> Result<PathBuf> {
    let dir = partition_path(base, kind, date);
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}
