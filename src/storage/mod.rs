//! # Storage Module
//!
//! Date-partitioned, append-only JSONL log store for dose-rate samples.
//!
//! This module handles:
//! - Mapping a date to a `YYYY/<MonthName>/DD` partition directory ([`partition`])
//! - Appending newline-delimited JSON sample records ([`writer`])
//! - Point-in-time range queries over the on-disk partitions ([`query`])

pub mod partition;
pub mod query;
pub mod writer;

pub use partition::{partition_dir, partition_path, PartitionKind};
pub use query::{DoseRateSample, RangeQuery, DEFAULT_DURATION_MINUTES};
pub use writer::{DoseRateLog, DOSE_RATE_FILE, TIMESTAMP_FORMAT};
