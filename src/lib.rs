//! # RadScope Core
//!
//! Telemetry ingestion and session-logging core for the RadScope radiation
//! detection device.
//!
//! This library receives a continuous stream of JSON sensor messages over
//! MQTT, fans the decoded fields out to live state and persistent storage,
//! and records timer-driven logging sessions to a date-partitioned,
//! append-only JSONL store that can later be range-queried by date and time.

pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod transport;
