//! # Telemetry Module
//!
//! The message-to-state half of the pipeline.
//!
//! This module handles:
//! - The decoded sensor data model ([`reading`])
//! - Tolerant JSON payload decoding ([`decoder`])
//! - Live telemetry state with a bounded rolling graph buffer ([`state`])
//! - The ingestion queue that serializes message processing ([`ingest`])

pub mod decoder;
pub mod ingest;
pub mod reading;
pub mod state;

pub use decoder::decode;
pub use ingest::{ingest_channel, IngestHandle, Ingestor};
pub use reading::{BatteryStatus, GpsFix, GraphPoint, SensorReading};
pub use state::{telemetry_state, TelemetryHandle, TelemetryWriter};
