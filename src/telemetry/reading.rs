//! # Sensor Data Model
//!
//! Strongly-typed records decoded from one transport message.

use serde::{Deserialize, Serialize};

/// One decoded sensor measurement.
///
/// A reading that could not be parsed decodes to the [`SensorReading::empty`]
/// sentinel rather than being dropped; the pipeline never errors on a
/// malformed message.
///
/// # Examples
///
/// ```
/// use radscope::telemetry::SensorReading;
///
/// let reading = SensorReading::empty();
/// assert_eq!(reading.dose_rate, 0.0);
/// assert!(reading.spectrum_bins.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SensorReading {
    /// Dose rate in µSv/h. Never negative.
    pub dose_rate: f64,

    /// Counts per second. Never negative.
    pub cps: f64,

    /// Epoch milliseconds reported by the device.
    pub timestamp_millis: i64,

    /// GPS fix, when the device has one.
    pub gps: Option<GpsFix>,

    /// Battery status, when reported.
    pub battery: Option<BatteryStatus>,

    /// Ordered spectrum bins. Fixed length per device; the decoder does not
    /// validate the length, truncation or padding is a consumer concern.
    pub spectrum_bins: Vec<f64>,
}

impl SensorReading {
    /// The sentinel "empty" reading substituted for unparsable payloads.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Graph point projection of this reading.
    pub fn graph_point(&self) -> GraphPoint {
        GraphPoint {
            dose_rate: self.dose_rate,
            cps: self.cps,
            timestamp_millis: self.timestamp_millis,
        }
    }
}

/// GPS fix as reported by the device. Opaque passthrough, no derived
/// invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GpsFix {
    /// Fix-status code (device-specific)
    #[serde(default)]
    pub status: i32,

    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    #[serde(default)]
    pub altitude: f64,

    #[serde(default)]
    pub satellites: u32,

    // Raw passthrough fields
    #[serde(default)]
    pub age: f64,

    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub speed: f64,

    #[serde(default)]
    pub course: f64,
}

/// Battery status as reported by the device. Opaque passthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatteryStatus {
    /// State of charge, percent
    #[serde(default)]
    pub soc: f64,

    #[serde(default)]
    pub voltage: f64,

    #[serde(default)]
    pub charging_current: f64,

    #[serde(default)]
    pub charging: bool,

    #[serde(default)]
    pub bus_voltage: f64,

    #[serde(default)]
    pub temperature: f64,
}

/// One point of the rolling graph buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub dose_rate: f64,
    pub cps: f64,
    pub timestamp_millis: i64,
}
