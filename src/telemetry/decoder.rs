//! # Message Decoder
//!
//! Decodes a raw transport payload into a [`SensorReading`].
//!
//! Decoding is total: any parse failure or missing nested field yields the
//! sentinel empty reading. A single malformed message must never interrupt
//! the stream, so this module exposes no error type at all.
//!
//! Expected payload shape:
//!
//! ```text
//! { "type": string, "timestamp": string|number,
//!   "data": { "GPS": {...}, "Attributes": { "Battery": {...} },
//!             "Sensor": { "doserate": {"value": num, "cps": num, ...},
//!                         "spectrum": {"bins": [num, ...], ...} } } }
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::reading::{BatteryStatus, GpsFix, SensorReading};

/// Raw payload envelope. Every field defaults so partially-formed messages
/// still decode.
#[derive(Debug, Deserialize, Default)]
struct RawPayload {
    #[serde(default)]
    timestamp: Value,

    #[serde(default)]
    data: RawData,
}

#[derive(Debug, Deserialize, Default)]
struct RawData {
    #[serde(rename = "GPS", default)]
    gps: Option<GpsFix>,

    #[serde(rename = "Attributes", default)]
    attributes: RawAttributes,

    #[serde(rename = "Sensor", default)]
    sensor: RawSensor,
}

#[derive(Debug, Deserialize, Default)]
struct RawAttributes {
    #[serde(rename = "Battery", default)]
    battery: Option<BatteryStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSensor {
    #[serde(default)]
    doserate: RawDoseRate,

    #[serde(default)]
    spectrum: RawSpectrum,
}

#[derive(Debug, Deserialize, Default)]
struct RawDoseRate {
    #[serde(default)]
    value: f64,

    #[serde(default)]
    cps: f64,
}

#[derive(Debug, Deserialize, Default)]
struct RawSpectrum {
    #[serde(default)]
    bins: Vec<f64>,
}

/// Decode one raw payload into a [`SensorReading`].
///
/// Never fails: malformed JSON, a wrong-shaped envelope, or missing nested
/// fields all produce the sentinel empty reading (numeric fields `0`,
/// object fields absent, bins empty).
///
/// # Examples
///
/// ```
/// use radscope::telemetry::decode;
///
/// let reading = decode(br#"{"data":{"Sensor":{"doserate":{"value":0.18,"cps":9.5}}}}"#);
/// assert_eq!(reading.dose_rate, 0.18);
///
/// let sentinel = decode(b"not json");
/// assert_eq!(sentinel.dose_rate, 0.0);
/// ```
pub fn decode(raw: &[u8]) -> SensorReading {
    let payload: RawPayload = match serde_json::from_slice(raw) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("substituting empty reading for unparsable payload: {}", e);
            return SensorReading::empty();
        }
    };

    SensorReading {
        dose_rate: payload.data.sensor.doserate.value,
        cps: payload.data.sensor.doserate.cps,
        timestamp_millis: coerce_timestamp(&payload.timestamp),
        gps: payload.data.gps,
        battery: payload.data.attributes.battery,
        spectrum_bins: payload.data.sensor.spectrum.bins,
    }
}

/// The device reports `timestamp` either as epoch millis or as a numeric
/// string. Anything else coerces to 0.
fn coerce_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
