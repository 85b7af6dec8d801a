//! # Live Telemetry State
//!
//! The fan-out point between message processing and every consumer.
//!
//! Holds the current snapshot, a rolling graph buffer capped at a fixed
//! length, and a bounded recent-readings list for diagnostics. Written
//! exclusively by the ingestion queue through [`TelemetryWriter`]; read by
//! everyone else through clones of [`TelemetryHandle`]. The writer/reader
//! split enforces the single-writer discipline at the type level.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use super::reading::{GraphPoint, SensorReading};

struct Inner {
    current: SensorReading,
    history: VecDeque<GraphPoint>,
    recent: VecDeque<SensorReading>,
    history_cap: usize,
    recent_cap: usize,
}

/// Write half of the live telemetry state. Exactly one exists per pipeline;
/// it is owned by the [`Ingestor`](super::ingest::Ingestor).
pub struct TelemetryWriter {
    inner: Arc<RwLock<Inner>>,
    changed: watch::Sender<u64>,
}

/// Read half of the live telemetry state. Cheap to clone.
#[derive(Clone)]
pub struct TelemetryHandle {
    inner: Arc<RwLock<Inner>>,
    changed: watch::Receiver<u64>,
}

/// Create a connected writer/reader pair.
///
/// * `history_cap` - rolling graph buffer capacity (10 in the reference
///   device UI)
/// * `recent_cap` - recent-readings diagnostics list capacity (50)
pub fn telemetry_state(history_cap: usize, recent_cap: usize) -> (TelemetryWriter, TelemetryHandle) {
    let inner = Arc::new(RwLock::new(Inner {
        current: SensorReading::empty(),
        history: VecDeque::with_capacity(history_cap),
        recent: VecDeque::with_capacity(recent_cap),
        history_cap,
        recent_cap,
    }));
    let (tx, rx) = watch::channel(0);

    (
        TelemetryWriter {
            inner: Arc::clone(&inner),
            changed: tx,
        },
        TelemetryHandle { inner, changed: rx },
    )
}

impl TelemetryWriter {
    /// Apply one processed reading: replace the current snapshot, append to
    /// the graph buffer (evicting from the head past capacity), and append
    /// to the recent list (same FIFO eviction).
    ///
    /// The whole mutation happens under a single write lock, so observers
    /// never see a half-updated snapshot.
    pub fn apply(&self, reading: SensorReading) {
        {
            let mut inner = self.inner.write().expect("telemetry state lock poisoned");

            inner.history.push_back(reading.graph_point());
            while inner.history.len() > inner.history_cap {
                inner.history.pop_front();
            }

            inner.recent.push_back(reading.clone());
            while inner.recent.len() > inner.recent_cap {
                inner.recent.pop_front();
            }

            inner.current = reading;
        }

        self.changed.send_modify(|version| *version += 1);
    }
}

impl TelemetryHandle {
    /// The current snapshot.
    pub fn current(&self) -> SensorReading {
        self.inner
            .read()
            .expect("telemetry state lock poisoned")
            .current
            .clone()
    }

    /// Read-only snapshot of the rolling graph buffer, oldest first.
    /// Length is always <= the configured capacity.
    pub fn history(&self) -> Vec<GraphPoint> {
        self.inner
            .read()
            .expect("telemetry state lock poisoned")
            .history
            .iter()
            .copied()
            .collect()
    }

    /// Read-only snapshot of the recent-readings diagnostics list, oldest
    /// first.
    pub fn recent(&self) -> Vec<SensorReading> {
        self.inner
            .read()
            .expect("telemetry state lock poisoned")
            .recent
            .iter()
            .cloned()
            .collect()
    }

    /// Change notifications. The value is a monotonic version counter that
    /// bumps once per processed reading.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.clone()
    }
}
