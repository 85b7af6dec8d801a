//! # Ingestion Queue & Batcher
//!
//! Buffers decoded readings arriving from the transport callback and
//! serializes their processing into discrete per-message steps, so device
//! message cadence never overwhelms state consumers.
//!
//! Queue discipline is true FIFO: the oldest unprocessed reading is always
//! handled first. (The reference firmware app's queue inserted at the front
//! and popped index 0, which drained newest-first; that behavior was an
//! accident of the array API, not a latency feature, so this implementation
//! fixes it to chronological order.)
//!
//! Mutual exclusion is structural: a single consumer task drains the queue,
//! so two drains can never run concurrently. Enqueueing is fire-and-forget
//! and never suspends the transport callback. The drain yields to the
//! runtime after every item so other tasks are not starved during a burst.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::reading::SensorReading;
use super::state::TelemetryWriter;

/// Enqueue half, handed to the transport. Cheap to clone.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::UnboundedSender<SensorReading>,
}

/// Drain half. Owns the single [`TelemetryWriter`]; runs until every
/// [`IngestHandle`] is dropped.
pub struct Ingestor {
    rx: mpsc::UnboundedReceiver<SensorReading>,
    writer: TelemetryWriter,
}

/// Create a connected enqueue/drain pair around the given state writer.
pub fn ingest_channel(writer: TelemetryWriter) -> (IngestHandle, Ingestor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IngestHandle { tx }, Ingestor { rx, writer })
}

impl IngestHandle {
    /// Enqueue a decoded reading for processing. Never blocks; called from
    /// the transport's message callback.
    pub fn enqueue(&self, reading: SensorReading) {
        if self.tx.send(reading).is_err() {
            warn!("ingest queue closed, dropping reading");
        }
    }
}

impl Ingestor {
    /// Drain loop: process readings one at a time, oldest first, until the
    /// channel closes. Each processed reading is applied to the live
    /// telemetry state as a single atomic replacement.
    pub async fn run(mut self) {
        let mut processed: u64 = 0;

        while let Some(reading) = self.rx.recv().await {
            self.writer.apply(reading);
            processed += 1;

            if processed % 1000 == 0 {
                debug!("processed {} readings", processed);
            }

            // Yield between items so a burst of queued messages cannot
            // starve timers or other tasks on the runtime.
            tokio::task::yield_now().await;
        }

        debug!("ingest queue closed after {} readings", processed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::state::telemetry_state;

    fn reading(dose_rate: f64, ts: i64) -> SensorReading {
        SensorReading {
            dose_rate,
            timestamp_millis: ts,
            ..SensorReading::empty()
        }
    }

    #[tokio::test]
    async fn test_fifo_processing_order() {
        let (writer, handle) = telemetry_state(10, 50);
        let (tx, ingestor) = ingest_channel(writer);

        for i in 0..5 {
            tx.enqueue(reading(i as f64 / 10.0, i));
        }
        drop(tx); // close the channel so run() terminates

        ingestor.run().await;

        let history = handle.history();
        assert_eq!(history.len(), 5);
        // Oldest processed first: arrival order preserved
        for (i, point) in history.iter().enumerate() {
            assert_eq!(point.timestamp_millis, i as i64);
        }
        assert_eq!(handle.current().timestamp_millis, 4);
    }

    #[tokio::test]
    async fn test_burst_respects_history_bound() {
        let (writer, handle) = telemetry_state(10, 50);
        let (tx, ingestor) = ingest_channel(writer);

        for i in 0..200 {
            tx.enqueue(reading(0.1, i));
        }
        drop(tx);
        ingestor.run().await;

        assert_eq!(handle.history().len(), 10);
        assert_eq!(handle.recent().len(), 50);
        assert_eq!(handle.history()[9].timestamp_millis, 199);
    }

    #[test]
    fn test_enqueue_never_blocks_from_sync_context() {
        // The transport callback must be able to enqueue without awaiting.
        let (writer, handle) = telemetry_state(10, 50);
        let (tx, ingestor) = ingest_channel(writer);

        for i in 0..100 {
            tx.enqueue(reading(0.2, i));
        }
        drop(tx);

        tokio_test::block_on(ingestor.run());
        assert_eq!(handle.current().timestamp_millis, 99);
    }

    #[tokio::test]
    async fn test_enqueue_after_drain_dropped_is_harmless() {
        let (writer, _handle) = telemetry_state(10, 50);
        let (tx, ingestor) = ingest_channel(writer);
        drop(ingestor);

        // Must not panic
        tx.enqueue(reading(0.1, 1));
    }
}
