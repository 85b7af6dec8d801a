//! # Session Logger
//!
//! The `Idle -> Armed -> Idle` state machine driving periodic sample
//! logging.
//!
//! Arming creates and persists a [`Session`] record, takes one immediate
//! sample (so a session always has at least one sample even if stopped
//! instantly), and starts a repeating sampler plus, when a time limit is
//! set, a one-shot expiry timer. Disarming cancels both timers before
//! persisting `stopped_at`, so no append can land after `stop_session`
//! returns. At most one session is armed at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::store::{DoseRateMirror, SessionStore};
use super::{now_millis, Session};
use crate::error::{RadScopeError, Result};
use crate::storage::writer::DoseRateLog;
use crate::telemetry::state::TelemetryHandle;

struct ArmedSession {
    session: Session,
    sampler: JoinHandle<()>,
    expiry: Option<JoinHandle<()>>,
}

/// Timer-driven session logger.
///
/// Shared via `Arc`; the expiry timer holds a clone so it can disarm the
/// logger without an explicit `stop_session` call.
pub struct SessionLogger {
    store: Arc<dyn SessionStore>,
    mirror: Option<Arc<dyn DoseRateMirror>>,
    telemetry: TelemetryHandle,
    log: DoseRateLog,
    armed: Mutex<Option<ArmedSession>>,
}

impl SessionLogger {
    /// Create an idle logger.
    ///
    /// * `store` - session record persistence collaborator
    /// * `mirror` - optional document-store mirror for samples; the JSONL
    ///   log remains authoritative
    /// * `telemetry` - live state sampled by the repeating timer
    /// * `log` - the partitioned dose-rate writer
    pub fn new(
        store: Arc<dyn SessionStore>,
        mirror: Option<Arc<dyn DoseRateMirror>>,
        telemetry: TelemetryHandle,
        log: DoseRateLog,
    ) -> Self {
        Self {
            store,
            mirror,
            telemetry,
            log,
            armed: Mutex::new(None),
        }
    }

    /// Whether a session is currently armed.
    pub async fn is_armed(&self) -> bool {
        self.armed.lock().await.is_some()
    }

    /// The currently armed session record, if any.
    pub async fn armed_session(&self) -> Option<Session> {
        self.armed.lock().await.as_ref().map(|a| a.session.clone())
    }

    /// Start a logging session: validate, persist the record, take one
    /// immediate sample, then arm the repeating sampler and (when
    /// `time_limit_hours > 0`) the one-shot expiry timer.
    ///
    /// Returns the new session id.
    ///
    /// # Errors
    ///
    /// Rejected before any state mutation (validate-then-commit) when the
    /// name is empty, the interval is < 1 second, or a session is already
    /// armed. Store failures propagate.
    pub async fn start_session(
        self: &Arc<Self>,
        name: &str,
        time_limit_hours: u64,
        time_interval_secs: u64,
    ) -> Result<Uuid> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RadScopeError::InvalidSession(
                "session name must be non-empty".into(),
            ));
        }
        if time_interval_secs < 1 {
            return Err(RadScopeError::InvalidSession(
                "sampling interval must be at least 1 second".into(),
            ));
        }

        let mut armed = self.armed.lock().await;
        if armed.is_some() {
            return Err(RadScopeError::InvalidSession(
                "a session is already armed; stop it first".into(),
            ));
        }

        let session = Session {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at_millis: now_millis(),
            stopped_at_millis: 0,
            time_limit_hours,
            time_interval_secs,
        };
        self.store.create(&session).await?;

        // A session always has at least one sample, even if stopped
        // immediately after starting.
        sample_once(&self.telemetry, &self.log, self.mirror.as_ref()).await;

        let sampler = {
            let telemetry = self.telemetry.clone();
            let log = self.log.clone();
            let mirror = self.mirror.clone();
            let period = Duration::from_secs(time_interval_secs);
            // The immediate sample above covers t=0; first tick at t=period.
            let mut ticks = interval_at(Instant::now() + period, period);
            tokio::spawn(async move {
                loop {
                    ticks.tick().await;
                    sample_once(&telemetry, &log, mirror.as_ref()).await;
                }
            })
        };

        let expiry = (time_limit_hours > 0).then(|| {
            let logger = Arc::clone(self);
            let id = session.id;
            let limit = Duration::from_secs(time_limit_hours * 3600);
            tokio::spawn(async move {
                sleep(limit).await;
                info!("session {} reached its time limit, auto-stopping", id);
                if let Err(e) = logger.disarm(true).await {
                    error!("failed to auto-stop session {}: {}", id, e);
                }
            })
        });

        info!(
            "session {} ({:?}) armed: interval {}s, limit {}h",
            session.id, session.name, time_interval_secs, time_limit_hours
        );

        let id = session.id;
        *armed = Some(ArmedSession {
            session,
            sampler,
            expiry,
        });
        Ok(id)
    }

    /// Stop the armed session, if any. Idempotent: stopping an idle logger
    /// is a no-op, not an error.
    ///
    /// Both timers are cancelled and awaited before `stopped_at` is
    /// persisted, so no further append can occur once this returns.
    pub async fn stop_session(&self) -> Result<()> {
        self.disarm(false).await.map(|_| ())
    }

    /// Armed -> Idle transition shared by explicit stop and expiry.
    /// `via_expiry` marks the call originating inside the expiry task,
    /// which must not await its own cancellation.
    async fn disarm(&self, via_expiry: bool) -> Result<Option<Uuid>> {
        let taken = self.armed.lock().await.take();
        let Some(mut armed) = taken else {
            return Ok(None);
        };

        armed.sampler.abort();
        // Wait for the sampler to wind down so an in-flight append finishes
        // or is cancelled before stopped_at is persisted.
        let _ = armed.sampler.await;

        if !via_expiry {
            if let Some(expiry) = armed.expiry.take() {
                expiry.abort();
                let _ = expiry.await;
            }
        }

        let stopped_at = now_millis();
        self.store.set_stopped(armed.session.id, stopped_at).await?;
        info!("session {} stopped at {}", armed.session.id, stopped_at);
        Ok(Some(armed.session.id))
    }
}

/// Take the current live snapshot and append it to the log store, then to
/// the mirror. A failed append is logged and skipped; the session stays
/// armed for the next cycle (at-most-once, best-effort per sample).
async fn sample_once(
    telemetry: &TelemetryHandle,
    log: &DoseRateLog,
    mirror: Option<&Arc<dyn DoseRateMirror>>,
) {
    let snapshot = telemetry.current();
    let sampled_at = now_millis();

    if let Err(e) = log.append(snapshot.dose_rate, sampled_at).await {
        warn!("periodic sample append failed, skipping this cycle: {}", e);
        return;
    }

    if let Some(mirror) = mirror {
        if let Err(e) = mirror.record(snapshot.dose_rate, sampled_at).await {
            warn!("dose-rate mirror write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemorySessionStore;
    use crate::telemetry::reading::SensorReading;
    use crate::telemetry::state::{telemetry_state, TelemetryWriter};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reading(dose_rate: f64) -> SensorReading {
        SensorReading {
            dose_rate,
            timestamp_millis: now_millis(),
            ..SensorReading::empty()
        }
    }

    struct Fixture {
        logger: Arc<SessionLogger>,
        store: Arc<MemorySessionStore>,
        writer: TelemetryWriter,
        _tmp: tempfile::TempDir,
        base: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_path_buf();
        let (writer, handle) = telemetry_state(10, 50);
        let store = Arc::new(MemorySessionStore::new());
        let logger = Arc::new(SessionLogger::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            None,
            handle,
            DoseRateLog::new(&base, Some(0)),
        ));
        Fixture {
            logger,
            store,
            writer,
            _tmp: tmp,
            base,
        }
    }

    /// Collect every dose-rate log line under the store base, in append
    /// order per file.
    fn log_lines(base: &Path) -> Vec<String> {
        fn walk(dir: &Path, out: &mut Vec<String>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            let mut entries: Vec<_> = entries.flatten().collect();
            entries.sort_by_key(|e| e.path());
            for entry in entries {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else if path.file_name().is_some_and(|n| n == "doserate.jsonl") {
                    let contents = std::fs::read_to_string(&path).unwrap();
                    out.extend(contents.lines().map(str::to_string));
                }
            }
        }
        let mut out = Vec::new();
        walk(base, &mut out);
        out
    }

    fn dose_rates(lines: &[String]) -> Vec<f64> {
        lines
            .iter()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                let object = value.as_object().unwrap();
                object.values().next().unwrap()["doseRate"].as_f64().unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_rejects_empty_name() {
        let f = fixture();
        let result = f.logger.start_session("   ", 0, 1).await;
        assert!(matches!(result, Err(RadScopeError::InvalidSession(_))));
        assert!(!f.logger.is_armed().await);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let f = fixture();
        let result = f.logger.start_session("survey", 0, 0).await;
        assert!(matches!(result, Err(RadScopeError::InvalidSession(_))));
        // Validate-then-commit: nothing was persisted
        assert!(log_lines(&f.base).is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_second_session() {
        let f = fixture();
        f.logger.start_session("first", 0, 60).await.unwrap();
        let result = f.logger.start_session("second", 0, 60).await;
        assert!(matches!(result, Err(RadScopeError::InvalidSession(_))));
        f.logger.stop_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_immediate_sample_on_start() {
        let f = fixture();
        f.writer.apply(reading(0.42));

        let id = f.logger.start_session("survey", 0, 3600).await.unwrap();
        assert!(f.logger.is_armed().await);
        assert_eq!(f.logger.armed_session().await.unwrap().id, id);

        let lines = log_lines(&f.base);
        assert_eq!(lines.len(), 1, "a session always has >= 1 sample");
        assert_eq!(dose_rates(&lines), vec![0.42]);

        f.logger.stop_session().await.unwrap();
        let stored = f.store.get(id).await.unwrap().unwrap();
        assert!(!stored.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_appends_after_stop() {
        let f = fixture();
        f.writer.apply(reading(0.2));

        let id = f.logger.start_session("survey", 0, 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        f.logger.stop_session().await.unwrap();
        assert!(!f.logger.is_armed().await);

        let before = log_lines(&f.base).len();
        assert!(before >= 1);

        // Wait well past several sampling intervals
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(log_lines(&f.base).len(), before);

        let stored = f.store.get(id).await.unwrap().unwrap();
        assert!(stored.stopped_at_millis > 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let f = fixture();
        f.logger.start_session("survey", 0, 60).await.unwrap();
        f.logger.stop_session().await.unwrap();
        // Second stop on an idle logger is a no-op
        f.logger.stop_session().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_expiry_stops_without_explicit_call() {
        let f = fixture();
        f.writer.apply(reading(0.3));

        // 1 hour limit, 30 minute interval
        let id = f.logger.start_session("overnight", 1, 1800).await.unwrap();

        tokio::time::sleep(Duration::from_secs(3700)).await;
        // Give the expiry task's disarm a chance to finish its awaits
        tokio::task::yield_now().await;

        assert!(!f.logger.is_armed().await);
        let stored = f.store.get(id).await.unwrap().unwrap();
        assert!(stored.stopped_at_millis > 0, "expiry must set stopped_at");

        let before = log_lines(&f.base).len();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(log_lines(&f.base).len(), before, "no samples after expiry");

        // Explicit stop after expiry is still a no-op
        f.logger.stop_session().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_tracks_live_state() {
        let f = fixture();

        f.writer.apply(reading(0.1));
        f.logger.start_session("scenario", 0, 1).await.unwrap();

        f.writer.apply(reading(0.2));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        f.writer.apply(reading(0.3));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        f.logger.stop_session().await.unwrap();

        let rates = dose_rates(&log_lines(&f.base));
        assert!(rates.len() >= 3, "expected >= 3 samples, got {:?}", rates);
        // Values must track the fed readings in time order
        assert!(rates.windows(2).all(|w| w[0] <= w[1]), "not monotone: {:?}", rates);
        for expected in [0.1, 0.2, 0.3] {
            assert!(rates.contains(&expected), "missing {} in {:?}", expected, rates);
        }
    }

    struct CountingMirror {
        records: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DoseRateMirror for CountingMirror {
        async fn record(&self, _dose_rate: f64, _timestamp_millis: i64) -> Result<()> {
            self.records.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mirror_receives_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let (writer, handle) = telemetry_state(10, 50);
        writer.apply(reading(0.7));

        let mirror = Arc::new(CountingMirror {
            records: AtomicUsize::new(0),
        });
        let logger = Arc::new(SessionLogger::new(
            Arc::new(MemorySessionStore::new()),
            Some(Arc::clone(&mirror) as Arc<dyn DoseRateMirror>),
            handle,
            DoseRateLog::new(tmp.path(), Some(0)),
        ));

        logger.start_session("mirrored", 0, 3600).await.unwrap();
        logger.stop_session().await.unwrap();

        // The immediate sample reached the mirror too
        assert_eq!(mirror.records.load(Ordering::SeqCst), 1);
    }
}
