//! # Session Store Collaborators
//!
//! Trait seams for the external persistence collaborators: the session
//! record store and the optional document-store mirror for dose-rate
//! samples. The partitioned JSONL log remains the authoritative dose-rate
//! store; the mirror is a derived, best-effort view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;

use super::Session;
use crate::error::{RadScopeError, Result};
use crate::storage::partition::{partition_dir, PartitionKind};
use crate::storage::writer::resolve_offset;

/// Persistence collaborator for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly created session (with `stopped_at_millis = 0`).
    async fn create(&self, session: &Session) -> Result<()>;

    /// Record the session's stop time. Called exactly once per session.
    async fn set_stopped(&self, id: Uuid, stopped_at_millis: i64) -> Result<()>;

    /// Fetch a session by id.
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;
}

/// Optional collaborator mirroring dose-rate samples into a generic
/// document store. Failures are logged by the caller and never fail the
/// authoritative append.
#[async_trait]
pub trait DoseRateMirror: Send + Sync {
    async fn record(&self, dose_rate: f64, timestamp_millis: i64) -> Result<()>;
}

/// In-memory session store, used in tests and as a default collaborator.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn set_stopped(&self, id: Uuid, stopped_at_millis: i64) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        match sessions.get_mut(&id) {
            Some(session) => {
                session.stopped_at_millis = stopped_at_millis;
                Ok(())
            }
            None => Err(RadScopeError::InvalidSession(format!(
                "unknown session {}",
                id
            ))),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .expect("session store lock poisoned")
            .get(&id)
            .cloned())
    }
}

/// Session lifecycle event, one JSONL line in the day partition's
/// `sessions.jsonl`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SessionEvent {
    Created { session: Session },
    Stopped { id: Uuid, stopped_at_millis: i64 },
}

/// Per-day session event file name
const SESSION_FILE: &str = "sessions.jsonl";

/// Durable session store: append-only JSONL event log under the
/// `Session_data` partition tree, with an in-memory index for lookups.
///
/// Events land in the partition of the session's creation date, so a stop
/// that crosses midnight stays next to its create event.
pub struct JsonlSessionStore {
    base: PathBuf,
    offset: chrono::FixedOffset,
    index: Mutex<HashMap<Uuid, Session>>,
}

impl JsonlSessionStore {
    /// Create a store rooted at `base`, using the same offset semantics as
    /// the dose-rate writer.
    pub fn new<P: AsRef<Path>>(base: P, utc_offset_minutes: Option<i32>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            offset: resolve_offset(utc_offset_minutes),
            index: Mutex::new(HashMap::new()),
        }
    }

    async fn append_event(&self, created_at_millis: i64, event: &SessionEvent) -> Result<()> {
        let local = DateTime::from_timestamp_millis(created_at_millis)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .with_timezone(&self.offset);
        let dir = partition_dir(&self.base, PartitionKind::Session, local.date_naive()).await?;
        let path = dir.join(SESSION_FILE);

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!("failed to open {}: {}", path.display(), e);
                e
            })?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.append_event(
            session.created_at_millis,
            &SessionEvent::Created {
                session: session.clone(),
            },
        )
        .await?;
        self.index
            .lock()
            .expect("session index lock poisoned")
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn set_stopped(&self, id: Uuid, stopped_at_millis: i64) -> Result<()> {
        let created_at = {
            let index = self.index.lock().expect("session index lock poisoned");
            match index.get(&id) {
                Some(session) => session.created_at_millis,
                None => {
                    return Err(RadScopeError::InvalidSession(format!(
                        "unknown session {}",
                        id
                    )))
                }
            }
        };

        self.append_event(
            created_at,
            &SessionEvent::Stopped {
                id,
                stopped_at_millis,
            },
        )
        .await?;

        let mut index = self.index.lock().expect("session index lock poisoned");
        if let Some(session) = index.get_mut(&id) {
            session.stopped_at_millis = stopped_at_millis;
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self
            .index
            .lock()
            .expect("session index lock poisoned")
            .get(&id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::now_millis;

    fn session(name: &str) -> Session {
        Session {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at_millis: now_millis(),
            stopped_at_millis: 0,
            time_limit_hours: 0,
            time_interval_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::new();
        let s = session("walkabout");

        store.create(&s).await.unwrap();
        assert_eq!(store.get(s.id).await.unwrap().unwrap().name, "walkabout");

        store.set_stopped(s.id, 42).await.unwrap();
        let stopped = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(stopped.stopped_at_millis, 42);
        assert!(!stopped.is_active());
    }

    #[tokio::test]
    async fn test_memory_store_unknown_id() {
        let store = MemorySessionStore::new();
        assert!(store.set_stopped(Uuid::new_v4(), 1).await.is_err());
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_jsonl_store_appends_events() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::new(tmp.path(), Some(0));

        let s = session("bench test");
        store.create(&s).await.unwrap();
        store.set_stopped(s.id, s.created_at_millis + 1000).await.unwrap();

        // Both events live in the creation-date partition
        let local = DateTime::from_timestamp_millis(s.created_at_millis)
            .unwrap()
            .with_timezone(&resolve_offset(Some(0)));
        let path = crate::storage::partition_path(
            tmp.path(),
            PartitionKind::Session,
            local.date_naive(),
        )
        .join(SESSION_FILE);

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"created\""));
        assert!(lines[1].contains("\"stopped\""));

        let fetched = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.stopped_at_millis, s.created_at_millis + 1000);
    }

    #[tokio::test]
    async fn test_jsonl_store_rejects_unknown_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::new(tmp.path(), Some(0));
        assert!(store.set_stopped(Uuid::new_v4(), 1).await.is_err());
    }
}
