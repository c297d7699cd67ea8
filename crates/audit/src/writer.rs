//! Fire-and-forget audit writes.

use crate::{AuditEntry, AuditStore, AuditTrail, LogOptions, Result};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Settings for the background writer, the `[audit]` table of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Queues audit entries and stores them from a background task.
///
/// Callers never wait for the insert. When the queue is full or the insert
/// fails, the entry is dropped and the failure is logged; nothing is
/// reported back to the caller.
pub struct AuditWriter {
    trail: AuditTrail,
    tx: mpsc::Sender<AuditEntry>,
    worker: JoinHandle<()>,
}

impl AuditWriter {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(trail: AuditTrail, config: WriterConfig) -> Self {
        let capacity = match config.queue_capacity {
            0 => DEFAULT_QUEUE_CAPACITY,
            n => n,
        };
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(drain(trail.store().clone(), rx));
        Self { trail, tx, worker }
    }

    /// The trail this writer stores into, for queries.
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// Validate and enqueue an entry.
    ///
    /// Only a blank `action` is reported as an error. The returned entry is
    /// the one handed to the queue, which may still be dropped later.
    pub fn log_action(
        &self,
        action: &str,
        user_id: Option<i64>,
        opts: LogOptions,
    ) -> Result<AuditEntry> {
        let entry = self.trail.build_entry(action, user_id, opts)?;

        match self.tx.try_send(entry.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    id = %dropped.id,
                    action = %dropped.action,
                    "audit queue full, entry dropped"
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                tracing::error!(
                    id = %dropped.id,
                    action = %dropped.action,
                    "audit writer stopped, entry dropped"
                );
            }
        }

        Ok(entry)
    }

    /// Stop accepting entries and wait for the queued ones to be written.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "audit writer task failed");
        }
    }
}

async fn drain(store: Arc<dyn AuditStore>, mut rx: mpsc::Receiver<AuditEntry>) {
    while let Some(entry) = rx.recv().await {
        let store = store.clone();
        let id = entry.id;
        let action = entry.action.clone();

        match tokio::task::spawn_blocking(move || store.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(%id, %action, error = %e, "audit write failed, entry dropped");
            }
            Err(e) => {
                tracing::error!(%id, %action, error = %e, "audit write task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, SqliteStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A store whose inserts always fail.
    #[derive(Default)]
    struct BrokenStore {
        attempts: AtomicUsize,
    }

    impl AuditStore for BrokenStore {
        fn append(&self, _entry: &AuditEntry) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Database(rusqlite::Error::InvalidQuery))
        }

        fn list_by_user(&self, _user_id: i64, _limit: usize) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }

        fn list_by_resource(&self, _: &str, _: &str, _limit: usize) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }

        fn list_recent(&self, _limit: usize) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }

        fn count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_entries_are_written_in_background() {
        let trail = AuditTrail::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let writer = AuditWriter::spawn(trail.clone(), WriterConfig::default());

        for i in 0..3 {
            writer
                .log_action("post.update", Some(1), LogOptions::new().resource("post", i))
                .unwrap();
        }
        writer.shutdown().await;

        assert_eq!(trail.list_user_logs(1, None).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_validation_still_reported() {
        let trail = AuditTrail::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let writer = AuditWriter::spawn(trail, WriterConfig::default());

        let err = writer.log_action(" ", Some(1), LogOptions::new()).unwrap_err();
        assert!(err.is_validation());

        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let store = Arc::new(BrokenStore::default());
        let writer = AuditWriter::spawn(AuditTrail::new(store.clone()), WriterConfig::default());

        let entry = writer.log_action("login", None, LogOptions::new()).unwrap();
        assert_eq!(entry.action, "login");
        writer.log_action("logout", None, LogOptions::new()).unwrap();
        writer.shutdown().await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_failing_caller() {
        let trail = AuditTrail::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let writer = AuditWriter::spawn(trail.clone(), WriterConfig { queue_capacity: 1 });

        // The current-thread runtime does not run the drain task until we
        // yield, so only the first entry fits in the queue.
        for i in 0..5 {
            let entry = writer
                .log_action("login.failed", Some(1), LogOptions::new().resource("ip", i))
                .unwrap();
            assert_eq!(entry.action, "login.failed");
        }
        writer.shutdown().await;

        assert_eq!(trail.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stopped_writer_drops_without_failing_caller() {
        let trail = AuditTrail::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let writer = AuditWriter::spawn(trail.clone(), WriterConfig::default());

        writer.worker.abort();
        while !writer.worker.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(writer.tx.is_closed());

        let entry = writer.log_action("logout", Some(1), LogOptions::new()).unwrap();
        assert_eq!(entry.action, "logout");
        writer.shutdown().await;

        assert_eq!(trail.store().count().unwrap(), 0);
    }

    #[test]
    fn test_sync_path_surfaces_store_errors() {
        let trail = AuditTrail::new(Arc::new(BrokenStore::default()));
        let err = trail.log_action("login", None, LogOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_zero_capacity_falls_back() {
        let trail = AuditTrail::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let writer = AuditWriter::spawn(trail.clone(), WriterConfig { queue_capacity: 0 });
        writer.log_action("login", Some(1), LogOptions::new()).unwrap();
        writer.shutdown().await;
        assert_eq!(trail.store().count().unwrap(), 1);
    }
}
