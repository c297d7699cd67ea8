//! Synchronous logging and the read queries.

use crate::{AuditEntry, AuditStore, LogOptions, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Default number of entries returned by the list queries.
pub const DEFAULT_LIMIT: usize = 50;

type Now = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Append-only recorder of security-relevant actions.
///
/// `log_action` here writes through to the store and returns any storage
/// error to the caller. Request handlers that must not wait on, or fail
/// because of, the audit write go through [`AuditWriter`](crate::AuditWriter).
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
    now: Now,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            now: Arc::new(Utc::now),
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, now: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.now = Arc::new(now);
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Validate, sanitize and store an entry.
    ///
    /// Fails with a validation error when `action` is blank, or with the
    /// store's error if the insert fails.
    pub fn log_action(
        &self,
        action: &str,
        user_id: Option<i64>,
        opts: LogOptions,
    ) -> Result<AuditEntry> {
        let entry = self.build_entry(action, user_id, opts)?;
        self.store.append(&entry)?;
        Ok(entry)
    }

    pub(crate) fn build_entry(
        &self,
        action: &str,
        user_id: Option<i64>,
        opts: LogOptions,
    ) -> Result<AuditEntry> {
        AuditEntry::build(action, user_id, opts, (self.now)())
    }

    /// Entries recorded for `user_id`, newest first.
    pub fn list_user_logs(
        &self,
        user_id: i64,
        limit: impl Into<Option<usize>>,
    ) -> Result<Vec<AuditEntry>> {
        self.store
            .list_by_user(user_id, limit.into().unwrap_or(DEFAULT_LIMIT))
    }

    /// Entries recorded against one resource, newest first.
    pub fn list_resource_logs(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: impl Into<Option<usize>>,
    ) -> Result<Vec<AuditEntry>> {
        self.store.list_by_resource(
            resource_type,
            resource_id,
            limit.into().unwrap_or(DEFAULT_LIMIT),
        )
    }

    /// All entries, newest first.
    pub fn list_recent_logs(&self, limit: impl Into<Option<usize>>) -> Result<Vec<AuditEntry>> {
        self.store.list_recent(limit.into().unwrap_or(DEFAULT_LIMIT))
    }
}
