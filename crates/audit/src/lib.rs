//! SQLite-backed audit trail.
//!
//! This crate records security-relevant actions (logins, permission changes,
//! content edits) as immutable [`AuditEntry`] rows and answers three
//! questions about them: what did this user do, what happened to this
//! resource, and what happened recently.
//!
//! # Overview
//!
//! - [`AuditTrail`] validates and sanitizes entries and writes them
//!   synchronously. Storage errors come back to the caller.
//! - [`AuditWriter`] wraps a trail with a bounded queue and a background task.
//!   Request handlers use it so that a slow or broken store never delays or
//!   fails the action being audited; failures go to the `tracing` log.
//! - [`AuditStore`] is the storage seam. [`SqliteStore`] is the bundled
//!   implementation, on disk or in memory.
//!
//! # Sanitization
//!
//! Metadata passes through [`sanitize_metadata`] before it is stored: secrets
//! are redacted, long strings truncated and large maps capped. See that
//! function for the exact rules.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audit::{AuditTrail, LogOptions, SqliteStore};
//! use serde_json::json;
//!
//! let trail = AuditTrail::new(Arc::new(SqliteStore::open("audit.db")?));
//!
//! trail.log_action(
//!     "post.publish",
//!     Some(7),
//!     LogOptions::new()
//!         .ip_address("203.0.113.4")
//!         .resource("post", 42)
//!         .metadata(json!({"title": "Release notes"})),
//! )?;
//!
//! for entry in trail.list_resource_logs("post", "42", None)? {
//!     println!("{} {} by {:?}", entry.inserted_at, entry.action, entry.user_id);
//! }
//! # Ok::<(), audit::Error>(())
//! ```

mod entry;
mod error;
mod sanitize;
mod store;
mod trail;
mod writer;

pub use entry::{AuditEntry, LogOptions};
pub use error::{Error, Result};
pub use sanitize::{MAX_MAP_ENTRIES, MAX_STRING_CHARS, REDACTED, sanitize_metadata};
pub use store::{AuditStore, SqliteStore};
pub use trail::{AuditTrail, DEFAULT_LIMIT};
pub use writer::{AuditWriter, WriterConfig};
