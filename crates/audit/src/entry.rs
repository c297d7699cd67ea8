//! Audit entry types.

use crate::sanitize::sanitize_metadata;
use crate::{Error, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An immutable record of something security-relevant that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub inserted_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Validate and assemble an entry. Metadata is sanitized here, so no
    /// unsanitized entry can be constructed through this path.
    pub(crate) fn build(
        action: &str,
        user_id: Option<i64>,
        opts: LogOptions,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let action = action.trim();
        if action.is_empty() {
            return Err(Error::Validation {
                field: "action",
                message: "can't be blank",
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            user_id,
            ip_address: opts.ip_address,
            resource_type: opts.resource_type,
            resource_id: opts.resource_id,
            metadata: sanitize_metadata(opts.metadata),
            // Stored at microsecond precision.
            inserted_at: now.trunc_subsecs(6),
        })
    }
}

/// Optional context for [`AuditTrail::log_action`](crate::AuditTrail::log_action).
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    ip_address: Option<String>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    metadata: Value,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Attach metadata. Map keys are coerced to strings by serialization; a
    /// value that cannot be serialized is dropped and a warning is logged.
    pub fn metadata(mut self, metadata: impl Serialize) -> Self {
        self.metadata = match serde_json::to_value(metadata) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "dropping audit metadata that failed to serialize");
                Value::Null
            }
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_blank_action_rejected() {
        for action in ["", "   ", "\t\n"] {
            let err = AuditEntry::build(action, Some(1), LogOptions::new(), Utc::now()).unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_optional_fields() {
        let entry = AuditEntry::build("login", None, LogOptions::new(), Utc::now()).unwrap();
        assert_eq!(entry.action, "login");
        assert_eq!(entry.user_id, None);
        assert_eq!(entry.ip_address, None);
        assert_eq!(entry.resource_type, None);
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn test_options_populate_entry() {
        let opts = LogOptions::new()
            .ip_address("10.0.0.1")
            .resource("post", 42)
            .metadata(json!({"password": "hunter2", "title": "Hello"}));
        let entry = AuditEntry::build("post.update", Some(3), opts, Utc::now()).unwrap();

        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(entry.resource_type.as_deref(), Some("post"));
        assert_eq!(entry.resource_id.as_deref(), Some("42"));
        assert_eq!(entry.metadata["password"], "[REDACTED]");
        assert_eq!(entry.metadata["title"], "Hello");
    }

    #[test]
    fn test_metadata_keys_coerced_to_strings() {
        let mut meta = HashMap::new();
        meta.insert(7, "seven");
        let entry =
            AuditEntry::build("x", None, LogOptions::new().metadata(meta), Utc::now()).unwrap();
        assert_eq!(entry.metadata["7"], "seven");
    }

    #[test]
    fn test_unserializable_metadata_dropped() {
        let mut meta = BTreeMap::new();
        meta.insert((1, 2), "tuple keys are not valid JSON keys");
        let entry =
            AuditEntry::build("x", None, LogOptions::new().metadata(meta), Utc::now()).unwrap();
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn test_timestamp_truncated_to_micros() {
        let entry = AuditEntry::build("x", None, LogOptions::new(), Utc::now()).unwrap();
        assert_eq!(entry.inserted_at.timestamp_subsec_nanos() % 1_000, 0);
    }
}
