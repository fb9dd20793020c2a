//! Operation log entry types
//!
//! Every successful mutation in the backend is recorded by the request
//! middleware as one [`OperationLogEntry`]: which operator changed which
//! fields of which entity, and when. Entries are immutable once written;
//! the conflict detector only ever reads them.

use crate::types::EntityRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Kind of mutation an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Entity was created
    Create,
    /// Existing fields were modified
    Update,
    /// Entity was deleted
    Delete,
}

/// Old and new value of one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the mutation
    pub old: serde_json::Value,
    /// Value after the mutation
    pub new: serde_json::Value,
}

impl FieldChange {
    /// Create a field change from old and new values
    pub fn new(old: serde_json::Value, new: serde_json::Value) -> Self {
        FieldChange { old, new }
    }
}

/// One field-level change set in the append-only operation log
///
/// Written once by the logging middleware, never mutated or deleted here.
/// `session_id` groups the entries produced by a single client sync burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    /// Unique entry id
    pub id: Uuid,
    /// The entity that was mutated
    pub entity: EntityRef,
    /// Who performed the mutation
    pub operator_id: String,
    /// What kind of mutation this was
    pub operation: Operation,
    /// Changed fields, keyed by field name
    pub field_changes: BTreeMap<String, FieldChange>,
    /// When the mutation committed
    pub timestamp: DateTime<Utc>,
    /// Groups related entries from one client sync burst
    pub session_id: Uuid,
    /// Optional device metadata supplied by the client
    pub device: Option<serde_json::Value>,
}

impl OperationLogEntry {
    /// Create an entry timestamped now
    pub fn new(
        entity: EntityRef,
        operator_id: impl Into<String>,
        operation: Operation,
        field_changes: BTreeMap<String, FieldChange>,
        session_id: Uuid,
    ) -> Self {
        OperationLogEntry {
            id: Uuid::new_v4(),
            entity,
            operator_id: operator_id.into(),
            operation,
            field_changes,
            timestamp: Utc::now(),
            session_id,
            device: None,
        }
    }

    /// Override the timestamp (builder style)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach device metadata (builder style)
    pub fn with_device(mut self, device: serde_json::Value) -> Self {
        self.device = Some(device);
        self
    }

    /// Names of the fields this entry changed
    pub fn changed_fields(&self) -> BTreeSet<&str> {
        self.field_changes.keys().map(String::as_str).collect()
    }

    /// Names shared between this entry's changes and another's
    pub fn overlapping_fields(&self, other: &OperationLogEntry) -> BTreeSet<String> {
        self.field_changes
            .keys()
            .filter(|k| other.field_changes.contains_key(*k))
            .cloned()
            .collect()
    }
}
