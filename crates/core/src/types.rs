//! Entity references and versioned records
//!
//! An [`EntityRef`] names one mutable backend record (an attendance row, a
//! work order, a helpdesk ticket). A [`VersionedRecord`] pairs that reference
//! with the record's semi-structured payload and its optimistic-concurrency
//! version.
//!
//! ## Invariants
//!
//! - `version` starts at 0 on creation
//! - every successful update increments `version` by exactly 1
//! - an update whose expected version does not match the stored version is
//!   rejected without modifying the record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semi-structured payload attached to an entity
///
/// Field names map to arbitrary JSON values. Shallow by convention: update
/// operations treat only the top level as mergeable.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Reference to one backend record: entity type plus entity id
///
/// Both components are stored lowercased so that two references to the same
/// logical record always compare (and hash) equal regardless of caller
/// casing. Lock keys and storage keys are derived from this normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type, e.g. "attendance" or "work_order"
    pub entity_type: String,
    /// Entity id within the type, usually a primary key rendered as a string
    pub entity_id: String,
}

impl EntityRef {
    /// Create a reference, normalizing both components to lowercase
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        EntityRef {
            entity_type: entity_type.into().to_ascii_lowercase(),
            entity_id: entity_id.into().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// A record plus its optimistic-concurrency version
///
/// The version is the compare-and-swap token for
/// `EntityStore::update_with_version`: writers state the version they read,
/// and the store rejects the write if the stored version has moved on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// The record this payload belongs to
    pub entity: EntityRef,
    /// Monotonically increasing update counter, 0 on creation
    pub version: u64,
    /// Semi-structured record payload
    pub payload: FieldMap,
}

impl VersionedRecord {
    /// Create a fresh record at version 0
    pub fn new(entity: EntityRef, payload: FieldMap) -> Self {
        VersionedRecord {
            entity,
            version: 0,
            payload,
        }
    }
}
