//! Conflict record types
//!
//! A [`ConflictRecord`] materializes one detected group of conflicting
//! concurrent edits: which log entries collided, on which fields, and how
//! bad it is. Records are created by the detector and mutated only by an
//! explicit resolve operation; they are never deleted here.

use crate::types::EntityRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Classification of a detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Two operators edited overlapping fields of the same entity within
    /// the conflict window
    ConcurrentEdit,
    /// A write was rejected because its expected version was stale
    StaleUpdate,
    /// Two writes collided on the same field value
    FieldCollision,
    /// An edit raced against a delete of the same entity
    DeleteConflict,
}

impl ConflictType {
    /// Stable lowercase label, matching the wire encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::ConcurrentEdit => "concurrent_edit",
            ConflictType::StaleUpdate => "stale_update",
            ConflictType::FieldCollision => "field_collision",
            ConflictType::DeleteConflict => "delete_conflict",
        }
    }
}

/// How a conflict was (or will be) resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The latest committed write stands
    LastWriteWins,
    /// A person merged the changes by hand
    ManualMerge,
    /// The system merged non-overlapping changes automatically
    AutoMerge,
    /// The earliest committed write stands
    FirstWriteWins,
    /// Not resolved yet
    Unresolved,
}

/// How serious a conflict is, for triage ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Single-field overlap between two entries
    Low,
    /// Multiple fields overlap
    Medium,
    /// Wide field overlap or several concurrent editors
    High,
    /// Very wide overlap or many concurrent editors
    Critical,
}

impl Severity {
    /// Deterministic severity from the overlap shape
    ///
    /// `overlapping_fields` is the number of distinct fields shared across
    /// the group; `concurrent_entries` is the number of other entries kept
    /// by the detector (the analyzed entry itself is not counted).
    pub fn classify(overlapping_fields: usize, concurrent_entries: usize) -> Severity {
        if overlapping_fields >= 5 || concurrent_entries >= 4 {
            Severity::Critical
        } else if overlapping_fields >= 3 || concurrent_entries >= 2 {
            Severity::High
        } else if overlapping_fields >= 2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Stable lowercase label, matching the wire encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One detected group of conflicting concurrent edits
///
/// `involved_entries` holds at least two operation-log entry ids from
/// distinct operators. The record stays unresolved until an explicit
/// resolve call sets `resolved_at` and a concrete strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unique record id
    pub id: Uuid,
    /// The entity the conflicting edits targeted
    pub entity: EntityRef,
    /// What kind of conflict this is
    pub conflict_type: ConflictType,
    /// When the detector materialized this record
    pub detected_at: DateTime<Utc>,
    /// When the conflict was resolved, if it has been
    pub resolved_at: Option<DateTime<Utc>>,
    /// How it was resolved; `Unresolved` until the resolve call
    pub resolution_strategy: ResolutionStrategy,
    /// Data attached by the resolution workflow (merged payload, notes)
    pub resolution_data: Option<serde_json::Value>,
    /// Triage severity from the overlap shape
    pub severity: Severity,
    /// Operation-log entry ids in the conflicting group
    pub involved_entries: BTreeSet<Uuid>,
    /// Field names the group collided on
    pub overlapping_fields: BTreeSet<String>,
}

impl ConflictRecord {
    /// Create an unresolved record detected now
    pub fn new(
        entity: EntityRef,
        conflict_type: ConflictType,
        severity: Severity,
        involved_entries: BTreeSet<Uuid>,
        overlapping_fields: BTreeSet<String>,
    ) -> Self {
        ConflictRecord {
            id: Uuid::new_v4(),
            entity,
            conflict_type,
            detected_at: Utc::now(),
            resolved_at: None,
            resolution_strategy: ResolutionStrategy::Unresolved,
            resolution_data: None,
            severity,
            involved_entries,
            overlapping_fields,
        }
    }

    /// Whether the resolution workflow has closed this record
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Seconds between detection and resolution, if resolved
    pub fn resolution_seconds(&self) -> Option<f64> {
        self.resolved_at
            .map(|r| (r - self.detected_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_critical() {
        assert_eq!(Severity::classify(5, 1), Severity::Critical);
        assert_eq!(Severity::classify(7, 1), Severity::Critical);
        assert_eq!(Severity::classify(1, 4), Severity::Critical);
    }

    #[test]
    fn severity_table_high() {
        assert_eq!(Severity::classify(3, 1), Severity::High);
        assert_eq!(Severity::classify(4, 1), Severity::High);
        assert_eq!(Severity::classify(1, 2), Severity::High);
        assert_eq!(Severity::classify(1, 3), Severity::High);
    }

    #[test]
    fn severity_table_medium_and_low() {
        // two overlapping fields, one other entry (two involved total)
        assert_eq!(Severity::classify(2, 1), Severity::Medium);
        assert_eq!(Severity::classify(1, 1), Severity::Low);
        assert_eq!(Severity::classify(0, 0), Severity::Low);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn new_record_is_unresolved() {
        let rec = ConflictRecord::new(
            EntityRef::new("attendance", "1"),
            ConflictType::ConcurrentEdit,
            Severity::Low,
            [Uuid::new_v4(), Uuid::new_v4()].into_iter().collect(),
            ["status".to_string()].into_iter().collect(),
        );
        assert!(!rec.is_resolved());
        assert_eq!(rec.resolution_strategy, ResolutionStrategy::Unresolved);
        assert!(rec.resolution_seconds().is_none());
    }

    #[test]
    fn conflict_type_labels() {
        assert_eq!(ConflictType::ConcurrentEdit.as_str(), "concurrent_edit");
        assert_eq!(ConflictType::DeleteConflict.as_str(), "delete_conflict");
        assert_eq!(
            serde_json::to_string(&ConflictType::StaleUpdate).unwrap(),
            "\"stale_update\""
        );
    }
}
