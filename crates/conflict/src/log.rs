//! Append-only operation log store
//!
//! The request middleware appends one entry per successful mutation; this
//! store never updates or deletes them. Reads are window queries over one
//! entity or one operator, which is all the detector and the feature
//! extractor need. A relational backend would index
//! `(entity_type, entity_id, timestamp)`; here a scan over an in-memory
//! vector plays that part.

use chrono::{DateTime, Duration, Utc};
use crewsync_core::{EntityRef, FieldChange, Operation, OperationLogEntry};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Append-only store of [`OperationLogEntry`] records
#[derive(Default)]
pub struct OperationLog {
    entries: RwLock<Vec<OperationLogEntry>>,
}

impl OperationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prebuilt entry, returning its id
    ///
    /// Entries are immutable once appended.
    pub fn append(&self, entry: OperationLogEntry) -> Uuid {
        let id = entry.id;
        tracing::debug!(entity = %entry.entity, operator = %entry.operator_id, op = ?entry.operation, "log entry appended");
        self.entries.write().push(entry);
        id
    }

    /// Build and append an entry timestamped now
    ///
    /// This is the producer-side convenience the middleware calls after a
    /// successful mutation.
    pub fn record(
        &self,
        entity: EntityRef,
        operator_id: impl Into<String>,
        operation: Operation,
        field_changes: BTreeMap<String, FieldChange>,
        session_id: Uuid,
    ) -> OperationLogEntry {
        let entry = OperationLogEntry::new(entity, operator_id, operation, field_changes, session_id);
        self.append(entry.clone());
        entry
    }

    /// Fetch one entry by id
    pub fn entry(&self, id: Uuid) -> Option<OperationLogEntry> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    /// Number of entries in the log
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entries for `entity` with timestamps in `[center - window, center + window]`
    pub fn entries_for_entity_within(
        &self,
        entity: &EntityRef,
        center: DateTime<Utc>,
        window: Duration,
    ) -> Vec<OperationLogEntry> {
        let from = center - window;
        let to = center + window;
        self.entries
            .read()
            .iter()
            .filter(|e| e.entity == *entity && e.timestamp >= from && e.timestamp <= to)
            .cloned()
            .collect()
    }

    /// Entries for `entity` in the half-open range `[from, to)`
    pub fn entries_for_entity_between(
        &self,
        entity: &EntityRef,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<OperationLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.entity == *entity && e.timestamp >= from && e.timestamp < to)
            .cloned()
            .collect()
    }

    /// All entries written by one operator
    pub fn entries_by_operator(&self, operator_id: &str) -> Vec<OperationLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.operator_id == operator_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change_set(fields: &[&str]) -> BTreeMap<String, FieldChange> {
        fields
            .iter()
            .map(|f| (f.to_string(), FieldChange::new(json!(null), json!(1))))
            .collect()
    }

    fn entry_at(entity: &EntityRef, operator: &str, at: DateTime<Utc>) -> OperationLogEntry {
        OperationLogEntry::new(
            entity.clone(),
            operator,
            Operation::Update,
            change_set(&["status"]),
            Uuid::new_v4(),
        )
        .with_timestamp(at)
    }

    #[test]
    fn append_then_fetch_by_id() {
        let log = OperationLog::new();
        let entity = EntityRef::new("attendance", "1");
        let entry = log.record(
            entity,
            "op-a",
            Operation::Create,
            change_set(&["status"]),
            Uuid::new_v4(),
        );
        assert_eq!(log.entry(entry.id).unwrap(), entry);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn window_query_is_inclusive_and_entity_scoped() {
        let log = OperationLog::new();
        let entity = EntityRef::new("attendance", "1");
        let other = EntityRef::new("attendance", "2");
        let t0 = Utc::now();

        log.append(entry_at(&entity, "a", t0 - Duration::seconds(400)));
        let edge = entry_at(&entity, "b", t0 - Duration::seconds(300));
        log.append(edge.clone());
        log.append(entry_at(&entity, "c", t0));
        log.append(entry_at(&other, "d", t0));

        let hits = log.entries_for_entity_within(&entity, t0, Duration::seconds(300));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|e| e.id == edge.id));
        assert!(hits.iter().all(|e| e.entity == entity));
    }

    #[test]
    fn operator_query_filters() {
        let log = OperationLog::new();
        let entity = EntityRef::new("ticket", "7");
        let t0 = Utc::now();
        log.append(entry_at(&entity, "a", t0));
        log.append(entry_at(&entity, "a", t0 + Duration::seconds(1)));
        log.append(entry_at(&entity, "b", t0));

        assert_eq!(log.entries_by_operator("a").len(), 2);
        assert_eq!(log.entries_by_operator("b").len(), 1);
        assert!(log.entries_by_operator("c").is_empty());
    }

    #[test]
    fn between_query_is_half_open() {
        let log = OperationLog::new();
        let entity = EntityRef::new("ticket", "7");
        let t0 = Utc::now();
        log.append(entry_at(&entity, "a", t0));
        log.append(entry_at(&entity, "a", t0 + Duration::seconds(10)));

        let hits = log.entries_for_entity_between(&entity, t0, t0 + Duration::seconds(10));
        assert_eq!(hits.len(), 1);
    }
}
