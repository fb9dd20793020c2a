//! Conflict record store, resolution entry point, and statistics
//!
//! The board holds every [`ConflictRecord`] the detector materializes.
//! Records are created unresolved and closed exactly once by `resolve`;
//! nothing here ever deletes one. Query surfaces: unresolved records with
//! optional entity-type and severity filters, per-entry linkage (the
//! training-data label), and windowed aggregate statistics.

use chrono::{Duration, Utc};
use crewsync_core::{
    ConflictRecord, ConflictType, Error, ResolutionStrategy, Result, Severity,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Aggregate view over a trailing window of conflict records
#[derive(Debug, Clone, Serialize)]
pub struct ConflictStatistics {
    /// Records detected inside the window
    pub total_conflicts: u64,
    /// Of those, how many are still unresolved
    pub unresolved_count: u64,
    /// Counts per conflict type
    pub by_type: BTreeMap<ConflictType, u64>,
    /// Counts per severity
    pub by_severity: BTreeMap<Severity, u64>,
    /// Mean seconds from detection to resolution, over resolved records
    pub avg_resolution_seconds: Option<f64>,
}

/// Store of detected conflicts and the resolve workflow entry point
#[derive(Default)]
pub struct ConflictBoard {
    records: RwLock<Vec<ConflictRecord>>,
}

impl ConflictBoard {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly detected record
    pub fn insert(&self, record: ConflictRecord) {
        self.records.write().push(record);
    }

    /// Fetch one record by id
    pub fn get(&self, id: Uuid) -> Option<ConflictRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Number of records on the board
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the board holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Unresolved records, newest first, optionally filtered
    ///
    /// `severity` is a floor: passing `High` returns high and critical
    /// records.
    pub fn unresolved(
        &self,
        entity_type: Option<&str>,
        min_severity: Option<Severity>,
    ) -> Vec<ConflictRecord> {
        let entity_type = entity_type.map(str::to_ascii_lowercase);
        let mut out: Vec<ConflictRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| !r.is_resolved())
            .filter(|r| {
                entity_type
                    .as_deref()
                    .map_or(true, |t| r.entity.entity_type == t)
            })
            .filter(|r| min_severity.map_or(true, |s| r.severity >= s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        out
    }

    /// Close a record with a concrete strategy
    ///
    /// Sets `resolved_at` and stores any resolution data. Fails if the
    /// record does not exist, is already resolved, or the strategy is
    /// `Unresolved` (closing a conflict as unresolved is meaningless).
    pub fn resolve(
        &self,
        id: Uuid,
        strategy: ResolutionStrategy,
        resolution_data: Option<serde_json::Value>,
    ) -> Result<()> {
        if strategy == ResolutionStrategy::Unresolved {
            return Err(Error::Validation(
                "cannot resolve a conflict with the 'unresolved' strategy".into(),
            ));
        }
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::ConflictRecordNotFound(id))?;
        if record.is_resolved() {
            return Err(Error::Validation(format!(
                "conflict record {id} is already resolved"
            )));
        }
        record.resolved_at = Some(Utc::now());
        record.resolution_strategy = strategy;
        record.resolution_data = resolution_data;
        tracing::info!(conflict = %id, strategy = ?strategy, "conflict resolved");
        Ok(())
    }

    /// Whether any record links the given operation-log entry
    ///
    /// This is the 0/1 training label for the feature contract.
    pub fn is_conflicted(&self, entry_id: Uuid) -> bool {
        self.records
            .read()
            .iter()
            .any(|r| r.involved_entries.contains(&entry_id))
    }

    /// All records linking the given operation-log entry
    pub fn records_involving(&self, entry_id: Uuid) -> Vec<ConflictRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.involved_entries.contains(&entry_id))
            .cloned()
            .collect()
    }

    /// Aggregate statistics over the trailing `window_days`
    pub fn statistics(&self, window_days: i64) -> ConflictStatistics {
        let cutoff = Utc::now() - Duration::days(window_days);
        let records = self.records.read();
        let windowed: Vec<&ConflictRecord> =
            records.iter().filter(|r| r.detected_at >= cutoff).collect();

        let mut by_type = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        let mut unresolved = 0u64;
        let mut resolution_secs = Vec::new();
        for r in &windowed {
            *by_type.entry(r.conflict_type).or_insert(0) += 1;
            *by_severity.entry(r.severity).or_insert(0) += 1;
            if let Some(secs) = r.resolution_seconds() {
                resolution_secs.push(secs);
            } else {
                unresolved += 1;
            }
        }
        let avg_resolution_seconds = if resolution_secs.is_empty() {
            None
        } else {
            Some(resolution_secs.iter().sum::<f64>() / resolution_secs.len() as f64)
        };

        ConflictStatistics {
            total_conflicts: windowed.len() as u64,
            unresolved_count: unresolved,
            by_type,
            by_severity,
            avg_resolution_seconds,
        }
    }
}
