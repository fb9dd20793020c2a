//! Feature extraction for the conflict-prediction training pipeline
//!
//! For a given operation-log entry, produce a flat numeric row plus the 0/1
//! label derived from whether the entry is linked to any conflict record.
//! This is the whole contract with the downstream model; training and
//! inference live elsewhere.

use crate::board::ConflictBoard;
use crate::detector::{ConflictDetector, DetectorConfig};
use crate::log::OperationLog;
use chrono::Duration;
use crewsync_core::OperationLogEntry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Flat numeric feature row for one log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    /// Distinct other operators editing the same entity inside the window
    pub concurrent_editors: f64,
    /// Hours since this operator's previous entry for the same entity type;
    /// 0.0 when there is none
    pub hours_since_last_sync: f64,
    /// Fraction of this operator's entries linked to a conflict record
    pub user_conflict_rate: f64,
    /// Edits to this entity in the 24 hours before the entry
    pub entity_edit_frequency: f64,
    /// Overlapping fields with concurrent edits, as a fraction of the
    /// entry's own changed fields
    pub field_overlap_score: f64,
    /// 1 when the entry is linked to any conflict record, else 0
    pub conflict_occurred: u8,
}

/// Builds [`FeatureRow`]s from the log and the board
pub struct FeatureExtractor {
    log: Arc<OperationLog>,
    board: Arc<ConflictBoard>,
    config: DetectorConfig,
}

impl FeatureExtractor {
    /// Create an extractor using the default detector window
    pub fn new(log: Arc<OperationLog>, board: Arc<ConflictBoard>) -> Self {
        Self::with_config(log, board, DetectorConfig::default())
    }

    /// Create an extractor with an explicit window configuration
    pub fn with_config(
        log: Arc<OperationLog>,
        board: Arc<ConflictBoard>,
        config: DetectorConfig,
    ) -> Self {
        FeatureExtractor { log, board, config }
    }

    /// Extract the feature row for one entry
    pub fn extract(&self, entry: &OperationLogEntry) -> FeatureRow {
        let detector = ConflictDetector::with_config(
            Arc::clone(&self.log),
            Arc::clone(&self.board),
            self.config,
        );
        let concurrent = detector.concurrent_overlapping(entry);

        let editors: BTreeSet<&str> = concurrent
            .iter()
            .map(|e| e.operator_id.as_str())
            .collect();

        let mut overlap = BTreeSet::new();
        for other in &concurrent {
            overlap.extend(entry.overlapping_fields(other));
        }
        let own_fields = entry.field_changes.len();
        let field_overlap_score = if own_fields == 0 {
            0.0
        } else {
            overlap.len() as f64 / own_fields as f64
        };

        FeatureRow {
            concurrent_editors: editors.len() as f64,
            hours_since_last_sync: self.hours_since_last_sync(entry),
            user_conflict_rate: self.user_conflict_rate(&entry.operator_id),
            entity_edit_frequency: self.entity_edit_frequency(entry),
            field_overlap_score,
            conflict_occurred: u8::from(self.board.is_conflicted(entry.id)),
        }
    }

    fn hours_since_last_sync(&self, entry: &OperationLogEntry) -> f64 {
        self.log
            .entries_by_operator(&entry.operator_id)
            .into_iter()
            .filter(|e| e.id != entry.id)
            .filter(|e| e.entity.entity_type == entry.entity.entity_type)
            .filter(|e| e.timestamp < entry.timestamp)
            .map(|e| e.timestamp)
            .max()
            .map(|prev| (entry.timestamp - prev).num_seconds() as f64 / 3600.0)
            .unwrap_or(0.0)
    }

    fn user_conflict_rate(&self, operator_id: &str) -> f64 {
        let entries = self.log.entries_by_operator(operator_id);
        if entries.is_empty() {
            return 0.0;
        }
        let conflicted = entries
            .iter()
            .filter(|e| self.board.is_conflicted(e.id))
            .count();
        conflicted as f64 / entries.len() as f64
    }

    fn entity_edit_frequency(&self, entry: &OperationLogEntry) -> f64 {
        self.log
            .entries_for_entity_between(
                &entry.entity,
                entry.timestamp - Duration::hours(24),
                entry.timestamp,
            )
            .into_iter()
            .filter(|e| e.id != entry.id)
            .count() as f64
    }
}
