//! Conflict detection over the operation log
//!
//! Pure analysis: given one new log entry, find operator-disjoint entries
//! for the same entity inside the conflict window whose changed fields
//! overlap, and materialize one classified `concurrent_edit` record on the
//! board.
//!
//! There is deliberately no de-duplication guard: when several entries of
//! one overlapping group are each analyzed (the middleware calls in per
//! entry), each analysis can materialize its own record. Downstream
//! resolution tolerates that today; collapsing the groups here would change
//! the analytics feed.

use crate::board::ConflictBoard;
use crate::log::OperationLog;
use chrono::Duration;
use crewsync_core::{ConflictRecord, ConflictType, OperationLogEntry, Result, Severity};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Tuning knobs for the detector
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Half-width of the conflict window: entries within ± this span of the
    /// analyzed entry are candidates
    pub window: Duration,
    /// Minimum number of shared changed fields for a candidate to count
    pub min_overlap: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            window: Duration::seconds(300),
            min_overlap: 1,
        }
    }
}

/// Correlates overlapping concurrent edits into conflict records
pub struct ConflictDetector {
    log: Arc<OperationLog>,
    board: Arc<ConflictBoard>,
    config: DetectorConfig,
}

impl ConflictDetector {
    /// Create a detector with default tuning
    pub fn new(log: Arc<OperationLog>, board: Arc<ConflictBoard>) -> Self {
        Self::with_config(log, board, DetectorConfig::default())
    }

    /// Create a detector with explicit tuning
    pub fn with_config(
        log: Arc<OperationLog>,
        board: Arc<ConflictBoard>,
        config: DetectorConfig,
    ) -> Self {
        ConflictDetector { log, board, config }
    }

    /// Analyze one entry against the log
    ///
    /// Returns the materialized record, or `None` when no operator-disjoint
    /// overlapping edits exist in the window. The record is also inserted
    /// on the board.
    pub fn analyze(&self, entry: &OperationLogEntry) -> Result<Option<ConflictRecord>> {
        let concurrent = self.concurrent_overlapping(entry);
        if concurrent.is_empty() {
            return Ok(None);
        }

        let mut overlapping_fields = BTreeSet::new();
        for other in &concurrent {
            overlapping_fields.extend(entry.overlapping_fields(other));
        }
        let severity = Severity::classify(overlapping_fields.len(), concurrent.len());

        let involved: BTreeSet<Uuid> = std::iter::once(entry.id)
            .chain(concurrent.iter().map(|e| e.id))
            .collect();
        let record = ConflictRecord::new(
            entry.entity.clone(),
            ConflictType::ConcurrentEdit,
            severity,
            involved,
            overlapping_fields,
        );

        tracing::info!(
            entity = %entry.entity,
            severity = severity.as_str(),
            entries = record.involved_entries.len(),
            fields = record.overlapping_fields.len(),
            "concurrent edit detected"
        );
        self.board.insert(record.clone());
        Ok(Some(record))
    }

    /// Entries concurrent with `entry` that a conflict could involve:
    /// same entity, inside the window, different operator, and sharing at
    /// least `min_overlap` changed fields
    pub(crate) fn concurrent_overlapping(
        &self,
        entry: &OperationLogEntry,
    ) -> Vec<OperationLogEntry> {
        self.log
            .entries_for_entity_within(&entry.entity, entry.timestamp, self.config.window)
            .into_iter()
            .filter(|e| e.id != entry.id)
            .filter(|e| e.operator_id != entry.operator_id)
            .filter(|e| entry.overlapping_fields(e).len() >= self.config.min_overlap)
            .collect()
    }
}
