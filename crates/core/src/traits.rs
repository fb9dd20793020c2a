//! Core trait definitions
//!
//! [`EntityStore`] is the seam to the row storage engine. The real backend
//! is a SQL database; this trait captures only what the concurrency layer
//! needs from it: a compare-and-swap update that reports whether it applied,
//! and exclusive row access inside a transaction boundary.

use crate::error::Result;
use crate::types::{EntityRef, FieldMap, VersionedRecord};

/// Row storage seam consumed by the concurrency layer
///
/// Implementations must guarantee:
/// - `update_with_version` is atomic: the version check and the write happen
///   in one statement, and a `false` return leaves the record untouched
/// - `with_row_lock` gives the closure exclusive access to the record for
///   the duration of the call (`SELECT ... FOR UPDATE` semantics), applies
///   the closure's mutation and the version bump only on success, and rolls
///   everything back when the closure fails
pub trait EntityStore: Send + Sync {
    /// Read a record, or `None` if it does not exist
    fn get(&self, entity: &EntityRef) -> Result<Option<VersionedRecord>>;

    /// Create a record at version 0
    ///
    /// Fails with a validation error if the record already exists.
    fn insert(&self, entity: &EntityRef, payload: FieldMap) -> Result<VersionedRecord>;

    /// Compare-and-swap update: apply `changes` (shallow, top-level) and
    /// bump the version by 1, but only if the stored version still equals
    /// `expected_version`
    ///
    /// Returns `true` if the update applied (one row affected) and `false`
    /// if the version check failed (zero rows affected). The caller decides
    /// how to surface the mismatch.
    fn update_with_version(
        &self,
        entity: &EntityRef,
        expected_version: u64,
        changes: FieldMap,
    ) -> Result<bool>;

    /// Current stored version, or `None` if the record does not exist
    fn current_version(&self, entity: &EntityRef) -> Result<Option<u64>>;

    /// Run `f` with exclusive access to the record inside a transaction
    ///
    /// The closure receives the current record and may mutate its payload.
    /// On `Ok` the mutation is committed and the version bumped by 1; on
    /// `Err` nothing is persisted. Fails with `NotFound` if the record does
    /// not exist.
    fn with_row_lock<R, F>(&self, entity: &EntityRef, f: F) -> Result<R>
    where
        F: FnOnce(&mut VersionedRecord) -> Result<R>;
}
