//! Lock-protected read-modify-write of semi-structured payload fields
//!
//! Three update shapes over an entity's payload:
//! - shallow merge (or wholesale replace) of a map of updates
//! - pure-function transform of the whole payload
//! - bounded append to a named array, trimming oldest-first at the cap
//!
//! All three follow one discipline: acquire a distributed lock scoped to
//! `{entity_type}:{operation}:{entity_id}`, then mutate under the storage
//! row lock inside a transaction, then let the guard release the lock on
//! every exit path. Transient failures (lock timeouts, flaky storage) are
//! retried under the `field-update` policy; a transform returning the wrong
//! shape is a fatal validation error and is never retried.
//!
//! ## Guarantees and limits
//!
//! N concurrent appends each keep their own element (no lost appends). N
//! concurrent merges each keep their own keys, except when two merges race
//! on the *same* key: then the last committed transaction wins. Merging is
//! shallow: a nested map is replaced wholesale, never deep-merged.
//!
//! Known gap: if a holder crashes mid-update, the lock TTL self-heals but
//! the storage engine's own transaction handling decides the fate of the
//! in-flight write; lease expiry does not roll it back.

use crate::retry::RetryExecutor;
use crewsync_core::{EntityRef, EntityStore, Error, FieldMap, Result, VersionedRecord};
use crewsync_lockstore::LockRegistry;
use serde_json::Value;
use std::sync::Arc;

/// Safe updater for semi-structured entity fields
///
/// Cheap to clone per call site; the store and registry are shared.
pub struct AtomicFieldUpdater<S: EntityStore> {
    store: Arc<S>,
    registry: Arc<LockRegistry>,
    retry: RetryExecutor,
}

impl<S: EntityStore> AtomicFieldUpdater<S> {
    /// Create an updater over a store and lock registry
    pub fn new(store: Arc<S>, registry: Arc<LockRegistry>) -> Self {
        AtomicFieldUpdater {
            store,
            registry,
            retry: RetryExecutor::named("field-update"),
        }
    }

    /// Override the retry executor (builder style)
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Shallow-merge `updates` into the payload
    ///
    /// Top-level keys from `updates` overwrite existing keys; nested maps
    /// are replaced wholesale (last-write-wins), not deep-merged.
    pub fn merge(&self, entity: &EntityRef, updates: FieldMap) -> Result<VersionedRecord> {
        self.locked_update(entity, "merge", |record| {
            for (field, value) in updates.clone() {
                record.payload.insert(field, value);
            }
            Ok(())
        })
    }

    /// Replace the payload wholesale
    pub fn replace(&self, entity: &EntityRef, payload: FieldMap) -> Result<VersionedRecord> {
        self.locked_update(entity, "replace", |record| {
            record.payload = payload.clone();
            Ok(())
        })
    }

    /// Apply a pure function to the payload and persist its result
    ///
    /// The function receives the current payload and must return a JSON
    /// object; any other shape is a fatal validation error and nothing is
    /// written. The function may run more than once under retry, so it must
    /// be pure: no I/O, no external mutation.
    pub fn transform<F>(&self, entity: &EntityRef, f: F) -> Result<VersionedRecord>
    where
        F: Fn(&FieldMap) -> Value,
    {
        self.locked_update(entity, "transform", |record| {
            match f(&record.payload) {
                Value::Object(updated) => {
                    record.payload = updated;
                    Ok(())
                }
                other => Err(Error::Validation(format!(
                    "transform must return an object, got {}",
                    json_kind(&other)
                ))),
            }
        })
    }

    /// Append `item` to the array stored under `array_field`
    ///
    /// A missing field is created as an empty array; a non-array value
    /// there is a fatal validation error. When `max_len` is set and
    /// exceeded, elements are trimmed from the front so the most recent
    /// `max_len` items survive in append order.
    pub fn append_bounded(
        &self,
        entity: &EntityRef,
        array_field: &str,
        item: Value,
        max_len: Option<usize>,
    ) -> Result<VersionedRecord> {
        self.locked_update(entity, "append", |record| {
            let slot = record
                .payload
                .entry(array_field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let kind = json_kind(slot);
            let arr = slot.as_array_mut().ok_or_else(|| {
                Error::Validation(format!(
                    "field '{array_field}' holds {kind}, expected an array"
                ))
            })?;
            arr.push(item.clone());
            if let Some(max) = max_len {
                if arr.len() > max {
                    let excess = arr.len() - max;
                    arr.drain(0..excess);
                }
            }
            Ok(())
        })
    }

    /// The shared discipline: distributed lock, then row lock, then apply
    ///
    /// The lock class is `{entity_type}:{operation}` and the registry
    /// appends the entity id, so concurrent updaters of the same entity and
    /// operation serialize while unrelated entities proceed in parallel.
    /// The guard releases the lock on success, error, and panic alike.
    fn locked_update<F>(
        &self,
        entity: &EntityRef,
        operation: &str,
        apply: F,
    ) -> Result<VersionedRecord>
    where
        F: Fn(&mut VersionedRecord) -> Result<()>,
    {
        let class = format!("{}:{}", entity.entity_type, operation);
        self.retry.run(|| {
            let lock = self.registry.get_lock(&class, &entity.entity_id);
            let _guard = lock.acquire_guard(true)?;
            self.store.with_row_lock(entity, |record| {
                apply(record)?;
                Ok(record.clone())
            })
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
