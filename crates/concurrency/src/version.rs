//! Optimistic version guard
//!
//! Conflicts are detected at write time instead of prevented by locking:
//! the guard remembers the version it read, and the save is a single
//! compare-and-swap statement (`UPDATE ... WHERE id = ? AND version = ?`)
//! that bumps the version alongside the changed fields. Zero affected rows
//! means someone committed in between; the caller gets a `StaleObject`
//! error carrying both versions.
//!
//! [`with_optimistic_lock`] re-runs the whole read-modify-write closure on
//! staleness. The generic retry executor must not be used for this: it
//! would replay a closure whose captured reads are exactly what went stale.

use crewsync_core::{EntityRef, EntityStore, Error, FieldMap, Result, VersionedRecord};

/// Bounds `with_optimistic_lock` when the caller has no better number
pub const DEFAULT_OPTIMISTIC_ATTEMPTS: u32 = 3;

/// State machine per save: loaded (expected = v) → saving → committed
/// (v + 1) or rejected with `StaleObject`.
///
/// The guard holds the record it read; after a successful save the record
/// is re-read so chained saves see the committed version, not a guess.
#[derive(Debug)]
pub struct OptimisticVersionGuard<'a, S: EntityStore> {
    store: &'a S,
    record: VersionedRecord,
}

impl<'a, S: EntityStore> OptimisticVersionGuard<'a, S> {
    /// Load the record and remember its version as the expected one
    pub fn load(store: &'a S, entity: &EntityRef) -> Result<Self> {
        let record = store.get(entity)?.ok_or_else(|| Error::NotFound {
            entity: entity.clone(),
        })?;
        Ok(OptimisticVersionGuard { store, record })
    }

    /// The record as of the last load or successful save
    pub fn record(&self) -> &VersionedRecord {
        &self.record
    }

    /// The version a save will be constrained by
    pub fn expected_version(&self) -> u64 {
        self.record.version
    }

    /// Compare-and-swap save of `changes` (shallow, top-level)
    ///
    /// On success the guard re-reads the record and returns the committed
    /// version (`expected + 1`). On a version mismatch the current version
    /// is fetched for diagnostics and [`Error::StaleObject`] is returned;
    /// nothing was written.
    pub fn save(&mut self, changes: FieldMap) -> Result<u64> {
        let entity = self.record.entity.clone();
        let expected = self.record.version;

        if self.store.update_with_version(&entity, expected, changes)? {
            // Re-read so chained saves start from the committed state.
            self.record = self.store.get(&entity)?.ok_or_else(|| Error::NotFound {
                entity: entity.clone(),
            })?;
            tracing::debug!(entity = %entity, version = self.record.version, "optimistic save committed");
            Ok(self.record.version)
        } else {
            let actual = self.store.current_version(&entity)?.unwrap_or(0);
            tracing::debug!(entity = %entity, expected, actual, "optimistic save rejected");
            Err(Error::StaleObject {
                entity,
                expected,
                actual,
            })
        }
    }
}

/// Re-run a read-modify-write closure until it commits or the attempt
/// budget is spent
///
/// Each attempt loads a fresh guard, so the closure always works from the
/// current record. Only [`Error::StaleObject`] triggers another attempt;
/// every other error, and staleness past the budget, propagates.
pub fn with_optimistic_lock<S, T, F>(
    store: &S,
    entity: &EntityRef,
    max_attempts: u32,
    mut body: F,
) -> Result<T>
where
    S: EntityStore,
    F: FnMut(&mut OptimisticVersionGuard<S>) -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        let mut guard = OptimisticVersionGuard::load(store, entity)?;
        match body(&mut guard) {
            Err(Error::StaleObject {
                expected, actual, ..
            }) if attempt + 1 < max_attempts => {
                attempt += 1;
                tracing::debug!(
                    entity = %entity,
                    attempt,
                    expected,
                    actual,
                    "stale version, re-reading and re-applying"
                );
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewsync_storage::MemoryEntityStore;
    use serde_json::json;

    fn changes(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn seeded_store(entity: &EntityRef) -> MemoryEntityStore {
        let store = MemoryEntityStore::new();
        store
            .insert(entity, changes(&[("status", json!("open"))]))
            .unwrap();
        store
    }

    #[test]
    fn save_commits_and_rereads() {
        let entity = EntityRef::new("attendance", "1");
        let store = seeded_store(&entity);

        let mut guard = OptimisticVersionGuard::load(&store, &entity).unwrap();
        assert_eq!(guard.expected_version(), 0);

        let v = guard.save(changes(&[("status", json!("closed"))])).unwrap();
        assert_eq!(v, 1);
        assert_eq!(guard.record().version, 1);
        assert_eq!(guard.record().payload["status"], json!("closed"));

        // chained save starts from the committed version
        let v = guard.save(changes(&[("note", json!("late"))])).unwrap();
        assert_eq!(v, 2);
    }

    #[test]
    fn concurrent_commit_rejects_stale_guard() {
        let entity = EntityRef::new("attendance", "1");
        let store = seeded_store(&entity);

        let mut stale = OptimisticVersionGuard::load(&store, &entity).unwrap();
        let mut winner = OptimisticVersionGuard::load(&store, &entity).unwrap();
        winner.save(changes(&[("status", json!("closed"))])).unwrap();

        let err = stale
            .save(changes(&[("status", json!("reopened"))]))
            .unwrap_err();
        match err {
            Error::StaleObject {
                expected, actual, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected StaleObject, got {other}"),
        }

        // the rejected write changed nothing
        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.payload["status"], json!("closed"));
        assert_eq!(rec.version, 1);
    }

    #[test]
    fn load_missing_entity_is_not_found() {
        let store = MemoryEntityStore::new();
        let err =
            OptimisticVersionGuard::load(&store, &EntityRef::new("ticket", "9")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn optimistic_lock_rereads_between_attempts() {
        let entity = EntityRef::new("attendance", "1");
        let store = seeded_store(&entity);
        let mut first_attempt = true;

        let v = with_optimistic_lock(&store, &entity, 3, |guard| {
            if first_attempt {
                first_attempt = false;
                // another writer commits between our read and our save
                store
                    .update_with_version(
                        &entity,
                        guard.expected_version(),
                        changes(&[("status", json!("closed"))]),
                    )
                    .unwrap();
            }
            guard.save(changes(&[("note", json!("checked"))]))
        })
        .unwrap();

        assert_eq!(v, 2);
        let rec = store.get(&entity).unwrap().unwrap();
        // the concurrent writer's change survived because we re-read
        assert_eq!(rec.payload["status"], json!("closed"));
        assert_eq!(rec.payload["note"], json!("checked"));
    }

    #[test]
    fn optimistic_lock_gives_up_after_budget() {
        let entity = EntityRef::new("attendance", "1");
        let store = seeded_store(&entity);
        let mut calls = 0u32;

        let out: Result<u64> = with_optimistic_lock(&store, &entity, 2, |guard| {
            calls += 1;
            // always invalidate our own read before saving
            store
                .update_with_version(
                    &entity,
                    guard.expected_version(),
                    changes(&[("status", json!("bumped"))]),
                )
                .unwrap();
            guard.save(changes(&[("note", json!("never lands"))]))
        });

        assert!(matches!(out.unwrap_err(), Error::StaleObject { .. }));
        assert_eq!(calls, 2);
    }

    #[test]
    fn optimistic_lock_does_not_retry_fatal_errors() {
        let entity = EntityRef::new("attendance", "1");
        let store = seeded_store(&entity);
        let mut calls = 0u32;

        let out: Result<u64> = with_optimistic_lock(&store, &entity, 5, |_guard| {
            calls += 1;
            Err(Error::Validation("bad change set".into()))
        });
        assert!(matches!(out.unwrap_err(), Error::Validation(_)));
        assert_eq!(calls, 1);
    }
}
