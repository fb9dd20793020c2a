//! Mutex-per-row in-memory entity store

use crewsync_core::{EntityRef, EntityStore, Error, FieldMap, Result, VersionedRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory [`EntityStore`] with one mutex per record
///
/// The outer map is only touched to look up or create rows; every read and
/// write of a row's contents goes through that row's mutex, so writers to
/// different records never contend and writers to the same record serialize
/// exactly like they would on a SQL row lock.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    rows: DashMap<EntityRef, Arc<Mutex<VersionedRecord>>>,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, entity: &EntityRef) -> Option<Arc<Mutex<VersionedRecord>>> {
        self.rows.get(entity).map(|r| Arc::clone(r.value()))
    }

    /// Number of stored records, for diagnostics
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl EntityStore for MemoryEntityStore {
    fn get(&self, entity: &EntityRef) -> Result<Option<VersionedRecord>> {
        Ok(self.row(entity).map(|row| row.lock().clone()))
    }

    fn insert(&self, entity: &EntityRef, payload: FieldMap) -> Result<VersionedRecord> {
        use dashmap::mapref::entry::Entry;
        match self.rows.entry(entity.clone()) {
            Entry::Occupied(_) => Err(Error::Validation(format!("{entity} already exists"))),
            Entry::Vacant(slot) => {
                let record = VersionedRecord::new(entity.clone(), payload);
                slot.insert(Arc::new(Mutex::new(record.clone())));
                tracing::debug!(entity = %entity, "record created");
                Ok(record)
            }
        }
    }

    fn update_with_version(
        &self,
        entity: &EntityRef,
        expected_version: u64,
        changes: FieldMap,
    ) -> Result<bool> {
        let row = self.row(entity).ok_or_else(|| Error::NotFound {
            entity: entity.clone(),
        })?;
        let mut record = row.lock();
        if record.version != expected_version {
            return Ok(false);
        }
        for (field, value) in changes {
            record.payload.insert(field, value);
        }
        record.version += 1;
        tracing::debug!(entity = %entity, version = record.version, "versioned update applied");
        Ok(true)
    }

    fn current_version(&self, entity: &EntityRef) -> Result<Option<u64>> {
        Ok(self.row(entity).map(|row| row.lock().version))
    }

    fn with_row_lock<R, F>(&self, entity: &EntityRef, f: F) -> Result<R>
    where
        F: FnOnce(&mut VersionedRecord) -> Result<R>,
    {
        let row = self.row(entity).ok_or_else(|| Error::NotFound {
            entity: entity.clone(),
        })?;
        let mut slot = row.lock();
        // Work on a private copy so a failed closure commits nothing.
        let mut working = slot.clone();
        let out = f(&mut working)?;
        working.version = slot.version + 1;
        *slot = working;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_then_get() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("attendance", "1");
        store
            .insert(&entity, payload(&[("status", json!("open"))]))
            .unwrap();
        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.version, 0);
        assert_eq!(rec.payload["status"], json!("open"));
    }

    #[test]
    fn double_insert_rejected() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("attendance", "1");
        store.insert(&entity, FieldMap::new()).unwrap();
        let err = store.insert(&entity, FieldMap::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn versioned_update_increments_by_one() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("attendance", "1");
        store.insert(&entity, FieldMap::new()).unwrap();

        assert!(store
            .update_with_version(&entity, 0, payload(&[("status", json!("closed"))]))
            .unwrap());
        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.version, 1);
        assert_eq!(rec.payload["status"], json!("closed"));
    }

    #[test]
    fn stale_update_leaves_record_unchanged() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("attendance", "1");
        store
            .insert(&entity, payload(&[("status", json!("open"))]))
            .unwrap();
        store
            .update_with_version(&entity, 0, payload(&[("status", json!("closed"))]))
            .unwrap();

        // expected version 0 is now stale
        assert!(!store
            .update_with_version(&entity, 0, payload(&[("status", json!("reopened"))]))
            .unwrap());
        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.version, 1);
        assert_eq!(rec.payload["status"], json!("closed"));
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let store = MemoryEntityStore::new();
        let err = store
            .update_with_version(&EntityRef::new("ticket", "9"), 0, FieldMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn row_lock_commits_on_success() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("work_order", "5");
        store.insert(&entity, FieldMap::new()).unwrap();

        let version = store
            .with_row_lock(&entity, |rec| {
                rec.payload.insert("assignee".into(), json!("w-1"));
                Ok(rec.version)
            })
            .unwrap();
        assert_eq!(version, 0);

        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.version, 1);
        assert_eq!(rec.payload["assignee"], json!("w-1"));
    }

    #[test]
    fn row_lock_rolls_back_on_failure() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::new("work_order", "5");
        store
            .insert(&entity, payload(&[("assignee", json!("w-1"))]))
            .unwrap();

        let err = store
            .with_row_lock(&entity, |rec| -> Result<()> {
                rec.payload.insert("assignee".into(), json!("w-2"));
                Err(Error::Validation("transform rejected".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.version, 0);
        assert_eq!(rec.payload["assignee"], json!("w-1"));
    }

    #[test]
    fn concurrent_row_lock_updates_all_land() {
        use std::thread;

        let store = Arc::new(MemoryEntityStore::new());
        let entity = EntityRef::new("attendance", "1");
        store
            .insert(&entity, payload(&[("count", json!(0))]))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let entity = entity.clone();
                thread::spawn(move || {
                    store
                        .with_row_lock(&entity, |rec| {
                            let n = rec.payload["count"].as_i64().unwrap_or(0);
                            rec.payload.insert("count".into(), json!(n + 1));
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rec = store.get(&entity).unwrap().unwrap();
        assert_eq!(rec.payload["count"], json!(8));
        assert_eq!(rec.version, 8);
    }
}
