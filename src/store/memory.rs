// src/store/memory.rs
//! In-process stores. Every call yields to the scheduler first, so concurrent
//! invocations interleave at the same points they would against a remote store.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::{AttrValue, BlobStore, Record, RecordKey, RecordStore, Update};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded by the last `put` of this object.
    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let objects = self.objects.lock().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, ct)| ct.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        tokio::task::yield_now().await;
        let objects = self.objects.lock().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut objects = self.objects.lock().await;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            (bytes, content_type.to_string()),
        );
        Ok(())
    }
}

/// Table → key → record, with atomic conditional updates.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, BTreeMap<RecordKey, Record>>>,
    injected_conflicts: AtomicU32,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` updates fail with `StoreError::Conflict` before touching state.
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of records in a table.
    pub async fn count(&self, table: &str) -> usize {
        self.tables.lock().await.get(table).map_or(0, BTreeMap::len)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_item(&self, table: &str, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        tokio::task::yield_now().await;
        let tables = self.tables.lock().await;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        key: &RecordKey,
        attrs: BTreeMap<String, AttrValue>,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut tables = self.tables.lock().await;
        let items = tables.entry(table.to_string()).or_default();
        let version = items.get(key).map_or(0, |r| r.version) + 1;
        items.insert(key.clone(), Record { attrs, version });
        Ok(())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &RecordKey,
        update: Update,
    ) -> Result<Record, StoreError> {
        tokio::task::yield_now().await;
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict(format!("{table}/{key}")));
        }
        let mut tables = self.tables.lock().await;
        let items = tables.entry(table.to_string()).or_default();
        let current = items.get(key);
        if !update.condition_holds(current) {
            return Err(StoreError::ConditionFailed);
        }
        let next = update.apply(current.cloned())?;
        items.insert(key.clone(), next.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Condition;

    #[tokio::test]
    async fn blob_roundtrip_and_not_found() {
        let s = MemoryBlobStore::new();
        s.put("b", "k.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(s.get("b", "k.json").await.unwrap(), b"{}".to_vec());
        assert_eq!(
            s.content_type("b", "k.json").await.as_deref(),
            Some("application/json")
        );
        assert!(matches!(
            s.get("b", "missing").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_guard_leaves_item_untouched() {
        let s = MemoryRecordStore::new();
        let key = RecordKey::simple("c1");
        s.update_item("t", &key, Update::new().set("a", AttrValue::Int(1)))
            .await
            .unwrap();
        let err = s
            .update_item(
                "t",
                &key,
                Update::new()
                    .set("a", AttrValue::Int(2))
                    .when(Condition::AttributeNotExists("a".into())),
            )
            .await;
        assert!(matches!(err, Err(StoreError::ConditionFailed)));
        let rec = s.get_item("t", &key).await.unwrap().unwrap();
        assert_eq!(rec.get_int("a"), Some(1));
        assert_eq!(rec.version, 1);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let s = MemoryRecordStore::new();
        s.inject_conflicts(2);
        let key = RecordKey::simple("c1");
        for _ in 0..2 {
            assert!(matches!(
                s.update_item("t", &key, Update::new().add("n", 1)).await,
                Err(StoreError::Conflict(_))
            ));
        }
        let rec = s.update_item("t", &key, Update::new().add("n", 1)).await.unwrap();
        assert_eq!(rec.get_int("n"), Some(1));
    }

    #[tokio::test]
    async fn put_item_overwrites() {
        let s = MemoryRecordStore::new();
        let key = RecordKey::simple("c1");
        s.update_item("t", &key, Update::new().set("a", AttrValue::Int(1)))
            .await
            .unwrap();
        let mut attrs = BTreeMap::new();
        attrs.insert("b".to_string(), AttrValue::Bool(true));
        s.put_item("t", &key, attrs).await.unwrap();
        let rec = s.get_item("t", &key).await.unwrap().unwrap();
        assert!(!rec.has("a"));
        assert_eq!(rec.version, 2);
        assert_eq!(s.count("t").await, 1);
    }
}
