// src/store/mod.rs
//! Blob and record store collaborators.
//!
//! Both are async traits so a managed object store / key-value database can be plugged in;
//! the crate ships in-process implementations (`memory`, `fs`) used by the local server
//! and the tests.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StoreError;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryRecordStore};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object. Missing keys fail with `StoreError::NotFound`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Scalar attribute stored on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Partition key plus optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl RecordKey {
    pub fn simple(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            sort: None,
        }
    }

    pub fn composite(partition: &str, sort: &str) -> Self {
        Self {
            partition: partition.to_string(),
            sort: Some(sort.to_string()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sort {
            Some(s) => write!(f, "{}#{}", self.partition, s),
            None => f.write_str(&self.partition),
        }
    }
}

/// Stored item. `version` increases on every write; 0 means "never written".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub attrs: BTreeMap<String, AttrValue>,
    pub version: u64,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.attrs.get(name) {
            Some(AttrValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name) {
            Some(AttrValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name) {
            Some(AttrValue::Float(x)) => Some(*x),
            Some(AttrValue::Int(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Guard evaluated atomically with an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The attribute must not be present yet (first-write guard).
    AttributeNotExists(String),
    /// The record must still be at this version (optimistic concurrency).
    VersionEquals(u64),
}

/// Partial update. Missing records are created (upsert).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: BTreeMap<String, AttrValue>,
    pub set_if_absent: BTreeMap<String, AttrValue>,
    /// Atomic integer increments; absent attributes start from 0.
    pub add: BTreeMap<String, i64>,
    pub condition: Option<Condition>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: AttrValue) -> Self {
        self.set.insert(name.to_string(), value);
        self
    }

    pub fn set_if_absent(mut self, name: &str, value: AttrValue) -> Self {
        self.set_if_absent.insert(name.to_string(), value);
        self
    }

    pub fn add(mut self, name: &str, delta: i64) -> Self {
        self.add.insert(name.to_string(), delta);
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Check the guard against the current state of the item.
    pub fn condition_holds(&self, current: Option<&Record>) -> bool {
        match &self.condition {
            None => true,
            Some(Condition::AttributeNotExists(name)) => !current.is_some_and(|r| r.has(name)),
            Some(Condition::VersionEquals(v)) => current.map_or(0, |r| r.version) == *v,
        }
    }

    /// Apply to `current` (or an empty record) and return the new state.
    pub fn apply(&self, current: Option<Record>) -> Result<Record, StoreError> {
        let mut rec = current.unwrap_or_default();
        for (name, value) in &self.set_if_absent {
            rec.attrs.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for (name, value) in &self.set {
            rec.attrs.insert(name.clone(), value.clone());
        }
        for (name, delta) in &self.add {
            let next = match rec.attrs.get(name) {
                None => *delta,
                Some(AttrValue::Int(n)) => n.checked_add(*delta).ok_or_else(|| {
                    StoreError::InvalidUpdate(format!("increment of '{name}' overflows"))
                })?,
                Some(other) => {
                    return Err(StoreError::InvalidUpdate(format!(
                        "cannot add to non-numeric attribute '{name}' ({other:?})"
                    )))
                }
            };
            rec.attrs.insert(name.clone(), AttrValue::Int(next));
        }
        rec.version += 1;
        Ok(rec)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_item(&self, table: &str, key: &RecordKey) -> Result<Option<Record>, StoreError>;

    /// Full overwrite of the item's attributes.
    async fn put_item(
        &self,
        table: &str,
        key: &RecordKey,
        attrs: BTreeMap<String, AttrValue>,
    ) -> Result<(), StoreError>;

    /// Conditional partial update; returns the item as stored after the update.
    /// A failed guard yields `StoreError::ConditionFailed` and leaves the item untouched.
    async fn update_item(
        &self,
        table: &str,
        key: &RecordKey,
        update: Update,
    ) -> Result<Record, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_merges_instead_of_overwriting() {
        let first = Update::new()
            .set("sentiment", AttrValue::Float(0.4))
            .apply(None)
            .unwrap();
        let second = Update::new()
            .set("isUnpolite", AttrValue::Bool(false))
            .set_if_absent("sentiment", AttrValue::Float(-1.0))
            .apply(Some(first))
            .unwrap();
        assert_eq!(second.get_float("sentiment"), Some(0.4));
        assert_eq!(second.get_bool("isUnpolite"), Some(false));
        assert_eq!(second.version, 2);
    }

    #[test]
    fn add_starts_from_zero_and_rejects_non_numbers() {
        let rec = Update::new().add("n", 1).apply(None).unwrap();
        assert_eq!(rec.get_int("n"), Some(1));
        let rec = Update::new().add("n", 2).apply(Some(rec)).unwrap();
        assert_eq!(rec.get_int("n"), Some(3));

        let bad = Update::new()
            .set("n", AttrValue::Str("x".into()))
            .apply(None)
            .unwrap();
        assert!(matches!(
            Update::new().add("n", 1).apply(Some(bad)),
            Err(StoreError::InvalidUpdate(_))
        ));
    }

    #[test]
    fn conditions() {
        let rec = Update::new().set("a", AttrValue::Bool(true)).apply(None).unwrap();
        let guard = Update::new().when(Condition::AttributeNotExists("a".into()));
        assert!(guard.condition_holds(None));
        assert!(!guard.condition_holds(Some(&rec)));

        let cas = Update::new().when(Condition::VersionEquals(0));
        assert!(cas.condition_holds(None));
        assert!(!cas.condition_holds(Some(&rec)));
    }

    #[test]
    fn key_display() {
        assert_eq!(RecordKey::composite("c1", "r1").to_string(), "c1#r1");
        assert_eq!(RecordKey::simple("c1").to_string(), "c1");
    }
}
