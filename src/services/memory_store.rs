//! In-memory engine for tests and embedding.

use super::kv_store::{
    KvStore, StorageResult, encode_entry, ensure_key, ensure_list_options,
};
use crate::models::entry::{Entry, ListOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock},
};

type Namespace = BTreeMap<String, Value>;

/// `BTreeMap` per namespace behind a single `RwLock`.
///
/// Values are size-checked exactly like the SQLite engine so tests see the
/// same rejections.
#[derive(Default)]
pub struct MemoryKvStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn write(&self, namespace: &str, key: &str, value: &Value) -> StorageResult<()> {
        encode_entry(key, value)?;
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn read(&self, namespace: &str, key: &str) -> StorageResult<Option<Value>> {
        ensure_key(key)?;
        let map = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn list(&self, namespace: &str, opts: &ListOptions) -> StorageResult<Vec<Entry>> {
        ensure_list_options(opts)?;
        let map = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(ns) = map.get(namespace) else {
            return Ok(Vec::new());
        };
        let matching = ns.iter().filter(|(key, _)| opts.matches(key));
        let to_entry = |(key, value): (&String, &Value)| Entry::new(key.clone(), value.clone());
        let entries = if opts.reverse {
            matching.rev().take(opts.limit).map(to_entry).collect()
        } else {
            matching.take(opts.limit).map(to_entry).collect()
        };
        Ok(entries)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        ensure_key(key)?;
        if let Some(ns) = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(namespace)
        {
            ns.remove(key);
        }
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()> {
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace);
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MemoryKvStore")
            .field("namespace_count", &count)
            .finish()
    }
}
