//! Namespaced, ordered key/value storage engine contract.
//!
//! Every object identifier owns one namespace; namespaces never see each
//! other's keys. The metadata records live in the reserved
//! [`METADATA_NAMESPACE`].

use crate::models::{
    entry::{Entry, ListOptions},
    object_id::ObjectId,
};
use async_trait::async_trait;
use serde_json::Value;
use std::{io, sync::Arc};
use thiserror::Error;

/// Namespace holding one lifecycle record per object.
pub const METADATA_NAMESPACE: &str = "objects";

pub const MAX_KEY_BYTES: usize = 2048;
pub const MAX_VALUE_BYTES: usize = 131_072;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("keys must not be empty")]
    EmptyKey,
    #[error("key is {0} bytes, the maximum is 2048")]
    KeyTooLarge(usize),
    #[error("value is {0} bytes, the maximum is 131072")]
    ValueTooLarge(usize),
    #[error("cannot list with both `start` and `startAfter`")]
    ConflictingStart,
    #[error("cannot rename `{0}` to itself")]
    RenameToSameKey(String),
    #[error("key `{0}` does not exist")]
    KeyNotFound(String),
    #[error("stored value is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Rejections caused by the caller's input rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyKey
                | Self::KeyTooLarge(_)
                | Self::ValueTooLarge(_)
                | Self::ConflictingStart
                | Self::RenameToSameKey(_)
                | Self::KeyNotFound(_)
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

pub(crate) fn ensure_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(StorageError::KeyTooLarge(key.len()));
    }
    Ok(())
}

/// Validate an entry and return its serialized value.
pub(crate) fn encode_entry(key: &str, value: &Value) -> StorageResult<String> {
    ensure_key(key)?;
    let encoded = serde_json::to_string(value)?;
    if encoded.len() > MAX_VALUE_BYTES {
        return Err(StorageError::ValueTooLarge(encoded.len()));
    }
    Ok(encoded)
}

pub(crate) fn ensure_list_options(opts: &ListOptions) -> StorageResult<()> {
    if opts.start.is_some() && opts.start_after.is_some() {
        return Err(StorageError::ConflictingStart);
    }
    Ok(())
}

/// A durable, linearizable, ordered KV engine partitioned by namespace.
///
/// Batch operations apply entry by entry; a failure part-way leaves the
/// earlier entries applied.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn write(&self, namespace: &str, key: &str, value: &Value) -> StorageResult<()>;

    async fn write_many(&self, namespace: &str, entries: &[Entry]) -> StorageResult<()> {
        for entry in entries {
            self.write(namespace, &entry.key, &entry.value).await?;
        }
        Ok(())
    }

    /// Returns `Ok(None)` if the key does not exist.
    async fn read(&self, namespace: &str, key: &str) -> StorageResult<Option<Value>>;

    async fn list(&self, namespace: &str, opts: &ListOptions) -> StorageResult<Vec<Entry>>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    async fn delete_many(&self, namespace: &str, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.delete(namespace, key).await?;
        }
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()>;

    /// Cheap connectivity probe used by the readiness endpoint.
    async fn ping(&self) -> StorageResult<()>;
}

/// Handle on a single object's namespace.
#[derive(Clone)]
pub struct ObjectStub {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl ObjectStub {
    pub fn new(store: Arc<dyn KvStore>, id: &ObjectId) -> Self {
        Self {
            store,
            namespace: id.to_string(),
        }
    }

    pub async fn write(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.store.write(&self.namespace, key, value).await
    }

    pub async fn write_many(&self, entries: &[Entry]) -> StorageResult<()> {
        self.store.write_many(&self.namespace, entries).await
    }

    pub async fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        self.store.read(&self.namespace, key).await
    }

    pub async fn list(&self, opts: &ListOptions) -> StorageResult<Vec<Entry>> {
        self.store.list(&self.namespace, opts).await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.store.delete(&self.namespace, key).await
    }

    pub async fn delete_many(&self, keys: &[String]) -> StorageResult<()> {
        self.store.delete_many(&self.namespace, keys).await
    }

    pub async fn delete_all(&self) -> StorageResult<()> {
        self.store.delete_all(&self.namespace).await
    }

    /// Move `from` to `to`. Uses `value` when given instead of re-reading `from`.
    pub async fn rename(&self, from: &str, to: &str, value: Option<Value>) -> StorageResult<()> {
        if from == to {
            return Err(StorageError::RenameToSameKey(from.to_string()));
        }
        let current = match value {
            Some(value) => value,
            None => self
                .read(from)
                .await?
                .ok_or_else(|| StorageError::KeyNotFound(from.to_string()))?,
        };
        self.write(to, &current).await?;
        self.delete(from).await
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        let probe = ListOptions {
            limit: 1,
            ..ListOptions::default()
        };
        Ok(self.list(&probe).await?.is_empty())
    }
}
