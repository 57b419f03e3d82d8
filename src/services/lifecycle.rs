//! Object lifecycle: create, heartbeat touch, purge.
//!
//! ```text
//!   Absent --create--> Active --purge--> (purged=true) --> Absent
//!                        |  ^
//!                        touch (write-back when lastTouch is stale)
//! ```
//!
//! Every operation on one identifier runs under that identifier's async
//! mutex (see [`ObjectRegistry::lock`]), so a purge can never interleave with
//! a write to the same object. Different identifiers never contend.

use super::{
    clock::Clock,
    kv_store::{KvStore, METADATA_NAMESPACE, ObjectStub, StorageResult},
    metadata_cache::MetadataCache,
};
use crate::models::{metadata::ObjectMetadata, object_id::ObjectId};
use chrono::Duration;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

pub const DEFAULT_TOUCH_INTERVAL: Duration = Duration::hours(24);

type LockMap = Mutex<HashMap<ObjectId, Arc<AsyncMutex<()>>>>;

/// Held critical section for one identifier.
///
/// Dropping the last guard (with nobody else waiting) removes the
/// identifier's entry from the lock map.
pub struct ObjectGuard {
    id: ObjectId,
    held: Option<OwnedMutexGuard<()>>,
    mutex: Arc<AsyncMutex<()>>,
    locks: Arc<LockMap>,
}

impl ObjectGuard {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }
}

impl Drop for ObjectGuard {
    fn drop(&mut self) {
        self.held.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under the map lock: the map entry plus
        // `self.mutex` means no other request holds or awaits this mutex.
        let idle = locks
            .get(&self.id)
            .is_some_and(|m| Arc::ptr_eq(m, &self.mutex) && Arc::strong_count(m) == 2);
        if idle {
            locks.remove(&self.id);
        }
    }
}

pub struct ObjectRegistry {
    store: Arc<dyn KvStore>,
    cache: Arc<dyn MetadataCache>,
    clock: Arc<dyn Clock>,
    touch_interval: Duration,
    locks: Arc<LockMap>,
}

impl ObjectRegistry {
    pub fn new(
        store: Arc<dyn KvStore>,
        cache: Arc<dyn MetadataCache>,
        clock: Arc<dyn Clock>,
        touch_interval: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            touch_interval,
            locks: Arc::default(),
        }
    }

    pub fn stub(&self, id: &ObjectId) -> ObjectStub {
        ObjectStub::new(self.store.clone(), id)
    }

    /// Enter the critical section for `id`, waiting for any holder to finish.
    pub async fn lock(&self, id: &ObjectId) -> ObjectGuard {
        let mutex = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*id)
            .or_default()
            .clone();
        // Built before waiting so a cancelled waiter still cleans up on drop.
        let mut guard = ObjectGuard {
            id: *id,
            held: None,
            mutex,
            locks: self.locks.clone(),
        };
        guard.held = Some(guard.mutex.clone().lock_owned().await);
        guard
    }

    /// Write a fresh record for `id`.
    ///
    /// Re-creating an existing named object rewrites the whole record,
    /// including `created`; it never fails and never touches the data.
    pub async fn create(
        &self,
        guard: &ObjectGuard,
        id: &ObjectId,
        name: Option<String>,
    ) -> StorageResult<ObjectMetadata> {
        debug_assert_eq!(guard.id(), id);
        let meta = ObjectMetadata::new(name, self.clock.now());
        self.persist(id, &meta).await?;
        self.cache.set(*id, meta.clone());
        info!(object = %id, named = id.is_named(), "object created");
        Ok(meta)
    }

    /// Resolve the live record for `id`, writing back the heartbeat if stale.
    ///
    /// Returns `Ok(None)` when no record exists; nothing is cached then.
    pub async fn touch(
        &self,
        guard: &ObjectGuard,
        id: &ObjectId,
    ) -> StorageResult<Option<ObjectMetadata>> {
        debug_assert_eq!(guard.id(), id);
        let mut meta = match self.cache.get(id) {
            Some(meta) => meta,
            None => match self.load(id).await? {
                Some(meta) => {
                    self.cache.set(*id, meta.clone());
                    meta
                }
                None => return Ok(None),
            },
        };

        let now = self.clock.now();
        if meta.needs_touch(now, self.touch_interval) {
            meta.last_touch = now;
            self.persist(id, &meta).await?;
            self.cache.set(*id, meta.clone());
            debug!(object = %id, "heartbeat written back");
        }

        Ok(Some(meta))
    }

    /// Destroy the object's data and metadata. The identifier is dead afterwards.
    ///
    /// The lock entry stays; it goes away when the last guard is dropped.
    pub async fn purge(&self, guard: &ObjectGuard, id: &ObjectId) -> StorageResult<()> {
        debug_assert_eq!(guard.id(), id);
        self.cache.update(id, &mut |meta: &mut ObjectMetadata| meta.purged = true);
        self.stub(id).delete_all().await?;
        self.store
            .delete(METADATA_NAMESPACE, &id.to_string())
            .await?;
        self.cache.remove(id);
        info!(object = %id, "object purged");
        Ok(())
    }

    async fn load(&self, id: &ObjectId) -> StorageResult<Option<ObjectMetadata>> {
        match self.store.read(METADATA_NAMESPACE, &id.to_string()).await? {
            Some(raw) => Ok(Some(serde_json::from_value(raw)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, id: &ObjectId, meta: &ObjectMetadata) -> StorageResult<()> {
        let raw = serde_json::to_value(meta)?;
        self.store
            .write(METADATA_NAMESPACE, &id.to_string(), &raw)
            .await
    }
}
