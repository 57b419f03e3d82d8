//! Process-wide cache of object metadata records.

use crate::models::{metadata::ObjectMetadata, object_id::ObjectId};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// Mapping from object identifier to its last known metadata record.
///
/// Entries are inserted on first access and removed only on purge.
pub trait MetadataCache: Send + Sync {
    fn get(&self, id: &ObjectId) -> Option<ObjectMetadata>;
    fn set(&self, id: ObjectId, meta: ObjectMetadata);
    fn remove(&self, id: &ObjectId) -> Option<ObjectMetadata>;

    /// Apply `f` to the cached record in place, if there is one.
    fn update(&self, id: &ObjectId, f: &mut dyn FnMut(&mut ObjectMetadata)) -> bool;
}

#[derive(Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<HashMap<ObjectId, ObjectMetadata>>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataCache for InMemoryMetadataCache {
    fn get(&self, id: &ObjectId) -> Option<ObjectMetadata> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn set(&self, id: ObjectId, meta: ObjectMetadata) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, meta);
    }

    fn remove(&self, id: &ObjectId) -> Option<ObjectMetadata> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn update(&self, id: &ObjectId, f: &mut dyn FnMut(&mut ObjectMetadata)) -> bool {
        match self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            Some(meta) => {
                f(meta);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn set_get_update_remove() {
        let cache = InMemoryMetadataCache::new();
        let id = ObjectId::random();
        assert!(cache.get(&id).is_none());
        assert!(!cache.update(&id, &mut |m: &mut ObjectMetadata| m.purged = true));

        cache.set(id, ObjectMetadata::new(None, Utc::now()));
        assert_eq!(cache.len(), 1);
        assert!(cache.update(&id, &mut |m: &mut ObjectMetadata| m.purged = true));
        assert!(cache.get(&id).unwrap().purged);

        assert!(cache.remove(&id).is_some());
        assert!(cache.is_empty());
    }
}
