//! ObjectService — the request router.
//!
//! Takes an already-parsed [`Command`] plus the caller's credentials, checks
//! the right key, resolves the target identifier, runs the lifecycle touch
//! and forwards to that object's namespace. HTTP concerns live in the
//! handlers.

use super::{
    access::{AccessController, Credentials, Denied},
    clock::{Clock, SystemClock},
    kv_store::{KvStore, StorageError},
    lifecycle::{DEFAULT_TOUCH_INTERVAL, ObjectRegistry},
    metadata_cache::{InMemoryMetadataCache, MetadataCache},
};
use crate::models::{
    entry::Entry,
    object_id::ObjectId,
    request::{Command, DeleteOp, ObjectOp, WriteOp},
};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("access denied")]
    Denied(Denied),
    #[error("object `{0}` not found")]
    NotFound(ObjectId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Successful outcome of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Created(ObjectId),
    Value(Option<Value>),
    Entries(Vec<Entry>),
    Done,
}

#[derive(Clone)]
pub struct ObjectService {
    store: Arc<dyn KvStore>,
    access: AccessController,
    registry: Arc<ObjectRegistry>,
}

impl ObjectService {
    /// Service with the process cache and system clock.
    pub fn new(store: Arc<dyn KvStore>, access: AccessController) -> Self {
        Self::builder(store, access).build()
    }

    pub fn builder(store: Arc<dyn KvStore>, access: AccessController) -> ObjectServiceBuilder {
        ObjectServiceBuilder {
            store,
            access,
            cache: Arc::new(InMemoryMetadataCache::new()),
            clock: Arc::new(SystemClock),
            touch_interval: DEFAULT_TOUCH_INTERVAL,
        }
    }

    /// Probe the storage engine.
    pub async fn ping(&self) -> ServiceResult<()> {
        Ok(self.store.ping().await?)
    }

    pub async fn dispatch(&self, creds: &Credentials, command: Command) -> ServiceResult<Reply> {
        match command {
            Command::Create { name } => {
                self.access.check_create(creds).map_err(|denied| {
                    warn!("create rejected: invalid main key");
                    ServiceError::Denied(denied)
                })?;
                let id = ObjectId::derive(name.as_deref());
                let guard = self.registry.lock(&id).await;
                self.registry.create(&guard, &id, name).await?;
                Ok(Reply::Created(id))
            }
            Command::Object { target, op } => {
                self.access.check_access(creds).map_err(|denied| {
                    warn!(method = op.method(), "request rejected: invalid access key");
                    ServiceError::Denied(denied)
                })?;
                let id = target.resolve();
                self.run(&id, op).await
            }
        }
    }

    async fn run(&self, id: &ObjectId, op: ObjectOp) -> ServiceResult<Reply> {
        let guard = self.registry.lock(id).await;

        if self.registry.touch(&guard, id).await?.is_none() {
            debug!(object = %id, method = op.method(), "unknown object");
            return Err(ServiceError::NotFound(*id));
        }

        let stub = self.registry.stub(id);
        match op {
            ObjectOp::Write(WriteOp::Single(entry)) => {
                stub.write(&entry.key, &entry.value).await?;
                Ok(Reply::Done)
            }
            ObjectOp::Write(WriteOp::Many(entries)) => {
                stub.write_many(&entries).await?;
                Ok(Reply::Done)
            }
            ObjectOp::Read(key) => Ok(Reply::Value(stub.read(&key).await?)),
            ObjectOp::List(opts) => Ok(Reply::Entries(stub.list(&opts).await?)),
            ObjectOp::Delete(DeleteOp::Single(key)) => {
                stub.delete(&key).await?;
                Ok(Reply::Done)
            }
            ObjectOp::Delete(DeleteOp::Many(keys)) => {
                stub.delete_many(&keys).await?;
                Ok(Reply::Done)
            }
            ObjectOp::Purge => {
                self.registry.purge(&guard, id).await?;
                Ok(Reply::Done)
            }
        }
    }
}

pub struct ObjectServiceBuilder {
    store: Arc<dyn KvStore>,
    access: AccessController,
    cache: Arc<dyn MetadataCache>,
    clock: Arc<dyn Clock>,
    touch_interval: Duration,
}

impl ObjectServiceBuilder {
    pub fn cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = interval;
        self
    }

    pub fn build(self) -> ObjectService {
        let registry = ObjectRegistry::new(
            self.store.clone(),
            self.cache,
            self.clock,
            self.touch_interval,
        );
        ObjectService {
            store: self.store,
            access: self.access,
            registry: Arc::new(registry),
        }
    }
}
