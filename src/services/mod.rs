pub mod access;
pub mod clock;
pub mod kv_store;
pub mod lifecycle;
pub mod memory_store;
pub mod metadata_cache;
pub mod object_service;
pub mod sqlite_store;
