//! SQLite-backed engine.
//!
//! All namespaces share one `entries` table keyed by `(namespace, key)`.
//! Values are stored as JSON text. SQLite's default BINARY collation gives
//! bytewise key ordering, which is what range queries rely on.

use super::kv_store::{
    KvStore, StorageResult, encode_entry, ensure_key, ensure_list_options,
};
use crate::models::entry::{Entry, ListOptions};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::debug;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct SqliteKvStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteKvStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StorageResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn write(&self, namespace: &str, key: &str, value: &Value) -> StorageResult<()> {
        let encoded = encode_entry(key, value)?;
        sqlx::query(
            "INSERT INTO entries (namespace, key, value) VALUES (?, ?, ?)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
        )
        .bind(namespace)
        .bind(key)
        .bind(encoded)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn read(&self, namespace: &str, key: &str) -> StorageResult<Option<Value>> {
        ensure_key(key)?;
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM entries WHERE namespace = ? AND key = ?")
                .bind(namespace)
                .bind(key)
                .fetch_optional(&*self.db)
                .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, namespace: &str, opts: &ListOptions) -> StorageResult<Vec<Entry>> {
        ensure_list_options(opts)?;

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT key, value FROM entries WHERE namespace = ");
        builder.push_bind(namespace);

        if let Some(start) = &opts.start {
            builder.push(" AND key >= ");
            builder.push_bind(start);
        }
        if let Some(after) = &opts.start_after {
            builder.push(" AND key > ");
            builder.push_bind(after);
        }
        if let Some(end) = &opts.end {
            builder.push(" AND key < ");
            builder.push_bind(end);
        }
        if let Some(prefix) = &opts.prefix {
            // Exact, case-sensitive match on the leading bytes of the key.
            builder.push(" AND substr(key, 1, length(");
            builder.push_bind(prefix);
            builder.push(")) = ");
            builder.push_bind(prefix);
        }

        builder.push(if opts.reverse {
            " ORDER BY key DESC LIMIT "
        } else {
            " ORDER BY key ASC LIMIT "
        });
        builder.push_bind(i64::try_from(opts.limit).unwrap_or(i64::MAX));

        let rows: Vec<(String, String)> = builder.build_query_as().fetch_all(&*self.db).await?;

        rows.into_iter()
            .map(|(key, raw)| -> StorageResult<Entry> {
                Ok(Entry::new(key, serde_json::from_str(&raw)?))
            })
            .collect()
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        ensure_key(key)?;
        sqlx::query("DELETE FROM entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&*self.db)
            .await?;
        debug!(
            "removed {} entries from namespace {}",
            result.rows_affected(),
            namespace
        );
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
