use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::OptionalExtension;

use common::config::KvConfig;

use crate::db::Db;
use crate::tasks::TaskRunner;

/// A column type usable as a key-value store key or value.
pub trait KvColumn: Send + Sync + Clone + 'static {
    const SQL_TYPE: &'static str;
    fn to_value(&self) -> Value;
    fn from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Self>;
}

impl KvColumn for i64 {
    const SQL_TYPE: &'static str = "INTEGER";

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Self> {
        row.get(idx)
    }
}

impl KvColumn for String {
    const SQL_TYPE: &'static str = "TEXT";

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Self> {
        row.get(idx)
    }
}

impl KvColumn for Vec<u8> {
    const SQL_TYPE: &'static str = "BLOB";

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Self> {
        row.get(idx)
    }
}

/// Key-value store over a single `(key PRIMARY KEY, value)` table.
///
/// Unlike the trade store there is no staging queue: sets are committed
/// immediately, singly or batched in one transaction. The table name comes
/// from the config so several stores can share one file.
pub struct KvStore<K: KvColumn, V: KvColumn> {
    db: Db,
    config: KvConfig,
    tasks: TaskRunner,
    backup_running: Arc<AtomicBool>,
    closed: AtomicBool,
    _marker: std::marker::PhantomData<(K, V)>,
}

/// Integer-key / blob-value instantiation.
pub type IntKeyBlobStore = KvStore<i64, Vec<u8>>;
/// String-key / string-value instantiation.
pub type StringKeyValueStore = KvStore<String, String>;

impl<K: KvColumn, V: KvColumn> KvStore<K, V> {
    pub async fn open(path: impl AsRef<Path>, config: KvConfig) -> Result<Self> {
        let db = Db::open(path, config.read_only, config.busy_timeout).await?;
        db.execute_with_retry(&format!(
            "CREATE TABLE IF NOT EXISTS '{}' (
            key                {}      PRIMARY KEY NOT NULL,
            value              {}                  NOT NULL)",
            config.table,
            K::SQL_TYPE,
            V::SQL_TYPE
        ))
        .await?;
        Ok(Self {
            db,
            config,
            tasks: TaskRunner::new(),
            backup_running: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            _marker: std::marker::PhantomData,
        })
    }

    fn writable(&self) -> bool {
        !self.config.read_only && !self.closed.load(Ordering::SeqCst)
    }

    pub async fn set(&self, key: &K, value: &V) -> bool {
        if !self.writable() {
            return false;
        }
        let sql = format!(
            "INSERT OR REPLACE INTO '{}' (key, value) VALUES (?1, ?2)",
            self.config.table
        );
        let params = vec![key.to_value(), value.to_value()];
        match self.db.execute_with_retry_params(&sql, params).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(title = %self.config.title, error = %err, "set failed");
                false
            }
        }
    }

    /// Replace a batch of pairs in a single transaction.
    pub async fn set_many(&self, pairs: Vec<(K, V)>) -> bool {
        if !self.writable() {
            return false;
        }
        if pairs.is_empty() {
            return true;
        }
        let sql = format!(
            "INSERT OR REPLACE INTO '{}' (key, value) VALUES (?1, ?2)",
            self.config.table
        );
        let result = self
            .db
            .call_named("kv_set_many", move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(&sql)?;
                    for (key, value) in &pairs {
                        stmt.execute(rusqlite::params_from_iter(vec![
                            key.to_value(),
                            value.to_value(),
                        ]))?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await;
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(title = %self.config.title, error = %err, "set_many failed");
                false
            }
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let sql = format!("SELECT value FROM '{}' WHERE key = ?1", self.config.table);
        let key = key.to_value();
        let result = self
            .db
            .call_named("kv_get", move |conn| {
                Ok(conn
                    .query_row(&sql, rusqlite::params![key], |row| V::from_row(row, 0))
                    .optional()?)
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::error!(title = %self.config.title, error = %err, "get failed");
            None
        })
    }

    /// All pairs ordered by key.
    pub async fn get_all(&self) -> Vec<(K, V)> {
        let sql = format!("SELECT key, value FROM '{}' ORDER BY key ASC", self.config.table);
        let result = self
            .db
            .call_named("kv_get_all", move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], |row| Ok((K::from_row(row, 0)?, V::from_row(row, 1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::error!(title = %self.config.title, error = %err, "get_all failed");
            Vec::new()
        })
    }

    pub async fn remove(&self, key: &K) -> bool {
        if !self.writable() {
            return false;
        }
        let sql = format!("DELETE FROM '{}' WHERE key = ?1", self.config.table);
        self.db
            .execute_with_retry_params(&sql, vec![key.to_value()])
            .await
            .is_ok()
    }

    pub async fn remove_many(&self, keys: &[K]) -> bool {
        if !self.writable() || keys.is_empty() {
            return false;
        }
        let placeholders = vec!["?"; keys.len()].join(",");
        let sql = format!(
            "DELETE FROM '{}' WHERE key IN ({placeholders})",
            self.config.table
        );
        let params = keys.iter().map(KvColumn::to_value).collect();
        self.db.execute_with_retry_params(&sql, params).await.is_ok()
    }

    pub async fn remove_all(&self) -> bool {
        if !self.writable() {
            return false;
        }
        self.db
            .execute_with_retry(&format!("DELETE FROM '{}'", self.config.table))
            .await
            .is_ok()
    }

    /// Start an online backup to `dst`; refuses while one is running.
    pub fn backup<F>(&self, dst: impl Into<PathBuf>, on_done: F) -> bool
    where
        F: FnOnce(&Path, bool) + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        if self.backup_running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let db = self.db.clone();
        let running = self.backup_running.clone();
        let title = self.config.title.clone();
        let dst = dst.into();
        self.tasks.spawn(async move {
            let ok = match db.backup_to(dst.clone()).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(title = %title, dst = %dst.display(), error = %err, "backup failed");
                    false
                }
            };
            on_done(&dst, ok);
            running.store(false, Ordering::SeqCst);
        });
        true
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tasks.wait().await;
        self.db.clone().close().await;
    }
}
