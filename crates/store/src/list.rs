use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use rusqlite::OptionalExtension;

use common::config::KvConfig;

use crate::db::Db;
use crate::tasks::TaskRunner;

/// Append-or-update store of `(auto key, text value)` rows.
///
/// `push` appends with an auto-assigned key; `set` replaces at a caller
/// key. Keys are SQLite AUTOINCREMENT rowids, so they never get reused
/// after a remove.
pub struct ListStore {
    db: Db,
    config: KvConfig,
    tasks: TaskRunner,
    backup_running: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl ListStore {
    pub async fn open(path: impl AsRef<Path>, config: KvConfig) -> Result<Self> {
        let db = Db::open(path, config.read_only, config.busy_timeout).await?;
        db.execute_with_retry(&format!(
            "CREATE TABLE IF NOT EXISTS '{}' (
            key                INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            value              TEXT                              NOT NULL)",
            config.table
        ))
        .await?;
        Ok(Self {
            db,
            config,
            tasks: TaskRunner::new(),
            backup_running: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        })
    }

    fn writable(&self) -> bool {
        !self.config.read_only && !self.closed.load(Ordering::SeqCst)
    }

    /// Append a value; returns the auto-assigned key.
    pub async fn push(&self, value: &str) -> Option<i64> {
        if !self.writable() {
            return None;
        }
        let sql = format!("INSERT INTO '{}' (value) VALUES (?1)", self.config.table);
        let value = value.to_string();
        let result = self
            .db
            .call_named("list_push", move |conn| {
                conn.execute(&sql, rusqlite::params![value])?;
                Ok(conn.last_insert_rowid())
            })
            .await;
        match result {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::error!(title = %self.config.title, error = %err, "push failed");
                None
            }
        }
    }

    /// Insert or replace the value at a caller-chosen key.
    pub async fn set(&self, key: i64, value: &str) -> bool {
        if !self.writable() {
            return false;
        }
        let sql = format!(
            "INSERT OR REPLACE INTO '{}' (key, value) VALUES (?1, ?2)",
            self.config.table
        );
        self.db
            .execute_with_retry_params(
                &sql,
                vec![
                    rusqlite::types::Value::Integer(key),
                    rusqlite::types::Value::Text(value.to_string()),
                ],
            )
            .await
            .is_ok()
    }

    /// Batch write in one transaction. Items with key 0 are appended with
    /// auto keys; the rest replace their row.
    pub async fn set_many(&self, items: Vec<(i64, String)>) -> bool {
        if !self.writable() {
            return false;
        }
        if items.is_empty() {
            return true;
        }
        let table = self.config.table.clone();
        let result = self
            .db
            .call_named("list_set_many", move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut insert = tx.prepare_cached(&format!(
                        "INSERT INTO '{table}' (value) VALUES (?1)"
                    ))?;
                    let mut replace = tx.prepare_cached(&format!(
                        "INSERT OR REPLACE INTO '{table}' (key, value) VALUES (?1, ?2)"
                    ))?;
                    for (key, value) in &items {
                        if *key == 0 {
                            insert.execute(rusqlite::params![value])?;
                        } else {
                            replace.execute(rusqlite::params![key, value])?;
                        }
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

    pub async fn get(&self, key: i64) -> Option<String> {
        let sql = format!("SELECT value FROM '{}' WHERE key = ?1", self.config.table);
        let result = self
            .db
            .call_named("list_get", move |conn| {
                Ok(conn
                    .query_row(&sql, rusqlite::params![key], |row| row.get(0))
                    .optional()?)
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::error!(title = %self.config.title, error = %err, "get failed");
            None
        })
    }

    /// All rows ordered by key.
    pub async fn items(&self) -> Vec<(i64, String)> {
        let sql = format!("SELECT key, value FROM '{}' ORDER BY key ASC", self.config.table);
        let result = self
            .db
            .call_named("list_items", move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::error!(title = %self.config.title, error = %err, "items failed");
            Vec::new()
        })
    }

    /// All values ordered by key.
    pub async fn values(&self) -> Vec<String> {
        self.items().await.into_iter().map(|(_, value)| value).collect()
    }

    pub async fn remove(&self, key: i64) -> bool {
        if !self.writable() {
            return false;
        }
        let sql = format!("DELETE FROM '{}' WHERE key = ?1", self.config.table);
        self.db
            .execute_with_retry_params(&sql, vec![rusqlite::types::Value::Integer(key)])
            .await
            .is_ok()
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
