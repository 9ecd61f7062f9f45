use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::OpenFlags;

use crate::error::StoreError;

/// How long one attempt of the DDL/DELETE retry envelope waits before the
/// next try, and how many tries are made before `BusyTimeout` surfaces.
const RETRY_DELAY: Duration = Duration::from_millis(250);
const RETRY_ATTEMPTS: usize = 100;

/// Async database handle around `tokio_rusqlite::Connection`.
///
/// Runs all SQLite operations on a dedicated background thread via
/// `tokio_rusqlite`, keeping the Tokio runtime cooperative. Clone is
/// cheap (shared mpsc sender to the background thread), so the flusher
/// task and backup tasks each hold their own handle.
#[derive(Clone)]
pub struct Db {
    conn: tokio_rusqlite::Connection,
}

impl Db {
    /// Open a database file.
    ///
    /// Read-write mode creates the file and any missing parent directories;
    /// read-only mode fails if the file does not exist. `busy_timeout_ms`
    /// is handed straight to SQLite (0 = non-blocking, callers retry).
    pub async fn open(path: impl AsRef<Path>, read_only: bool, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !read_only {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Db::open: creating parent directories for {}", path.display())
                    })?;
                }
            }
        }

        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        };

        let conn = tokio_rusqlite::Connection::open_with_flags(&path, flags)
            .await
            .with_context(|| format!("Db::open: {}", path.display()))?;

        conn.call(move |conn| -> std::result::Result<(), rusqlite::Error> {
            conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("Db::open: busy_timeout: {e}"))?;

        Ok(Self { conn })
    }

    /// Run a closure on the background SQLite thread and return the result.
    ///
    /// The closure receives `&mut rusqlite::Connection` and can perform
    /// arbitrary sync SQLite operations, including transactions.
    pub async fn call<F, R>(&self, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(move |conn| function(conn)).await.map_err(
            |e: tokio_rusqlite::Error<anyhow::Error>| match e {
                tokio_rusqlite::Error::ConnectionClosed => {
                    anyhow::anyhow!("database connection closed")
                }
                tokio_rusqlite::Error::Close((_, err)) => {
                    anyhow::anyhow!("database close error: {err}")
                }
                tokio_rusqlite::Error::Error(err) => err,
                other => anyhow::anyhow!("database error: {other}"),
            },
        )
    }

    /// Like [`Self::call`], but records metrics for latency and errors.
    ///
    /// This measures the full wall-clock time of the operation, including
    /// queueing on the dedicated SQLite thread and execution of all SQL in
    /// the closure.
    pub async fn call_named<F, R>(&self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let start = std::time::Instant::now();
        let res = self.call(function).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match &res {
            Ok(_) => {
                metrics::histogram!(
                    "tradelog_db_call_latency_ms",
                    "op" => op,
                    "status" => "ok"
                )
                .record(ms);
            }
            Err(_) => {
                metrics::histogram!(
                    "tradelog_db_call_latency_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(ms);
                metrics::counter!("tradelog_db_call_errors_total", "op" => op).increment(1);
            }
        }

        res
    }

    /// Execute a statement under the bounded busy-retry envelope.
    ///
    /// Retries while SQLite reports the database busy or locked, up to
    /// 100 attempts spaced 250 ms apart; any other error surfaces
    /// immediately. Used for schema creation and DELETEs.
    pub async fn execute_with_retry(&self, sql: &str) -> Result<()> {
        self.execute_with_retry_params(sql, Vec::new()).await
    }

    /// Parameterized variant of [`Self::execute_with_retry`].
    pub async fn execute_with_retry_params(
        &self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<()> {
        for attempt in 1..=RETRY_ATTEMPTS {
            let sql = sql.to_string();
            let params = params.clone();
            let done = self
                .call(move |conn| {
                    match conn.execute(&sql, rusqlite::params_from_iter(params)) {
                        Ok(_) => Ok(true),
                        Err(err) if is_busy(&err) => Ok(false),
                        Err(err) => Err(err.into()),
                    }
                })
                .await?;
            if done {
                return Ok(());
            }
            if attempt < RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        Err(StoreError::BusyTimeout.into())
    }

    /// Stream an online backup of the live database to `dst`.
    ///
    /// The copy runs on the connection thread in small page batches with
    /// short pauses, so the destination gets a consistent snapshot of the
    /// source as of the final step while staged writes keep queueing.
    pub async fn backup_to(&self, dst: PathBuf) -> Result<()> {
        self.call_named("backup", move |conn| {
            if let Some(parent) = dst.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut dst_conn = rusqlite::Connection::open(&dst)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut dst_conn)?;
            backup.run_to_completion(64, Duration::from_millis(25), None)?;
            Ok(())
        })
        .await
    }

    /// Close the connection, waiting for the background thread to finish.
    pub async fn close(self) {
        if let Err(err) = self.conn.close().await {
            tracing::warn!(error = %err, "closing database connection failed");
        }
    }
}

/// Transient contention: the statement can be retried as-is.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy
                    | rusqlite::ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}
