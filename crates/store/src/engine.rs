use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use rusqlite::OptionalExtension;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use common::config::StoreConfig;

use crate::db::Db;
use crate::error::StoreError;
use crate::queue::StagingQueue;
use crate::tasks::TaskRunner;
use crate::timer::{spawn_ticker, TickMode};

pub const DB_VERSION: &str = "1.0";
pub const KEY_DB_VERSION: &str = "version";
pub const KEY_UPDATE_DATE: &str = "update-date";
pub const KEY_NEXT_UID: &str = "bet-id";

const META_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS 'meta-data' (
    key                TEXT    PRIMARY KEY NOT NULL,
    value              TEXT                NOT NULL)";

const REPLACE_META_SQL: &str = "INSERT OR REPLACE INTO 'meta-data' (key, value) VALUES (?1, ?2)";
const GET_META_SQL: &str = "SELECT value FROM 'meta-data' WHERE key = ?1";

/// How a staged record is persisted. Implemented per concrete store
/// (trade records, key-value pairs); each instantiation carries its own
/// schema and replace statement.
pub trait Staged: Send + Clone + 'static {
    /// CREATE TABLE statements for this record type.
    fn table_schema(table: &str) -> Vec<String>;
    /// INSERT OR REPLACE statement with positional placeholders.
    fn replace_sql(table: &str) -> String;
    /// Parameter values in the column order of [`Self::replace_sql`].
    fn params(&self) -> Vec<rusqlite::types::Value>;
}

struct Shared {
    flush_requested: AtomicBool,
    shutdown: AtomicBool,
    closed: AtomicBool,
    backup_running: AtomicBool,
    /// Epoch seconds of the last observed committed batch.
    last_update_date: AtomicI64,
    /// Next UID to hand out; stamped into `bet-id` metadata at every flush.
    next_uid: AtomicI64,
}

/// Generic store engine: schema init, staging queue, background flusher,
/// metadata bookkeeping, online backup and bulk delete.
///
/// Lifecycle: a handle is fully open once `open` returns; `close` requests
/// a final flush, joins the flusher and background tasks and closes the
/// connection. Dropping without `close` aborts background work.
pub struct StoreCore<R: Staged> {
    pub(crate) db: Db,
    pub(crate) config: StoreConfig,
    pub(crate) table: String,
    queue: Arc<StagingQueue<R>>,
    shared: Arc<Shared>,
    tasks: TaskRunner,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Staged> StoreCore<R> {
    /// Open (and if needed create) the store file, prepare the schema and
    /// start the background flusher.
    pub async fn open(path: impl AsRef<Path>, table: &str, config: StoreConfig) -> Result<Self> {
        let db = Db::open(path, config.read_only, config.busy_timeout).await?;

        for sql in R::table_schema(table) {
            db.execute_with_retry(&sql).await?;
        }
        db.execute_with_retry(META_TABLE_SQL).await?;

        let (stored_uid, stored_update) = db
            .call(|conn| {
                let uid: Option<String> = conn
                    .query_row(GET_META_SQL, rusqlite::params![KEY_NEXT_UID], |row| row.get(0))
                    .optional()?;
                let update: Option<String> = conn
                    .query_row(GET_META_SQL, rusqlite::params![KEY_UPDATE_DATE], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok((uid, update))
            })
            .await?;

        let next_uid = stored_uid.and_then(|v| v.parse::<i64>().ok()).unwrap_or(1).max(1);
        let last_update = stored_update.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);

        if !config.read_only {
            db.call(|conn| {
                conn.execute(REPLACE_META_SQL, rusqlite::params![KEY_DB_VERSION, DB_VERSION])?;
                Ok(())
            })
            .await?;
        }

        let core = Self {
            db,
            config,
            table: table.to_string(),
            queue: Arc::new(StagingQueue::new()),
            shared: Arc::new(Shared {
                flush_requested: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                backup_running: AtomicBool::new(false),
                last_update_date: AtomicI64::new(last_update),
                next_uid: AtomicI64::new(next_uid),
            }),
            tasks: TaskRunner::new(),
            flusher: Mutex::new(None),
        };
        core.spawn_flusher();
        Ok(core)
    }

    fn spawn_flusher(&self) {
        let handle = tokio::spawn(flusher_loop(
            self.db.clone(),
            self.queue.clone(),
            self.shared.clone(),
            self.table.clone(),
            self.config.clone(),
        ));
        *self.flusher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    pub fn is_open(&self) -> bool {
        !self.shared.shutdown.load(Ordering::SeqCst) && !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Classify why a mutation must be refused, if it must.
    pub(crate) fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Epoch seconds of the last committed batch, refreshed from metadata
    /// every `meta_data_time`.
    pub fn last_update(&self) -> i64 {
        self.shared.last_update_date.load(Ordering::SeqCst)
    }

    /// Reserve the next UID. Strictly increasing within a process; the
    /// reservation is persisted with the next flush.
    pub fn allocate_uid(&self) -> i64 {
        self.shared.next_uid.fetch_add(1, Ordering::SeqCst)
    }

    /// Stage a record for the next batch commit.
    pub fn enqueue(&self, record: R) -> bool {
        if let Err(err) = self.ensure_writable() {
            tracing::debug!(table = %self.table, error = %err, "enqueue refused");
            return false;
        }
        self.queue.push(record);
        true
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Force the staged queue onto disk. Blocks until the flusher has
    /// observed the request (or shutdown intervenes); a no-op in
    /// read-only mode.
    pub async fn flush(&self) {
        if self.ensure_writable().is_err() {
            return;
        }
        self.shared.flush_requested.store(true, Ordering::SeqCst);
        while self.shared.flush_requested.load(Ordering::SeqCst)
            && !self.shared.shutdown.load(Ordering::SeqCst)
        {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Start an online backup to `dst`; refuses while one is running.
    /// `on_done` receives the destination path and a success flag.
    pub fn backup<F>(&self, dst: impl Into<PathBuf>, on_done: F) -> bool
    where
        F: FnOnce(&Path, bool) + Send + 'static,
    {
        if !self.is_open() {
            return false;
        }
        if self.shared.backup_running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let db = self.db.clone();
        let shared = self.shared.clone();
        let dst = dst.into();
        self.tasks.spawn(async move {
            let ok = match db.backup_to(dst.clone()).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(dst = %dst.display(), error = %err, "online backup failed");
                    false
                }
            };
            on_done(&dst, ok);
            shared.backup_running.store(false, Ordering::SeqCst);
        });
        true
    }

    /// Delete every record row. The staging queue is not drained first;
    /// call [`Self::flush`] before when deterministic emptiness matters.
    pub async fn remove_all(&self) -> bool {
        if let Err(err) = self.ensure_writable() {
            tracing::debug!(table = %self.table, error = %err, "remove_all refused");
            return false;
        }
        match self
            .db
            .execute_with_retry(&format!("DELETE FROM '{}'", self.table))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "remove_all failed");
                false
            }
        }
    }

    /// Parameterized DELETE under the retry envelope.
    pub(crate) async fn remove_where(
        &self,
        predicate: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> bool {
        if self.ensure_writable().is_err() {
            return false;
        }
        let sql = format!("DELETE FROM '{}' WHERE {predicate}", self.table);
        match self.db.execute_with_retry_params(&sql, params).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "remove failed");
                false
            }
        }
    }

    pub async fn meta_get(&self, key: &str) -> Option<String> {
        let key = key.to_string();
        self.db
            .call_named("meta_get", move |conn| {
                Ok(conn
                    .query_row(GET_META_SQL, rusqlite::params![key], |row| row.get(0))
                    .optional()?)
            })
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "metadata read failed");
                None
            })
    }

    /// Final flush, join the flusher and background tasks, close the file.
    /// Idempotent; all subsequent operations fail.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.queue.shutdown();
        let handle = self.flusher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!(error = %err, "flusher task failed during close");
                }
            }
        }
        self.tasks.wait().await;
        self.db.clone().close().await;
    }
}

impl<R: Staged> Drop for StoreCore<R> {
    fn drop(&mut self) {
        if !self.shared.closed.load(Ordering::SeqCst) {
            tracing::warn!(
                table = %self.table,
                "store dropped without close(); staged writes may be lost"
            );
            self.shared.shutdown.store(true, Ordering::SeqCst);
            if let Some(handle) = self.flusher.lock().unwrap_or_else(|e| e.into_inner()).take() {
                handle.abort();
            }
            self.tasks.clear();
        }
    }
}

/// Tick period of the flush predicate.
const FLUSH_TICK: Duration = Duration::from_millis(10);

async fn flusher_loop<R: Staged>(
    db: Db,
    queue: Arc<StagingQueue<R>>,
    shared: Arc<Shared>,
    table: String,
    config: StoreConfig,
) {
    let (tick_tx, mut tick_rx) = tokio::sync::mpsc::channel(1);
    let ticker = spawn_ticker("flusher", FLUSH_TICK, TickMode::Drifting, tick_tx);
    let idle_time = config.idle_time();
    let meta_time = config.meta_data_time();
    let mut idle_since = Instant::now();
    let mut meta_since = Instant::now();

    loop {
        tokio::select! {
            _ = tick_rx.recv() => {}
            _ = queue.notified() => {}
        }
        let shutting_down = shared.shutdown.load(Ordering::SeqCst);

        if config.read_only {
            shared.flush_requested.store(false, Ordering::SeqCst);
        } else {
            let len = queue.len();
            let requested = shared.flush_requested.load(Ordering::SeqCst);
            let due = len > config.threshold_bets
                || (len > 0
                    && (requested || shutting_down || idle_since.elapsed() >= idle_time));
            if due {
                let batch = queue.drain();
                let count = batch.len();
                let next_uid = shared.next_uid.load(Ordering::SeqCst);
                match commit_batch::<R>(&db, &table, batch, next_uid).await {
                    Ok(now) => {
                        shared.last_update_date.store(now, Ordering::SeqCst);
                        metrics::counter!("tradelog_flush_total", "status" => "ok").increment(1);
                        if config.use_log {
                            tracing::debug!(table = %table, records = count, "flushed batch");
                        }
                    }
                    Err(err) => {
                        // The batch is dropped, not re-queued; callers that need
                        // guaranteed persistence flush and watch update-date.
                        metrics::counter!("tradelog_flush_total", "status" => "err").increment(1);
                        tracing::error!(
                            table = %table,
                            records = count,
                            error = %err,
                            "batch commit failed; batch dropped"
                        );
                    }
                }
                idle_since = Instant::now();
            }
            if due || len == 0 {
                shared.flush_requested.store(false, Ordering::SeqCst);
            }
        }

        if shutting_down {
            break;
        }

        if meta_since.elapsed() >= meta_time {
            meta_since = Instant::now();
            refresh_update_date(&db, &shared).await;
        }
    }

    drop(tick_rx);
    if let Err(err) = ticker.await {
        if !err.is_cancelled() {
            tracing::warn!(error = %err, "flush ticker failed");
        }
    }
}

/// Commit one drained batch plus the metadata rewrite as a single
/// transaction: either every record and both metadata rows land, or none.
async fn commit_batch<R: Staged>(
    db: &Db,
    table: &str,
    batch: Vec<R>,
    next_uid: i64,
) -> Result<i64> {
    let replace_sql = R::replace_sql(table);
    db.call_named("flush_batch", move |conn| {
        let now = chrono::Utc::now().timestamp();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&replace_sql)?;
            for record in &batch {
                stmt.execute(rusqlite::params_from_iter(record.params()))?;
            }
            let mut meta = tx.prepare_cached(REPLACE_META_SQL)?;
            meta.execute(rusqlite::params![KEY_UPDATE_DATE, now.to_string()])?;
            meta.execute(rusqlite::params![KEY_NEXT_UID, next_uid.to_string()])?;
        }
        tx.commit()?;
        Ok(now)
    })
    .await
}

async fn refresh_update_date(db: &Db, shared: &Shared) {
    let res = db
        .call(|conn| {
            Ok(conn
                .query_row(GET_META_SQL, rusqlite::params![KEY_UPDATE_DATE], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?)
        })
        .await;
    match res {
        Ok(Some(value)) => {
            if let Ok(ts) = value.parse::<i64>() {
                shared.last_update_date.store(ts, Ordering::SeqCst);
            }
        }
        Ok(None) => {}
        Err(err) => tracing::debug!(error = %err, "metadata refresh failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Note {
        id: i64,
        text: String,
    }

    impl Staged for Note {
        fn table_schema(table: &str) -> Vec<String> {
            vec![format!(
                "CREATE TABLE IF NOT EXISTS '{table}' (
                    id    INTEGER PRIMARY KEY NOT NULL,
                    text  TEXT    NOT NULL)"
            )]
        }

        fn replace_sql(table: &str) -> String {
            format!("INSERT OR REPLACE INTO '{table}' (id, text) VALUES (?1, ?2)")
        }

        fn params(&self) -> Vec<rusqlite::types::Value> {
            vec![
                rusqlite::types::Value::Integer(self.id),
                rusqlite::types::Value::Text(self.text.clone()),
            ]
        }
    }

    async fn count_notes(core: &StoreCore<Note>) -> i64 {
        core.db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM 'notes'", [], |row| row.get(0))?))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_flush_commits_batch_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let core: StoreCore<Note> =
            StoreCore::open(dir.path().join("n.db"), "notes", StoreConfig::default())
                .await
                .unwrap();

        for id in 1..=3 {
            assert!(core.enqueue(Note { id, text: format!("note {id}") }));
        }
        assert_eq!(core.queue_len(), 3);
        core.flush().await;

        assert_eq!(count_notes(&core).await, 3);
        assert!(core.last_update() > 0);
        assert_eq!(core.meta_get(KEY_DB_VERSION).await.as_deref(), Some(DB_VERSION));
        let update: i64 = core.meta_get(KEY_UPDATE_DATE).await.unwrap().parse().unwrap();
        assert!(update > 0);
        core.close().await;
    }

    #[tokio::test]
    async fn test_duplicate_key_keeps_latest_payload() {
        let dir = tempfile::tempdir().unwrap();
        let core: StoreCore<Note> =
            StoreCore::open(dir.path().join("n.db"), "notes", StoreConfig::default())
                .await
                .unwrap();

        assert!(core.enqueue(Note { id: 1, text: "first".into() }));
        assert!(core.enqueue(Note { id: 1, text: "second".into() }));
        core.flush().await;

        let text: String = core
            .db
            .call(|conn| {
                Ok(conn.query_row("SELECT text FROM 'notes' WHERE id = 1", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(text, "second");
        core.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_threshold_triggers_flush_without_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            threshold_bets: 5,
            idle_time: 60.0,
            ..StoreConfig::default()
        };
        let core: StoreCore<Note> = StoreCore::open(dir.path().join("n.db"), "notes", config)
            .await
            .unwrap();

        for id in 1..=6 {
            core.enqueue(Note { id, text: "t".into() });
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count_notes(&core).await < 6 {
            assert!(std::time::Instant::now() < deadline, "threshold flush never fired");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        core.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_idle_time_triggers_flush() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            idle_time: 0.2,
            ..StoreConfig::default()
        };
        let core: StoreCore<Note> = StoreCore::open(dir.path().join("n.db"), "notes", config)
            .await
            .unwrap();

        core.enqueue(Note { id: 1, text: "t".into() });

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count_notes(&core).await < 1 {
            assert!(std::time::Instant::now() < deadline, "idle flush never fired");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(core.last_update() > 0);
        core.close().await;
    }

    #[tokio::test]
    async fn test_read_only_refuses_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.db");
        {
            let core: StoreCore<Note> =
                StoreCore::open(&path, "notes", StoreConfig::default()).await.unwrap();
            core.enqueue(Note { id: 1, text: "t".into() });
            core.flush().await;
            core.close().await;
        }

        let config = StoreConfig { read_only: true, ..StoreConfig::default() };
        let core: StoreCore<Note> = StoreCore::open(&path, "notes", config).await.unwrap();
        assert!(!core.enqueue(Note { id: 2, text: "nope".into() }));
        assert!(!core.remove_all().await);
        core.flush().await; // returns immediately, no effect
        assert_eq!(count_notes(&core).await, 1);
        core.close().await;
    }

    #[tokio::test]
    async fn test_uid_allocation_is_sequential_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.db");
        {
            let core: StoreCore<Note> =
                StoreCore::open(&path, "notes", StoreConfig::default()).await.unwrap();
            assert_eq!(core.allocate_uid(), 1);
            assert_eq!(core.allocate_uid(), 2);
            core.enqueue(Note { id: 1, text: "t".into() });
            core.flush().await;
            assert_eq!(core.meta_get(KEY_NEXT_UID).await.as_deref(), Some("3"));
            core.close().await;
        }

        let core: StoreCore<Note> =
            StoreCore::open(&path, "notes", StoreConfig::default()).await.unwrap();
        assert_eq!(core.allocate_uid(), 3);
        core.close().await;
    }

    #[tokio::test]
    async fn test_close_drains_pending_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.db");
        let core: StoreCore<Note> =
            StoreCore::open(&path, "notes", StoreConfig::default()).await.unwrap();
        core.enqueue(Note { id: 1, text: "pending".into() });
        core.close().await;

        let core: StoreCore<Note> =
            StoreCore::open(&path, "notes", StoreConfig::default()).await.unwrap();
        assert_eq!(count_notes(&core).await, 1);
        core.close().await;
    }

    #[tokio::test]
    async fn test_second_backup_refused_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let core: StoreCore<Note> =
            StoreCore::open(dir.path().join("n.db"), "notes", StoreConfig::default())
                .await
                .unwrap();
        for id in 1..=50 {
            core.enqueue(Note { id, text: "x".repeat(512) });
        }
        core.flush().await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let started = core.backup(dir.path().join("b1.db"), move |path, ok| {
            tx.send((path.to_path_buf(), ok)).ok();
        });
        assert!(started);
        // The gate is taken synchronously, so a second request is refused
        // before the first task has even run.
        assert!(!core.backup(dir.path().join("b2.db"), |_, _| {}));

        let (path, ok) = rx.recv().await.unwrap();
        assert!(ok);
        assert!(path.ends_with("b1.db"));

        core.close().await;
        assert!(dir.path().join("b1.db").exists());
        assert!(!dir.path().join("b2.db").exists());
    }
}
