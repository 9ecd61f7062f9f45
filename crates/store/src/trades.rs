use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::OptionalExtension;

use common::calendar;
use common::config::StoreConfig;
use common::types::{ContractType, OptionStyle, TradeRecord, TradeStatus};

use crate::engine::{Staged, StoreCore};
use crate::error::StoreError;

pub const TRADES_TABLE: &str = "bets-data-v1";

impl Staged for TradeRecord {
    fn table_schema(table: &str) -> Vec<String> {
        vec![format!(
            "CREATE TABLE IF NOT EXISTS '{table}' (
            uid            INTEGER NOT NULL,
            broker_id      INTEGER NOT NULL,
            open_date      INTEGER NOT NULL,
            close_date     INTEGER NOT NULL,
            open_price     REAL    NOT NULL,
            close_price    REAL    NOT NULL,
            amount         REAL    NOT NULL,
            profit         REAL    NOT NULL,
            payout         REAL    NOT NULL,
            winrate        REAL    NOT NULL,
            delay          INTEGER NOT NULL,
            ping           INTEGER NOT NULL,
            duration       INTEGER NOT NULL,
            step           INTEGER NOT NULL,
            demo           INTEGER NOT NULL,
            last           INTEGER NOT NULL,
            contract_type  INTEGER NOT NULL,
            status         INTEGER NOT NULL,
            type           INTEGER NOT NULL,
            symbol         TEXT    NOT NULL,
            broker         TEXT    NOT NULL,
            currency       TEXT    NOT NULL,
            signal         TEXT    NOT NULL,
            comment        TEXT    NOT NULL,
            user_data      TEXT    NOT NULL,
            PRIMARY KEY (open_date, uid))"
        )]
    }

    fn replace_sql(table: &str) -> String {
        format!(
            "INSERT OR REPLACE INTO '{table}' (
            uid, broker_id, open_date, close_date, open_price, close_price,
            amount, profit, payout, winrate, delay, ping, duration, step,
            demo, last, contract_type, status, type, symbol, broker,
            currency, signal, comment, user_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
        )
    }

    fn params(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.uid),
            Value::Integer(self.broker_id),
            Value::Integer(self.open_date),
            Value::Integer(self.close_date),
            Value::Real(self.open_price),
            Value::Real(self.close_price),
            Value::Real(self.amount),
            Value::Real(self.profit),
            Value::Real(self.payout),
            Value::Real(self.winrate),
            Value::Integer(self.delay),
            Value::Integer(self.ping),
            Value::Integer(i64::from(self.duration)),
            Value::Integer(i64::from(self.step)),
            Value::Integer(i64::from(self.demo)),
            Value::Integer(i64::from(self.last)),
            Value::Integer(self.contract_type.code()),
            Value::Integer(self.status.code()),
            Value::Integer(self.style.code()),
            Value::Text(self.symbol.clone()),
            Value::Text(self.broker.clone()),
            Value::Text(self.currency.clone()),
            Value::Text(self.signal.clone()),
            Value::Text(self.comment.clone()),
            Value::Text(self.user_data.clone()),
        ]
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TradeRecord> {
    Ok(TradeRecord {
        uid: row.get(0)?,
        broker_id: row.get(1)?,
        open_date: row.get(2)?,
        close_date: row.get(3)?,
        open_price: row.get(4)?,
        close_price: row.get(5)?,
        amount: row.get(6)?,
        profit: row.get(7)?,
        payout: row.get(8)?,
        winrate: row.get(9)?,
        delay: row.get(10)?,
        ping: row.get(11)?,
        duration: row.get::<_, i64>(12)? as u32,
        step: row.get::<_, i64>(13)? as u32,
        demo: row.get::<_, i64>(14)? != 0,
        last: row.get::<_, i64>(15)? != 0,
        contract_type: ContractType::from_code(row.get(16)?),
        status: TradeStatus::from_code(row.get(17)?),
        style: OptionStyle::from_code(row.get(18)?),
        symbol: row.get(19)?,
        broker: row.get(20)?,
        currency: row.get(21)?,
        signal: row.get(22)?,
        comment: row.get(23)?,
        user_data: row.get(24)?,
    })
}

/// Trade query filters. Every field is optional: an empty list or a zero
/// bound means "no filter on this dimension".
///
/// Date range and the list filters are pushed down into SQL; time-of-day,
/// weekday/hour sets, numeric ranges and the boolean switches are applied
/// as an in-memory post-filter over the ordered scan.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Inclusive `open_date` lower bound in epoch milliseconds; 0 = none.
    pub start_date: i64,
    /// Inclusive `open_date` upper bound in epoch milliseconds; 0 = none.
    pub stop_date: i64,
    pub brokers: Vec<String>,
    pub no_brokers: Vec<String>,
    pub symbols: Vec<String>,
    pub no_symbols: Vec<String>,
    pub signals: Vec<String>,
    pub no_signals: Vec<String>,
    pub currency: Vec<String>,
    pub no_currency: Vec<String>,
    pub durations: Vec<u32>,
    pub no_durations: Vec<u32>,
    /// Allowed open hours of day (0..23).
    pub hours: Vec<u32>,
    pub no_hours: Vec<u32>,
    /// Allowed open weekdays (Sunday = 0 .. Saturday = 6).
    pub weekday: Vec<u32>,
    pub no_weekday: Vec<u32>,
    /// Seconds since midnight; 0 = unbounded.
    pub start_time: u32,
    pub stop_time: u32,
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_payout: f64,
    pub max_payout: f64,
    pub min_ping: i64,
    pub max_ping: i64,
    /// Only final trades of martingale chains.
    pub only_last: bool,
    /// Only trades with a settled result (win/loss/standoff).
    pub only_result: bool,
    pub use_buy: bool,
    pub use_sell: bool,
    pub use_demo: bool,
    pub use_real: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            start_date: 0,
            stop_date: 0,
            brokers: Vec::new(),
            no_brokers: Vec::new(),
            symbols: Vec::new(),
            no_symbols: Vec::new(),
            signals: Vec::new(),
            no_signals: Vec::new(),
            currency: Vec::new(),
            no_currency: Vec::new(),
            durations: Vec::new(),
            no_durations: Vec::new(),
            hours: Vec::new(),
            no_hours: Vec::new(),
            weekday: Vec::new(),
            no_weekday: Vec::new(),
            start_time: 0,
            stop_time: 0,
            min_amount: 0.0,
            max_amount: 0.0,
            min_payout: 0.0,
            max_payout: 0.0,
            min_ping: 0,
            max_ping: 0,
            only_last: false,
            only_result: false,
            use_buy: true,
            use_sell: true,
            use_demo: true,
            use_real: true,
        }
    }
}

fn push_text_filter(
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    column: &str,
    items: &[String],
    negate: bool,
) {
    if items.is_empty() {
        return;
    }
    let placeholders = vec!["?"; items.len()].join(",");
    let op = if negate { "NOT IN" } else { "IN" };
    clauses.push(format!("{column} {op} ({placeholders})"));
    params.extend(items.iter().map(|s| Value::Text(s.clone())));
}

fn push_int_filter(
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    column: &str,
    items: &[u32],
    negate: bool,
) {
    if items.is_empty() {
        return;
    }
    let placeholders = vec!["?"; items.len()].join(",");
    let op = if negate { "NOT IN" } else { "IN" };
    clauses.push(format!("{column} {op} ({placeholders})"));
    params.extend(items.iter().map(|v| Value::Integer(i64::from(*v))));
}

/// Indexed-column push-down: date range plus the IN / NOT IN lists.
fn build_query(request: &RequestConfig) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if request.start_date != 0 {
        clauses.push("open_date >= ?".to_string());
        params.push(Value::Integer(request.start_date));
    }
    if request.stop_date != 0 {
        clauses.push("open_date <= ?".to_string());
        params.push(Value::Integer(request.stop_date));
    }
    push_text_filter(&mut clauses, &mut params, "broker", &request.brokers, false);
    push_text_filter(&mut clauses, &mut params, "broker", &request.no_brokers, true);
    push_text_filter(&mut clauses, &mut params, "symbol", &request.symbols, false);
    push_text_filter(&mut clauses, &mut params, "symbol", &request.no_symbols, true);
    push_text_filter(&mut clauses, &mut params, "signal", &request.signals, false);
    push_text_filter(&mut clauses, &mut params, "signal", &request.no_signals, true);
    push_text_filter(&mut clauses, &mut params, "currency", &request.currency, false);
    push_text_filter(&mut clauses, &mut params, "currency", &request.no_currency, true);
    push_int_filter(&mut clauses, &mut params, "duration", &request.durations, false);
    push_int_filter(&mut clauses, &mut params, "duration", &request.no_durations, true);

    let mut sql = format!("SELECT * FROM '{TRADES_TABLE}'");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY open_date ASC");
    (sql, params)
}

/// Predicates that have no indexed column: evaluated in caller memory
/// after the scan.
fn matches_post_filters(request: &RequestConfig, trade: &TradeRecord) -> bool {
    let secs = calendar::ms_to_sec(trade.open_date);
    let hour = calendar::hour_of_day(secs);
    let weekday = calendar::weekday(secs);

    if !request.hours.is_empty() && !request.hours.contains(&hour) {
        return false;
    }
    if !request.no_hours.is_empty() && request.no_hours.contains(&hour) {
        return false;
    }
    if !request.weekday.is_empty() && !request.weekday.contains(&weekday) {
        return false;
    }
    if !request.no_weekday.is_empty() && request.no_weekday.contains(&weekday) {
        return false;
    }

    if request.start_time != 0 || request.stop_time != 0 {
        let second_of_day = calendar::second_of_day(secs);
        if request.start_time != 0 && second_of_day < request.start_time {
            return false;
        }
        if request.stop_time != 0 && second_of_day > request.stop_time {
            return false;
        }
    }

    if request.min_amount != 0.0 && trade.amount < request.min_amount {
        return false;
    }
    if request.max_amount != 0.0 && trade.amount > request.max_amount {
        return false;
    }
    if request.min_payout != 0.0 && trade.payout < request.min_payout {
        return false;
    }
    if request.max_payout != 0.0 && trade.payout > request.max_payout {
        return false;
    }
    if request.min_ping != 0 && trade.ping < request.min_ping {
        return false;
    }
    if request.max_ping != 0 && trade.ping > request.max_ping {
        return false;
    }

    if request.only_last && !trade.last {
        return false;
    }
    if request.only_result && !trade.status.is_result() {
        return false;
    }
    if !request.use_buy && trade.contract_type == ContractType::Buy {
        return false;
    }
    if !request.use_sell && trade.contract_type == ContractType::Sell {
        return false;
    }
    if !request.use_demo && trade.demo {
        return false;
    }
    if !request.use_real && !trade.demo {
        return false;
    }
    true
}

/// Store of binary-option trade records keyed by `(open_date, uid)`.
///
/// Writes are staged and committed by the background flusher; queries run
/// against the last committed transaction.
pub struct TradeStore {
    core: StoreCore<TradeRecord>,
}

impl TradeStore {
    pub async fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let core = StoreCore::open(path, TRADES_TABLE, config).await?;
        Ok(Self { core })
    }

    /// Reserve a UID for a trade created by the caller.
    pub fn allocate_uid(&self) -> i64 {
        self.core.allocate_uid()
    }

    /// Epoch seconds of the last committed batch.
    pub fn last_update(&self) -> i64 {
        self.core.last_update()
    }

    /// Stage an insert-or-replace of one trade.
    ///
    /// Rejects records without a positive `open_date`; stamps a fresh UID
    /// when the caller left it unset. Returns false in read-only mode or
    /// after close.
    pub fn replace_trade(&self, trade: &mut TradeRecord) -> bool {
        if let Err(err) = self.check_replace(trade) {
            tracing::debug!(uid = trade.uid, error = %err, "replace_trade refused");
            return false;
        }
        if trade.uid <= 0 {
            trade.uid = self.core.allocate_uid();
        }
        self.core.enqueue(trade.clone())
    }

    fn check_replace(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        self.core.ensure_writable()?;
        if trade.open_date <= 0 {
            return Err(StoreError::Invalid("open_date must be positive".to_string()));
        }
        Ok(())
    }

    pub async fn flush(&self) {
        self.core.flush().await;
    }

    /// Fetch one trade by primary key.
    pub async fn get_trade(&self, open_date: i64, uid: i64) -> Option<TradeRecord> {
        if !self.core.is_open() {
            return None;
        }
        self.core
            .db
            .call_named("get_trade", move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "SELECT * FROM '{TRADES_TABLE}' WHERE open_date = ?1 AND uid = ?2"
                        ),
                        rusqlite::params![open_date, uid],
                        map_row,
                    )
                    .optional()?)
            })
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "get_trade failed");
                None
            })
    }

    /// Run a filtered query, ascending by `open_date`. Terminal errors are
    /// logged and yield an empty result.
    pub async fn get_trades(&self, request: &RequestConfig) -> Vec<TradeRecord> {
        if !self.core.is_open() {
            return Vec::new();
        }
        // A reversed date range can match nothing; skip the scan entirely.
        if request.start_date != 0 && request.stop_date != 0 && request.start_date > request.stop_date
        {
            return Vec::new();
        }

        let (sql, params) = build_query(request);
        let scanned = self
            .core
            .db
            .call_named("get_trades", move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await;

        match scanned {
            Ok(rows) => rows
                .into_iter()
                .filter(|trade| matches_post_filters(request, trade))
                .collect(),
            Err(err) => {
                tracing::error!(error = %err, "get_trades failed");
                Vec::new()
            }
        }
    }

    /// Delete every row with the given UID.
    pub async fn remove_trade(&self, uid: i64) -> bool {
        self.core
            .remove_where("uid = ?1", vec![Value::Integer(uid)])
            .await
    }

    /// Delete one row by primary key.
    pub async fn remove_trade_by_key(&self, open_date: i64, uid: i64) -> bool {
        self.core
            .remove_where(
                "open_date = ?1 AND uid = ?2",
                vec![Value::Integer(open_date), Value::Integer(uid)],
            )
            .await
    }

    /// Delete every row whose UID appears in `uids`.
    pub async fn remove_trades(&self, uids: &[i64]) -> bool {
        if uids.is_empty() {
            return false;
        }
        let placeholders = vec!["?"; uids.len()].join(",");
        let params = uids.iter().map(|uid| Value::Integer(*uid)).collect();
        self.core
            .remove_where(&format!("uid IN ({placeholders})"), params)
            .await
    }

    pub async fn remove_all(&self) -> bool {
        self.core.remove_all().await
    }

    pub fn backup<F>(&self, dst: impl Into<PathBuf>, on_done: F) -> bool
    where
        F: FnOnce(&Path, bool) + Send + 'static,
    {
        self.core.backup(dst, on_done)
    }

    pub async fn meta_get(&self, key: &str) -> Option<String> {
        self.core.meta_get(key).await
    }

    pub async fn close(&self) {
        self.core.close().await;
    }
}
