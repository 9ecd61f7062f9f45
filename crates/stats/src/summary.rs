use std::collections::BTreeMap;

use serde::Serialize;

use common::calendar;
use common::types::{ContractType, StatsMode, TradeRecord, TradeStatus};

use crate::series::SeriesCriterion;

/// Converts `value` from `from_currency` into the report currency.
pub type ConvertFn = dyn Fn(f64, &str) -> f64 + Send + Sync;

/// Filters applied before a trade is accumulated.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Accept only these brokers; empty = all.
    pub brokers: Vec<String>,
    /// Accept only these signals; empty = all.
    pub signals: Vec<String>,
    /// Accept only these symbols; empty = all.
    pub symbols: Vec<String>,
    /// Report currency; trades in other currencies are skipped unless a
    /// conversion hook is supplied to [`Summary::compute`].
    pub currency: String,
    pub use_demo: bool,
    pub use_real: bool,
    pub stats_type: StatsMode,
    /// Accept only trades opened in this hour of day (0..23).
    pub hour: Option<u32>,
    /// Accept only trades opened on this weekday (Sunday = 0).
    pub weekday: Option<u32>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            signals: Vec::new(),
            symbols: Vec::new(),
            currency: String::new(),
            use_demo: true,
            use_real: true,
            stats_type: StatsMode::AllBet,
            hour: None,
            weekday: None,
        }
    }
}

/// Win/loss/standoff tally with the derived winrate.
///
/// `winrate` is wins over all deals, standoffs included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WinrateStats {
    pub wins: u64,
    pub losses: u64,
    pub standoffs: u64,
    pub deals: u64,
    pub winrate: f64,
}

impl WinrateStats {
    fn record(&mut self, status: TradeStatus) {
        match status {
            TradeStatus::Win => self.wins += 1,
            TradeStatus::Loss => self.losses += 1,
            TradeStatus::Standoff => self.standoffs += 1,
            _ => {}
        }
    }

    fn finish(&mut self) {
        self.deals = self.wins + self.losses + self.standoffs;
        self.winrate = if self.deals == 0 {
            0.0
        } else {
            self.wins as f64 / self.deals as f64
        };
    }
}

/// Fixed-size partition of outcomes over a calendar dimension
/// (second-of-minute, hour-of-day, weekday, day-of-month, month-of-year).
///
/// `winrate[i]` here is wins over decided trades (wins + losses); standoffs
/// count toward `trades` but not the rate.
#[derive(Debug, Clone, Serialize)]
pub struct BucketStats {
    pub profit: Vec<f64>,
    pub trades: Vec<u32>,
    pub wins: Vec<u32>,
    pub losses: Vec<u32>,
    pub standoffs: Vec<u32>,
    pub winrate: Vec<f64>,
}

impl BucketStats {
    fn new(len: usize) -> Self {
        Self {
            profit: vec![0.0; len],
            trades: vec![0; len],
            wins: vec![0; len],
            losses: vec![0; len],
            standoffs: vec![0; len],
            winrate: vec![0.0; len],
        }
    }

    fn record(&mut self, index: usize, status: TradeStatus, profit_delta: f64) {
        if index >= self.trades.len() {
            return;
        }
        self.profit[index] += profit_delta;
        self.trades[index] += 1;
        match status {
            TradeStatus::Win => self.wins[index] += 1,
            TradeStatus::Loss => self.losses[index] += 1,
            TradeStatus::Standoff => self.standoffs[index] += 1,
            _ => {}
        }
    }

    fn finish(&mut self) {
        for i in 0..self.winrate.len() {
            let decided = self.wins[i] + self.losses[i];
            self.winrate[i] = if decided == 0 {
                0.0
            } else {
                f64::from(self.wins[i]) / f64::from(decided)
            };
        }
    }
}

/// Serial-dependence report derived from the series criterion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZScoreReport {
    pub value: f64,
    pub winrate: f64,
    pub wins: u64,
    pub losses: u64,
    pub total_trades: u64,
    pub max_consecutive_wins: u64,
    pub max_consecutive_losses: u64,
}

/// Aggregate performance statistics over a filtered trade sequence,
/// computed in one pass by [`Summary::compute`].
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: WinrateStats,
    pub total_buy: WinrateStats,
    pub total_sell: WinrateStats,
    pub by_symbol: BTreeMap<String, WinrateStats>,
    pub by_signal: BTreeMap<String, WinrateStats>,
    pub by_second: BucketStats,
    pub by_hour: BucketStats,
    pub by_weekday: BucketStats,
    pub by_day_of_month: BucketStats,
    pub by_month: BucketStats,

    /// Cumulative profit after each settled trade, keyed by open time (s).
    pub trade_profit: Vec<(i64, f64)>,
    /// Profit per calendar day, keyed by start of day (s).
    pub day_profit: Vec<(i64, f64)>,
    /// Account balance after each open/close event, keyed by time (s).
    pub balance_curve: Vec<(i64, f64)>,

    pub total_volume: f64,
    pub total_profit: f64,
    /// Final balance over starting balance; 0 without a positive start.
    pub total_gain: f64,

    pub max_drawdown: f64,
    pub max_absolute_drawdown: f64,
    /// Start of the deepest drawdown, epoch seconds.
    pub max_drawdown_date: i64,
    pub avg_drawdown: f64,

    pub avg_profit_per_trade: f64,
    pub avg_absolute_profit_per_trade: f64,
    pub max_absolute_profit_per_trade: f64,
    pub avg_absolute_trade_size: f64,

    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Gross profit over gross loss; `f64::MAX` for profit without loss,
    /// 0 when there is neither.
    pub profit_factor: f64,

    pub z_score: ZScoreReport,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            total: WinrateStats::default(),
            total_buy: WinrateStats::default(),
            total_sell: WinrateStats::default(),
            by_symbol: BTreeMap::new(),
            by_signal: BTreeMap::new(),
            by_second: BucketStats::new(60),
            by_hour: BucketStats::new(24),
            by_weekday: BucketStats::new(7),
            by_day_of_month: BucketStats::new(31),
            by_month: BucketStats::new(12),
            trade_profit: Vec::new(),
            day_profit: Vec::new(),
            balance_curve: Vec::new(),
            total_volume: 0.0,
            total_profit: 0.0,
            total_gain: 0.0,
            max_drawdown: 0.0,
            max_absolute_drawdown: 0.0,
            max_drawdown_date: 0,
            avg_drawdown: 0.0,
            avg_profit_per_trade: 0.0,
            avg_absolute_profit_per_trade: 0.0,
            max_absolute_profit_per_trade: 0.0,
            avg_absolute_trade_size: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            profit_factor: 0.0,
            z_score: ZScoreReport::default(),
        }
    }
}

fn accepted(config: &StatsConfig, trade: &TradeRecord) -> bool {
    match config.stats_type {
        StatsMode::FirstBet if trade.step != 0 => return false,
        StatsMode::LastBet if !trade.last => return false,
        _ => {}
    }
    if !config.currency.is_empty() && trade.currency != config.currency {
        return false;
    }
    if !config.brokers.is_empty() && !config.brokers.contains(&trade.broker) {
        return false;
    }
    if !config.signals.is_empty() && !config.signals.contains(&trade.signal) {
        return false;
    }
    if !config.symbols.is_empty() && !config.symbols.contains(&trade.symbol) {
        return false;
    }
    if trade.demo && !config.use_demo {
        return false;
    }
    if !trade.demo && !config.use_real {
        return false;
    }
    if trade.amount == 0.0 {
        return false;
    }
    let open_secs = calendar::ms_to_sec(trade.open_date);
    if let Some(hour) = config.hour {
        if calendar::hour_of_day(open_secs) != hour {
            return false;
        }
    }
    if let Some(weekday) = config.weekday {
        if calendar::weekday(open_secs) != weekday {
            return false;
        }
    }
    true
}

impl Summary {
    /// Accumulate every accepted trade, then derive rates, the balance
    /// curve, drawdown figures and the Z-score.
    ///
    /// `convert` rescales `amount` and `profit` whenever a trade's currency
    /// differs from the report currency (or the report currency is unset);
    /// without a hook, values are used as-is.
    pub fn compute(
        trades: &[TradeRecord],
        start_balance: f64,
        config: &StatsConfig,
        convert: Option<&ConvertFn>,
    ) -> Self {
        let mut s = Self::default();
        let mut series = SeriesCriterion::new();
        let mut balance_events: BTreeMap<i64, f64> = BTreeMap::new();
        let mut running_profit = 0.0;
        let mut counted: u64 = 0;

        for trade in trades {
            if !accepted(config, trade) {
                continue;
            }

            let (amount, profit) = match convert {
                Some(convert) if trade.currency != config.currency || config.currency.is_empty() => (
                    convert(trade.amount, &trade.currency),
                    convert(trade.profit, &trade.currency),
                ),
                _ => (trade.amount, trade.profit),
            };

            let open_secs = calendar::ms_to_sec(trade.open_date);
            let close_secs = calendar::ms_to_sec(trade.close_date);
            let day = calendar::start_of_day(open_secs);
            let second = calendar::second_of_minute(open_secs) as usize;
            let hour = calendar::hour_of_day(open_secs) as usize;
            let weekday = calendar::weekday(open_secs) as usize;
            let day_of_month = calendar::day_of_month(open_secs).saturating_sub(1) as usize;
            let month = calendar::month_of_year(open_secs).saturating_sub(1) as usize;

            if !trade.status.is_result() {
                continue;
            }

            s.total.record(trade.status);
            s.by_symbol.entry(trade.symbol.clone()).or_default().record(trade.status);
            s.by_signal.entry(trade.signal.clone()).or_default().record(trade.status);
            if trade.contract_type == ContractType::Buy {
                s.total_buy.record(trade.status);
            } else {
                s.total_sell.record(trade.status);
            }

            let profit_delta = match trade.status {
                TradeStatus::Win => profit,
                TradeStatus::Loss => -amount,
                _ => 0.0,
            };
            for (bucket, index) in [
                (&mut s.by_second, second),
                (&mut s.by_hour, hour),
                (&mut s.by_weekday, weekday),
                (&mut s.by_day_of_month, day_of_month),
                (&mut s.by_month, month),
            ] {
                bucket.record(index, trade.status, profit_delta);
            }

            match trade.status {
                TradeStatus::Win => {
                    series.update_timed(true, open_secs, close_secs);
                    running_profit += profit;
                    *balance_events.entry(open_secs).or_insert(0.0) += -amount;
                    *balance_events.entry(close_secs).or_insert(0.0) += amount + profit;
                    s.avg_profit_per_trade += profit / amount;
                    s.avg_absolute_profit_per_trade += profit;
                    if profit > s.max_absolute_profit_per_trade {
                        s.max_absolute_profit_per_trade = profit;
                    }
                    s.gross_profit += profit;
                    s.total_profit += profit;
                }
                TradeStatus::Loss => {
                    series.update_timed(false, open_secs, close_secs);
                    running_profit -= amount;
                    *balance_events.entry(open_secs).or_insert(0.0) += -amount;
                    balance_events.entry(close_secs).or_insert(0.0);
                    s.avg_profit_per_trade -= 1.0;
                    s.avg_absolute_profit_per_trade -= amount;
                    s.gross_loss += amount;
                    s.total_profit -= amount;
                }
                TradeStatus::Standoff => {
                    // The stake comes back; the run structure is untouched.
                    *balance_events.entry(open_secs).or_insert(0.0) += -amount;
                    *balance_events.entry(close_secs).or_insert(0.0) += amount;
                }
                _ => unreachable!("filtered to settled results above"),
            }

            s.trade_profit.push((open_secs, running_profit));
            match s.day_profit.last_mut() {
                Some((last_day, value)) if *last_day == day => *value += profit_delta,
                _ => s.day_profit.push((day, profit_delta)),
            }

            s.total_volume += amount;
            s.avg_absolute_trade_size += amount;
            counted += 1;
        }

        s.total.finish();
        s.total_buy.finish();
        s.total_sell.finish();
        for stats in s.by_symbol.values_mut() {
            stats.finish();
        }
        for stats in s.by_signal.values_mut() {
            stats.finish();
        }
        s.by_second.finish();
        s.by_hour.finish();
        s.by_weekday.finish();
        s.by_day_of_month.finish();
        s.by_month.finish();

        if counted > 0 {
            let n = counted as f64;
            s.avg_profit_per_trade /= n;
            s.avg_absolute_profit_per_trade /= n;
            s.avg_absolute_trade_size /= n;
        }

        s.profit_factor = if s.gross_loss > 0.0 {
            s.gross_profit / s.gross_loss
        } else if s.gross_profit > 0.0 {
            f64::MAX
        } else {
            0.0
        };

        s.z_score = ZScoreReport {
            value: series.z_score(),
            winrate: series.winrate(),
            wins: series.wins(),
            losses: series.losses(),
            total_trades: series.trades(),
            max_consecutive_wins: series.max_consecutive_wins(),
            max_consecutive_losses: series.max_consecutive_losses(),
        };

        s.fold_balance(&balance_events, start_balance);
        s
    }

    /// Fold the open/close events into the balance curve, tracking the
    /// running peak for the drawdown figures.
    fn fold_balance(&mut self, events: &BTreeMap<i64, f64>, start_balance: f64) {
        let Some((&first, _)) = events.iter().next() else {
            return;
        };
        let mut balance = start_balance;
        let mut last_max = start_balance;
        let mut diff = 0.0;
        let mut in_drawdown = false;
        let mut drawdown_start = 0i64;
        let mut completed_sum = 0.0;
        let mut completed = 0u64;

        self.balance_curve.push((calendar::start_of_day(first), balance));
        for (&time, &delta) in events {
            balance += delta;
            self.balance_curve.push((time, balance));

            if balance < last_max {
                if !in_drawdown {
                    in_drawdown = true;
                    drawdown_start = time;
                }
                diff = last_max - balance;
                if diff > self.max_absolute_drawdown {
                    self.max_absolute_drawdown = diff;
                    if last_max > 0.0 {
                        self.max_drawdown = diff / last_max;
                    }
                    self.max_drawdown_date = drawdown_start;
                }
            } else {
                if in_drawdown && last_max > 0.0 {
                    completed_sum += diff / last_max;
                    completed += 1;
                }
                in_drawdown = false;
                last_max = balance;
            }
        }
        if completed > 0 {
            self.avg_drawdown = completed_sum / completed as f64;
        }
        if start_balance > 0.0 {
            self.total_gain = balance / start_balance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;
    // 2019-01-01 00:00:00 UTC, a Tuesday.
    const BASE: i64 = 1_546_300_800;

    fn settled(
        i: i64,
        amount: f64,
        payout: f64,
        status: TradeStatus,
    ) -> TradeRecord {
        let open = (BASE + i * 60) * 1000;
        TradeRecord {
            uid: i + 1,
            open_date: open,
            close_date: open + 60_000,
            amount,
            payout,
            profit: amount * payout,
            status,
            contract_type: if i % 2 == 0 { ContractType::Buy } else { ContractType::Sell },
            symbol: "EURUSD".to_string(),
            broker: "broker-a".to_string(),
            currency: "USD".to_string(),
            signal: "sig-1".to_string(),
            demo: false,
            last: true,
            step: 0,
            ..TradeRecord::default()
        }
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let s = Summary::compute(&[], 1000.0, &StatsConfig::default(), None);
        assert_eq!(s.total.deals, 0);
        assert_eq!(s.total_profit, 0.0);
        assert_eq!(s.total_gain, 0.0);
        assert_eq!(s.profit_factor, 0.0);
        assert_eq!(s.z_score.value, 0.0);
        assert!(s.balance_curve.is_empty());
    }

    #[test]
    fn test_convert_never_invoked_on_empty_store() {
        let called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let called_clone = called.clone();
        let convert = move |value: f64, _from: &str| {
            called_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            value
        };
        let _ = Summary::compute(&[], 1000.0, &StatsConfig::default(), Some(&convert));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_balance_curve_and_drawdown() {
        // win, loss, win back to back: each closes as the next opens.
        let trades = vec![
            settled(0, 100.0, 0.8, TradeStatus::Win),
            settled(1, 100.0, 0.8, TradeStatus::Loss),
            settled(2, 100.0, 0.8, TradeStatus::Win),
        ];
        let s = Summary::compute(&trades, 1000.0, &StatsConfig::default(), None);

        assert!((s.total_profit - 60.0).abs() < 1e-9);
        assert!((s.total_gain - 1.06).abs() < 1e-9);

        // Balance runs 1000 -> 900 -> 980 -> 880 -> 1060; the peak stays at
        // the starting balance, so the deepest drop is 120 at the third open.
        assert!((s.max_absolute_drawdown - 120.0).abs() < 1e-9);
        assert!((s.max_drawdown - 0.12).abs() < 1e-9);
        assert!((s.avg_drawdown - 0.12).abs() < 1e-9);
        let first_open = calendar::ms_to_sec(trades[0].open_date);
        assert_eq!(s.max_drawdown_date, first_open);

        // final balance equals start plus total profit
        let final_balance = s.balance_curve.last().unwrap().1;
        assert!((final_balance - (1000.0 + s.total_profit)).abs() < 1e-9);
    }

    #[test]
    fn test_final_balance_matches_total_profit_with_standoffs() {
        let trades = vec![
            settled(0, 50.0, 0.9, TradeStatus::Win),
            settled(1, 80.0, 0.0, TradeStatus::Standoff),
            settled(2, 70.0, 0.8, TradeStatus::Loss),
            settled(3, 30.0, 0.85, TradeStatus::Win),
        ];
        let s = Summary::compute(&trades, 500.0, &StatsConfig::default(), None);
        let final_balance = s.balance_curve.last().unwrap().1;
        assert!((final_balance - (500.0 + s.total_profit)).abs() < 1e-9);
        // standoffs count as deals but not in the z-score population
        assert_eq!(s.total.deals, 4);
        assert_eq!(s.total.standoffs, 1);
        assert_eq!(s.z_score.total_trades, 3);
    }

    #[test]
    fn test_profit_factor_edge_cases() {
        let wins_only = vec![settled(0, 100.0, 0.8, TradeStatus::Win)];
        let s = Summary::compute(&wins_only, 0.0, &StatsConfig::default(), None);
        assert_eq!(s.profit_factor, f64::MAX);

        let standoff_only = vec![settled(0, 100.0, 0.0, TradeStatus::Standoff)];
        let s = Summary::compute(&standoff_only, 0.0, &StatsConfig::default(), None);
        assert_eq!(s.profit_factor, 0.0);

        let mixed = vec![
            settled(0, 100.0, 0.8, TradeStatus::Win),
            settled(1, 40.0, 0.8, TradeStatus::Loss),
        ];
        let s = Summary::compute(&mixed, 0.0, &StatsConfig::default(), None);
        assert!((s.profit_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_totals_and_averages() {
        let trades = vec![
            settled(0, 100.0, 0.8, TradeStatus::Win),
            settled(1, 100.0, 0.8, TradeStatus::Loss),
        ];
        let s = Summary::compute(&trades, 0.0, &StatsConfig::default(), None);
        assert_eq!(s.total.wins, 1);
        assert_eq!(s.total.losses, 1);
        assert!((s.total.winrate - 0.5).abs() < 1e-9);
        assert!((s.total_volume - 200.0).abs() < 1e-9);
        assert!((s.avg_absolute_trade_size - 100.0).abs() < 1e-9);
        // (0.8 - 1.0) / 2
        assert!((s.avg_profit_per_trade - (-0.1)).abs() < 1e-9);
        assert!((s.avg_absolute_profit_per_trade - (-10.0)).abs() < 1e-9);
        assert!((s.max_absolute_profit_per_trade - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_partitions_by_hour_and_weekday() {
        // Trades one hour apart starting at midnight on a Tuesday.
        let mut trades = Vec::new();
        for i in 0..3 {
            let open = (BASE + i * HOUR) * 1000;
            let mut t = settled(0, 100.0, 0.8, TradeStatus::Win);
            t.open_date = open;
            t.close_date = open + 60_000;
            t.uid = i + 1;
            trades.push(t);
        }
        let s = Summary::compute(&trades, 0.0, &StatsConfig::default(), None);
        assert_eq!(s.by_hour.trades[0], 1);
        assert_eq!(s.by_hour.trades[1], 1);
        assert_eq!(s.by_hour.trades[2], 1);
        assert_eq!(s.by_hour.trades[3], 0);
        assert_eq!(s.by_weekday.trades[2], 3); // Tuesday
        assert_eq!(s.by_weekday.winrate[2], 1.0);
        assert_eq!(s.by_month.trades[0], 3); // January
        assert_eq!(s.by_day_of_month.trades[0], 3);
    }

    #[test]
    fn test_stats_mode_filters() {
        let mut opener = settled(0, 100.0, 0.8, TradeStatus::Win);
        opener.step = 0;
        opener.last = false;
        let mut closer = settled(1, 200.0, 0.8, TradeStatus::Loss);
        closer.step = 2;
        closer.last = true;
        let trades = vec![opener, closer];

        let first = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { stats_type: StatsMode::FirstBet, ..StatsConfig::default() },
            None,
        );
        assert_eq!(first.total.deals, 1);
        assert_eq!(first.total.wins, 1);

        let last = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { stats_type: StatsMode::LastBet, ..StatsConfig::default() },
            None,
        );
        assert_eq!(last.total.deals, 1);
        assert_eq!(last.total.losses, 1);

        let all = Summary::compute(&trades, 0.0, &StatsConfig::default(), None);
        assert_eq!(all.total.deals, 2);
    }

    #[test]
    fn test_currency_filter_and_conversion() {
        let mut usd = settled(0, 100.0, 0.8, TradeStatus::Win);
        usd.currency = "USD".to_string();
        let mut eur = settled(1, 100.0, 0.8, TradeStatus::Win);
        eur.currency = "EUR".to_string();
        let trades = vec![usd, eur];

        // report currency set, no hook: the EUR trade is skipped
        let config = StatsConfig { currency: "USD".to_string(), ..StatsConfig::default() };
        let s = Summary::compute(&trades, 0.0, &config, None);
        assert_eq!(s.total.deals, 1);

        // no report currency, hook doubles EUR amounts
        let convert = |value: f64, from: &str| if from == "EUR" { value * 2.0 } else { value };
        let s = Summary::compute(&trades, 0.0, &StatsConfig::default(), Some(&convert));
        assert_eq!(s.total.deals, 2);
        // 80 USD + 160 EUR-converted
        assert!((s.total_profit - 240.0).abs() < 1e-9);
        assert!((s.total_volume - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_demo_and_broker_filters() {
        let mut demo = settled(0, 100.0, 0.8, TradeStatus::Win);
        demo.demo = true;
        let mut real = settled(1, 100.0, 0.8, TradeStatus::Loss);
        real.demo = false;
        real.broker = "broker-b".to_string();
        let trades = vec![demo, real];

        let s = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { use_demo: false, ..StatsConfig::default() },
            None,
        );
        assert_eq!(s.total.deals, 1);
        assert_eq!(s.total.losses, 1);

        let s = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { brokers: vec!["broker-b".to_string()], ..StatsConfig::default() },
            None,
        );
        assert_eq!(s.total.deals, 1);
        assert_eq!(s.total.losses, 1);
    }

    #[test]
    fn test_hour_bucket_filter() {
        let mut at_midnight = settled(0, 100.0, 0.8, TradeStatus::Win);
        at_midnight.open_date = BASE * 1000;
        at_midnight.close_date = at_midnight.open_date + 60_000;
        let mut at_one = settled(1, 100.0, 0.8, TradeStatus::Win);
        at_one.open_date = (BASE + HOUR) * 1000;
        at_one.close_date = at_one.open_date + 60_000;
        let trades = vec![at_midnight, at_one];

        let s = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { hour: Some(1), ..StatsConfig::default() },
            None,
        );
        assert_eq!(s.total.deals, 1);

        let s = Summary::compute(
            &trades,
            0.0,
            &StatsConfig { weekday: Some(2), ..StatsConfig::default() },
            None,
        );
        assert_eq!(s.total.deals, 2);
    }
}
