use std::collections::BTreeSet;

use common::types::TradeRecord;

use crate::summary::{ConvertFn, StatsConfig, Summary};

const HOURS_PER_DAY: usize = 24;
const DAYS_PER_WEEK: usize = 7;

/// Per-dimension breakdown of a trade sequence: one [`Summary`] for every
/// distinct currency, signal, symbol and broker seen, plus fixed
/// hour-of-day and weekday buckets.
///
/// The conversion hook is threaded into every summary that can mix
/// currencies; the per-currency summaries are single-currency by
/// construction and use raw values.
#[derive(Debug, Default)]
pub struct MetaStats {
    pub brokers: Vec<String>,
    pub symbols: Vec<String>,
    pub signals: Vec<String>,
    pub currencies: Vec<String>,
    /// Any real-account activity present.
    pub real: bool,
    /// Any demo-account activity present.
    pub demo: bool,

    pub by_currency: Vec<(String, Summary)>,
    pub by_signal: Vec<(String, Summary)>,
    pub by_symbol: Vec<(String, Summary)>,
    pub by_broker: Vec<(String, Summary)>,
    /// Index = hour of day (0..23).
    pub by_hour: Vec<Summary>,
    /// Index = weekday (Sunday = 0).
    pub by_weekday: Vec<Summary>,
}

impl MetaStats {
    pub fn compute(trades: &[TradeRecord], convert: Option<&ConvertFn>) -> Self {
        let mut meta = Self::default();

        let mut currencies = BTreeSet::new();
        let mut brokers = BTreeSet::new();
        let mut signals = BTreeSet::new();
        let mut symbols = BTreeSet::new();
        for trade in trades {
            currencies.insert(trade.currency.clone());
            brokers.insert(trade.broker.clone());
            signals.insert(trade.signal.clone());
            symbols.insert(trade.symbol.clone());
            if trade.demo {
                meta.demo = true;
            } else {
                meta.real = true;
            }
        }
        meta.currencies = currencies.into_iter().collect();
        meta.brokers = brokers.into_iter().collect();
        meta.signals = signals.into_iter().collect();
        meta.symbols = symbols.into_iter().collect();

        for currency in &meta.currencies {
            let config = StatsConfig { currency: currency.clone(), ..StatsConfig::default() };
            meta.by_currency
                .push((currency.clone(), Summary::compute(trades, 0.0, &config, None)));
        }
        for signal in &meta.signals {
            let config = StatsConfig { signals: vec![signal.clone()], ..StatsConfig::default() };
            meta.by_signal
                .push((signal.clone(), Summary::compute(trades, 0.0, &config, convert)));
        }
        for symbol in &meta.symbols {
            let config = StatsConfig { symbols: vec![symbol.clone()], ..StatsConfig::default() };
            meta.by_symbol
                .push((symbol.clone(), Summary::compute(trades, 0.0, &config, convert)));
        }
        for broker in &meta.brokers {
            let config = StatsConfig { brokers: vec![broker.clone()], ..StatsConfig::default() };
            meta.by_broker
                .push((broker.clone(), Summary::compute(trades, 0.0, &config, convert)));
        }
        for hour in 0..HOURS_PER_DAY {
            let config = StatsConfig { hour: Some(hour as u32), ..StatsConfig::default() };
            meta.by_hour.push(Summary::compute(trades, 0.0, &config, convert));
        }
        for weekday in 0..DAYS_PER_WEEK {
            let config = StatsConfig { weekday: Some(weekday as u32), ..StatsConfig::default() };
            meta.by_weekday.push(Summary::compute(trades, 0.0, &config, convert));
        }

        meta
    }
}
