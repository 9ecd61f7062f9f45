use serde::{Deserialize, Serialize};

/// Direction of a binary-option contract.
///
/// The integer codes are part of the storage schema; `Sell` is `-1` so a
/// database written by older tooling reads back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContractType {
    #[default]
    Unknown,
    Buy,
    Sell,
}

impl ContractType {
    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Buy,
            -1 => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

/// Lifecycle state of a trade.
///
/// Only `Win`, `Loss` and `Standoff` carry a settled result; everything else
/// is an intermediate or error state and is excluded by result-only queries
/// and by the statistics layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TradeStatus {
    #[default]
    Unknown,
    OpeningError,
    CheckError,
    LowPayoutError,
    WaitingCompletion,
    Win,
    Loss,
    Standoff,
    Update,
    IncorrectParameters,
    AuthorizationError,
}

impl TradeStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::OpeningError => 1,
            Self::CheckError => 2,
            Self::LowPayoutError => 3,
            Self::WaitingCompletion => 4,
            Self::Win => 5,
            Self::Loss => 6,
            Self::Standoff => 7,
            Self::Update => 8,
            Self::IncorrectParameters => 9,
            Self::AuthorizationError => 10,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::OpeningError,
            2 => Self::CheckError,
            3 => Self::LowPayoutError,
            4 => Self::WaitingCompletion,
            5 => Self::Win,
            6 => Self::Loss,
            7 => Self::Standoff,
            8 => Self::Update,
            9 => Self::IncorrectParameters,
            10 => Self::AuthorizationError,
            _ => Self::Unknown,
        }
    }

    /// True for the three settled outcomes that flow into statistics.
    pub fn is_result(self) -> bool {
        matches!(self, Self::Win | Self::Loss | Self::Standoff)
    }
}

/// Expiration style of the option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptionStyle {
    #[default]
    Sprint,
    Classic,
}

impl OptionStyle {
    pub fn code(self) -> i64 {
        match self {
            Self::Sprint => 0,
            Self::Classic => 1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Classic,
            _ => Self::Sprint,
        }
    }
}

/// Which trades of a martingale chain a statistics run samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsMode {
    /// Only chain openers (`step == 0`).
    FirstBet,
    /// Only chain closers (`last == true`).
    LastBet,
    /// Every trade.
    #[default]
    AllBet,
}

/// A single binary-option trade as persisted in the trade store.
///
/// `uid` is the store-local monotonic identifier; `broker_id` is whatever
/// the upstream broker assigned. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub uid: i64,
    pub broker_id: i64,
    pub open_date: i64,
    pub close_date: i64,
    pub open_price: f64,
    pub close_price: f64,
    pub amount: f64,
    pub profit: f64,
    pub payout: f64,
    pub winrate: f64,
    /// Order-placement delay in milliseconds.
    pub delay: i64,
    /// Round-trip ping of the open request in milliseconds.
    pub ping: i64,
    /// Expiration in seconds.
    pub duration: u32,
    /// Martingale step index, 0 for a chain opener.
    pub step: u32,
    pub demo: bool,
    /// Last trade of a martingale chain.
    pub last: bool,
    pub contract_type: ContractType,
    pub status: TradeStatus,
    pub style: OptionStyle,
    pub symbol: String,
    pub broker: String,
    pub currency: String,
    pub signal: String,
    pub comment: String,
    pub user_data: String,
}

impl Default for TradeRecord {
    fn default() -> Self {
        Self {
            uid: 0,
            broker_id: 0,
            open_date: 0,
            close_date: 0,
            open_price: 0.0,
            close_price: 0.0,
            amount: 0.0,
            profit: 0.0,
            payout: 0.0,
            winrate: 0.0,
            delay: 0,
            ping: 0,
            duration: 0,
            step: 0,
            demo: true,
            last: true,
            contract_type: ContractType::Unknown,
            status: TradeStatus::Unknown,
            style: OptionStyle::Sprint,
            symbol: String::new(),
            broker: String::new(),
            currency: String::new(),
            signal: String::new(),
            comment: String::new(),
            user_data: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_type_codes_round_trip() {
        for ct in [ContractType::Unknown, ContractType::Buy, ContractType::Sell] {
            assert_eq!(ContractType::from_code(ct.code()), ct);
        }
        assert_eq!(ContractType::Sell.code(), -1);
        assert_eq!(ContractType::from_code(42), ContractType::Unknown);
    }

    #[test]
    fn test_status_codes_round_trip() {
        for code in 0..=10 {
            assert_eq!(TradeStatus::from_code(code).code(), code);
        }
        assert_eq!(TradeStatus::from_code(99), TradeStatus::Unknown);
    }

    #[test]
    fn test_status_is_result() {
        assert!(TradeStatus::Win.is_result());
        assert!(TradeStatus::Loss.is_result());
        assert!(TradeStatus::Standoff.is_result());
        assert!(!TradeStatus::WaitingCompletion.is_result());
        assert!(!TradeStatus::Unknown.is_result());
    }

    #[test]
    fn test_trade_record_defaults() {
        let trade = TradeRecord::default();
        assert!(trade.demo);
        assert!(trade.last);
        assert_eq!(trade.style, OptionStyle::Sprint);
        assert_eq!(trade.status, TradeStatus::Unknown);
    }
}
