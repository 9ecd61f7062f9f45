//! Performance statistics over trade record sequences: winrate partitions,
//! balance curve and drawdown, serial-dependence Z-score, and per-dimension
//! aggregation with optional currency conversion.

pub mod meta;
pub mod series;
pub mod summary;

pub use meta::MetaStats;
pub use series::SeriesCriterion;
pub use summary::{BucketStats, ConvertFn, StatsConfig, Summary, WinrateStats, ZScoreReport};
