pub mod config;
pub mod error;
pub mod stats;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "performance")]
pub mod performance;

#[cfg(feature = "performance")]
pub mod rolling;

#[cfg(feature = "ranking")]
pub mod ranking;

#[cfg(feature = "ranking")]
pub mod peer_ranking;

#[cfg(feature = "ranking")]
pub mod persistence;

#[cfg(feature = "ranking")]
pub mod screener;

#[cfg(feature = "ranking")]
pub mod quality;

#[cfg(feature = "attribution")]
pub mod attribution;

#[cfg(feature = "report")]
pub mod report;

pub use config::{AnalyticsConfig, RankingConfig};
pub use error::FundAnalyticsError;
pub use types::*;

/// Standard result type for all fund-analytics operations
pub type FundAnalyticsResult<T> = Result<T, FundAnalyticsError>;
