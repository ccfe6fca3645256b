//! Run-time configuration shared by the ranking reports.
//!
//! Everything has a serde default so a TOML file only needs the keys it
//! wants to change:
//!
//! ```toml
//! frequency = "monthly"
//! risk_free_rate = "0.04"
//!
//! [ranking]
//! tie_break = "jitter"
//! seed = 7
//! outlier_policy = { method = "winsorize", lower = "0.05", upper = "0.95" }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::FundAnalyticsError;
use crate::types::{OutlierPolicy, Rate, ReturnFrequency, TieBreak};
use crate::FundAnalyticsResult;

/// Settings for peer ranking and binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub tie_break: TieBreak,
    /// Seed for jitter tie-breaking; identical seeds give identical ranks
    pub seed: u64,
    pub outlier_policy: OutlierPolicy,
    /// Peer groups smaller than this are reported without percentiles
    pub min_peers: usize,
    /// Minimum observations a member needs for since-inception metrics
    pub min_observations: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            tie_break: TieBreak::Jitter,
            seed: 42,
            outlier_policy: OutlierPolicy::default(),
            min_peers: 3,
            min_observations: 12,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> FundAnalyticsResult<()> {
        self.outlier_policy.validate()?;
        if self.min_peers == 0 {
            return Err(FundAnalyticsError::ConfigError(
                "ranking.min_peers must be at least 1".into(),
            ));
        }
        if self.min_observations < 2 {
            return Err(FundAnalyticsError::ConfigError(
                "ranking.min_observations must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration, typically loaded from `fund-analytics.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub frequency: ReturnFrequency,
    /// Annualised risk-free rate
    pub risk_free_rate: Rate,
    pub ranking: RankingConfig,
    /// Rolling window length in periods
    pub rolling_window: usize,
    /// Root directory for published report blobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            frequency: ReturnFrequency::Monthly,
            risk_free_rate: Decimal::ZERO,
            ranking: RankingConfig::default(),
            rolling_window: 36,
            output_dir: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(s: &str) -> FundAnalyticsResult<Self> {
        let cfg: AnalyticsConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> FundAnalyticsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            FundAnalyticsError::ConfigError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let cfg = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded analytics config");
        Ok(cfg)
    }

    pub fn validate(&self) -> FundAnalyticsResult<()> {
        self.ranking.validate()?;
        if self.rolling_window < 2 {
            return Err(FundAnalyticsError::ConfigError(
                "rolling_window must be at least 2 periods".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalyticsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = AnalyticsConfig::from_toml_str(
            r#"
            risk_free_rate = "0.04"

            [ranking]
            seed = 7
            tie_break = "first"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.risk_free_rate, dec!(0.04));
        assert_eq!(cfg.ranking.seed, 7);
        assert_eq!(cfg.ranking.tie_break, TieBreak::First);
        assert_eq!(cfg.ranking.min_peers, 3);
        assert_eq!(cfg.rolling_window, 36);
    }

    #[test]
    fn test_toml_outlier_policy() {
        let cfg = AnalyticsConfig::from_toml_str(
            r#"
            [ranking]
            outlier_policy = { method = "winsorize", lower = "0.10", upper = "0.90" }
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.ranking.outlier_policy,
            OutlierPolicy::Winsorize { lower: dec!(0.10), upper: dec!(0.90) }
        );
    }

    #[test]
    fn test_invalid_band_rejected() {
        let err = AnalyticsConfig::from_toml_str(
            r#"
            [ranking]
            outlier_policy = { method = "trim", lower = "0.5", upper = "0.5" }
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        assert!(AnalyticsConfig::from_toml_str(r#"frequency = "hourly""#).is_err());
    }
}
