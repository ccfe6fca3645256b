pub mod attribution;
pub mod performance;
pub mod ranking;

use chrono::NaiveDate;
use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use fund_analytics_core::report::deep_merge;
use fund_analytics_core::{AnalyticsConfig, TieBreak};

use crate::input;

/// Settings shared by every subcommand.
pub struct Context {
    pub config: AnalyticsConfig,
}

/// A computed report, ready to print or publish.
pub struct Report {
    pub name: &'static str,
    /// Date the report is filed under when published
    pub as_of: Option<NaiveDate>,
    pub value: Value,
}

impl Report {
    pub fn new(name: &'static str, as_of: Option<NaiveDate>, value: Value) -> Self {
        Report { name, as_of, value }
    }
}

/// Ranking overrides accepted by the peer-based reports.
#[derive(Args, Debug, Default)]
pub struct RankingArgs {
    /// Tie-breaking rule: average, min, max, first, jitter
    #[arg(long)]
    pub tie_break: Option<String>,

    /// Seed for jitter tie-breaking
    #[arg(long)]
    pub seed: Option<u64>,

    /// Minimum ranked peers before percentiles are reported
    #[arg(long)]
    pub min_peers: Option<usize>,
}

impl RankingArgs {
    fn overrides(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let mut ranking = Map::new();
        if let Some(ref t) = self.tie_break {
            let parsed: TieBreak = serde_json::from_value(Value::String(t.to_lowercase()))
                .map_err(|_| format!("Unknown tie-break rule '{}'", t))?;
            ranking.insert("tie_break".into(), serde_json::to_value(parsed)?);
        }
        if let Some(seed) = self.seed {
            ranking.insert("seed".into(), json!(seed));
        }
        if let Some(n) = self.min_peers {
            ranking.insert("min_peers".into(), json!(n));
        }
        Ok(if ranking.is_empty() {
            json!({})
        } else {
            json!({ "ranking": ranking })
        })
    }
}

/// Config values an input document may take from `--config`.
#[derive(Clone, Copy)]
pub enum ConfigKey {
    Frequency,
    RiskFreeRate,
    Ranking,
    Window,
}

fn config_defaults(config: &AnalyticsConfig, keys: &[ConfigKey]) -> Result<Value, serde_json::Error> {
    let mut defaults = Map::new();
    for key in keys {
        let (name, value) = match key {
            ConfigKey::Frequency => ("frequency", serde_json::to_value(config.frequency)?),
            ConfigKey::RiskFreeRate => ("risk_free_rate", serde_json::to_value(config.risk_free_rate)?),
            ConfigKey::Ranking => ("ranking", serde_json::to_value(&config.ranking)?),
            ConfigKey::Window => ("window", json!(config.rolling_window)),
        };
        defaults.insert(name.to_string(), value);
    }
    Ok(Value::Object(defaults))
}

/// Read the input document and layer it over the config defaults.
///
/// Precedence, highest first: command-line overrides, the input
/// document, `--config`, built-in defaults.
pub fn load_input<T: DeserializeOwned>(
    ctx: &Context,
    path: Option<&str>,
    what: &str,
    keys: &[ConfigKey],
    overrides: Value,
) -> Result<T, Box<dyn std::error::Error>> {
    let document = input::read_document(path, what)?;

    let mut merged = config_defaults(&ctx.config, keys)?;
    deep_merge(&mut merged, document);
    deep_merge(&mut merged, overrides);
    tracing::debug!(command = what, "input document loaded");
    Ok(serde_json::from_value(merged)?)
}
