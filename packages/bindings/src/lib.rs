use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use fund_analytics_core::attribution::{exposure, position_based, return_based};
use fund_analytics_core::performance::{risk_adjusted, trailing};
use fund_analytics_core::report::{self, FileBlobStore, PublishMode, ReportBlob};
use fund_analytics_core::{
    peer_ranking, persistence, quality, rolling, screener, AnalyticsConfig, FundAnalyticsResult,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Deserialise `input_json`, run `compute` and serialise its output.
fn run_json<I, O>(
    input_json: &str,
    compute: impl FnOnce(&I) -> FundAnalyticsResult<O>,
) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = compute(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

#[napi]
pub fn trailing_returns(input_json: String) -> NapiResult<String> {
    run_json(&input_json, trailing::trailing_returns)
}

#[napi]
pub fn risk_adjusted_returns(input_json: String) -> NapiResult<String> {
    run_json(&input_json, risk_adjusted::calculate_risk_adjusted_returns)
}

#[napi]
pub fn rolling_statistics(input_json: String) -> NapiResult<String> {
    run_json(&input_json, rolling::rolling_statistics)
}

// ---------------------------------------------------------------------------
// Peer ranking
// ---------------------------------------------------------------------------

#[napi]
pub fn peer_rankings(input_json: String) -> NapiResult<String> {
    run_json(&input_json, peer_ranking::calculate_peer_rankings)
}

#[napi]
pub fn persistence_analysis(input_json: String) -> NapiResult<String> {
    run_json(&input_json, persistence::persistence_analysis)
}

#[napi]
pub fn screen_funds(input_json: String) -> NapiResult<String> {
    run_json(&input_json, screener::screen_funds)
}

#[napi]
pub fn performance_quality(input_json: String) -> NapiResult<String> {
    run_json(&input_json, quality::performance_quality)
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[napi]
pub fn return_based_attribution(input_json: String) -> NapiResult<String> {
    run_json(&input_json, return_based::return_based_attribution)
}

#[napi]
pub fn position_based_attribution(input_json: String) -> NapiResult<String> {
    run_json(&input_json, position_based::position_based_attribution)
}

#[napi]
pub fn exposure_breakdown(input_json: String) -> NapiResult<String> {
    run_json(&input_json, exposure::exposure_breakdown)
}

// ---------------------------------------------------------------------------
// Configuration and publishing
// ---------------------------------------------------------------------------

/// Default analytics configuration, or the one parsed from `toml_text`.
#[napi]
pub fn analytics_config(toml_text: Option<String>) -> NapiResult<String> {
    let config = match toml_text {
        Some(t) => AnalyticsConfig::from_toml_str(&t).map_err(to_napi_error)?,
        None => AnalyticsConfig::default(),
    };
    serde_json::to_string(&config).map_err(to_napi_error)
}

/// Publish a report output under `root`; returns the blob key written.
#[napi]
pub fn publish_report(
    root: String,
    report_name: String,
    as_of: String,
    output_json: String,
    merge: Option<bool>,
) -> NapiResult<String> {
    let as_of = as_of
        .parse::<chrono::NaiveDate>()
        .map_err(|e| to_napi_error(format!("Invalid as_of '{}': {}", as_of, e)))?;
    let payload: serde_json::Value = serde_json::from_str(&output_json).map_err(to_napi_error)?;
    let blob = ReportBlob::new(report_name, as_of, payload);
    let key = blob.key();
    let mode = if merge.unwrap_or(false) {
        PublishMode::Merge
    } else {
        PublishMode::Replace
    };
    let mut store = FileBlobStore::new(root);
    report::publish(&mut store, &key, &blob, mode).map_err(to_napi_error)?;
    Ok(key)
}
