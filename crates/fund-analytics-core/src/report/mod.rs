//! Report blobs: dated JSON documents assembled from computation outputs
//! and published to a [`BlobStore`].

pub mod store;

pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FundAnalyticsError;
use crate::FundAnalyticsResult;

/// A published report document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportBlob {
    pub report: String,
    pub as_of: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub payload: Value,
}

impl ReportBlob {
    pub fn new(report: impl Into<String>, as_of: NaiveDate, payload: Value) -> Self {
        Self {
            report: report.into(),
            as_of,
            generated_at: Utc::now(),
            payload,
        }
    }

    /// Wrap any serialisable result, typically a `ComputationOutput`.
    pub fn from_output<T: Serialize>(
        report: impl Into<String>,
        as_of: NaiveDate,
        output: &T,
    ) -> FundAnalyticsResult<Self> {
        Ok(Self::new(report, as_of, serde_json::to_value(output)?))
    }

    pub fn key(&self) -> String {
        blob_key(&self.report, self.as_of)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Overwrite any existing document
    #[default]
    Replace,
    /// Deep-merge into the existing document
    Merge,
}

/// `{report}/{YYYY}/{MM}/{report}_{YYYY-MM-DD}.json`
pub fn blob_key(report: &str, as_of: NaiveDate) -> String {
    format!(
        "{report}/{:04}/{:02}/{report}_{}.json",
        as_of.year(),
        as_of.month(),
        as_of.format("%Y-%m-%d"),
        report = report
    )
}

/// Merge `update` into `base`. Objects merge key by key; any other value
/// in `update` (arrays included) replaces the one in `base`.
pub fn deep_merge(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (k, v) in update_map {
                match base_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// Write `blob` to `store` at `key` and return the document written.
pub fn publish(
    store: &mut dyn BlobStore,
    key: &str,
    blob: &ReportBlob,
    mode: PublishMode,
) -> FundAnalyticsResult<Value> {
    if blob.report.trim().is_empty() {
        return Err(FundAnalyticsError::InvalidInput {
            field: "report".into(),
            reason: "Report name must not be empty".into(),
        });
    }
    let update = serde_json::to_value(blob)?;
    let document = match (mode, store.read(key)?) {
        (PublishMode::Merge, Some(mut existing)) => {
            deep_merge(&mut existing, update);
            existing
        }
        _ => update,
    };
    store.write(key, &document)?;
    tracing::debug!(key, ?mode, "report published");
    Ok(document)
}
