use chrono::Utc;
use std::path::Path;

use fund_analytics_core::report::{publish, FileBlobStore, PublishMode, ReportBlob};

use crate::commands::Report;

/// Write `report` under `root`, returning the blob key it was filed at.
///
/// Reports without an as-of date of their own are filed under today.
pub fn publish_report(
    root: &Path,
    report: &Report,
    merge: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let as_of = report.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let blob = ReportBlob::new(report.name, as_of, report.value.clone());
    let key = blob.key();
    let mode = if merge {
        PublishMode::Merge
    } else {
        PublishMode::Replace
    };

    let mut store = FileBlobStore::new(root);
    publish(&mut store, &key, &blob, mode)?;
    tracing::info!(root = %root.display(), key = %key, ?mode, "report published");
    Ok(key)
}
