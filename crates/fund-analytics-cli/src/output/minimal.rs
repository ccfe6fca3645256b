use serde_json::Value;

use super::{format_cell, result_of};

/// Headline figure of each report, in order of priority.
const HEADLINE_KEYS: [&str; 10] = [
    "quality_score",
    "alpha_annualised",
    "total_contribution",
    "sharpe_ratio",
    "passed",
    "persistence_score",
    "average_spearman",
    "annualised_return",
    "mean_return",
    "member_count",
];

/// Print just the headline value of a report.
///
/// Looks for a known headline field first (skipping nulls), then falls
/// back to the first field of the result object.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in &HEADLINE_KEYS {
            if let Some(val) = map.get(*key).filter(|v| !v.is_null()) {
                println!("{}", minimal_text(val));
                return;
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, minimal_text(val));
            return;
        }
    }
    println!("{}", minimal_text(result));
}

fn minimal_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
        other => format_cell(other),
    }
}
