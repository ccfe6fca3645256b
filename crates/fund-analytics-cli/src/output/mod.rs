pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Arrays nested one level down whose rows are lifted into a single
/// section, tagged with the named fields of their parent.
const NESTED: [(&str, &str, &[&str]); 3] = [
    ("tables", "ranked", &["horizon", "metric"]),
    ("breakdowns", "categories", &["dimension"]),
    ("targets", "positions", &["id"]),
];

/// Preferred section for single-table formats such as CSV.
const PRIMARY: [&str; 9] = [
    "tables",
    "funds",
    "windows",
    "percentiles",
    "trailing",
    "loadings",
    "positions",
    "breakdowns",
    "top_positions",
];

/// A titled list of flat rows taken from a report result.
pub struct Section {
    pub title: String,
    pub rows: Vec<Map<String, Value>>,
}

/// The `result` object of a computation envelope, or the value itself.
pub fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

fn is_row_array(v: &Value) -> bool {
    matches!(v, Value::Array(a) if !a.is_empty() && a.iter().all(Value::is_object))
}

/// Flatten nested objects into dotted keys, e.g. `exposure.gross`.
pub fn flatten(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in map {
        match v {
            Value::Object(inner) => {
                for (ik, iv) in flatten(inner) {
                    out.insert(format!("{}.{}", k, ik), iv);
                }
            }
            _ => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    out
}

/// Split a result object into scalar fields and row sections.
pub fn split(result: &Map<String, Value>) -> (Map<String, Value>, Vec<Section>) {
    let mut scalars = Map::new();
    let mut sections = Vec::new();

    for (key, val) in result {
        if !is_row_array(val) {
            match val {
                Value::Object(inner) => {
                    for (ik, iv) in flatten(inner) {
                        scalars.insert(format!("{}.{}", key, ik), iv);
                    }
                }
                _ => {
                    scalars.insert(key.clone(), val.clone());
                }
            }
            continue;
        }
        let items = val.as_array().map(Vec::as_slice).unwrap_or_default();
        let rows = match NESTED.iter().find(|(k, _, _)| *k == key.as_str()) {
            Some((_, child, tags)) => items
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|parent| {
                    let children = parent
                        .get(*child)
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    children.into_iter().filter_map(move |c| {
                        let mut row = Map::new();
                        for tag in tags.iter() {
                            if let Some(t) = parent.get(*tag) {
                                row.insert(tag.to_string(), t.clone());
                            }
                        }
                        row.extend(flatten(c.as_object()?));
                        Some(row)
                    })
                })
                .collect(),
            None => items.iter().filter_map(Value::as_object).map(flatten).collect(),
        };
        sections.push(Section {
            title: key.clone(),
            rows,
        });
    }
    (scalars, sections)
}

/// Column headers covering every row, in first-seen order.
pub fn headers(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in rows {
        for k in row.keys() {
            if !out.contains(k) {
                out.push(k.clone());
            }
        }
    }
    out
}

/// The section a single-table format should print.
pub fn primary(sections: &[Section]) -> Option<&Section> {
    PRIMARY
        .iter()
        .find_map(|p| sections.iter().find(|s| s.title == *p))
        .or_else(|| sections.first())
}

pub fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr.iter().map(format_cell).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_lifts_ranked_rows() {
        let result = json!({
            "peer_group": "Macro",
            "tables": [
                {"horizon": "1y", "metric": "return", "ranked": [{"id": "A", "rank": "1"}, {"id": "B", "rank": "2"}]},
                {"horizon": "3y", "metric": "return", "ranked": [{"id": "A", "rank": "1"}]}
            ]
        });
        let (scalars, sections) = split(result.as_object().unwrap());
        assert_eq!(scalars["peer_group"], json!("Macro"));
        let tables = primary(&sections).unwrap();
        assert_eq!(tables.rows.len(), 3);
        assert_eq!(tables.rows[2]["horizon"], json!("3y"));
        let mut cols = headers(&tables.rows);
        cols.sort();
        assert_eq!(cols, vec!["horizon", "id", "metric", "rank"]);
    }

    #[test]
    fn test_nested_objects_flatten_to_dotted_keys() {
        let result = json!({"totals": {"gross": "1.5", "net": "0.2"}, "nav": "100"});
        let (scalars, sections) = split(result.as_object().unwrap());
        assert!(sections.is_empty());
        assert_eq!(scalars["totals.gross"], json!("1.5"));
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&json!(null)), "");
        assert_eq!(format_cell(&json!([1, "a"])), "1, a");
    }
}
