use serde_json::{Map, Value};
use std::io;

use super::{format_cell, headers, primary, result_of, split};

/// Write the report's primary row section as CSV to stdout, or a
/// two-column field/value listing when the result has no rows.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(result) => {
            let (scalars, sections) = split(result);
            match primary(&sections) {
                Some(section) => write_rows(&mut wtr, &section.rows),
                None => write_fields(&mut wtr, &scalars),
            }
        }
        Value::Array(arr) => {
            let rows: Vec<Map<String, Value>> =
                arr.iter().filter_map(Value::as_object).cloned().collect();
            write_rows(&mut wtr, &rows);
        }
        other => {
            let _ = wtr.write_record([format_cell(other)]);
        }
    }

    if let Err(e) = wtr.flush() {
        tracing::warn!(error = %e, "failed to flush CSV output");
    }
}

fn write_fields<W: io::Write>(wtr: &mut csv::Writer<W>, fields: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in fields {
        let _ = wtr.write_record([key.as_str(), &format_cell(val)]);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Map<String, Value>]) {
    if rows.is_empty() {
        return;
    }
    let cols = headers(rows);
    let _ = wtr.write_record(&cols);
    for row in rows {
        let record: Vec<String> = cols
            .iter()
            .map(|c| row.get(c).map(format_cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_written_with_union_headers() {
        let rows: Vec<Map<String, Value>> = vec![
            json!({"id": "A", "value": "0.1"}).as_object().unwrap().clone(),
            json!({"id": "B", "rank": "2"}).as_object().unwrap().clone(),
        ];
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_rows(&mut wtr, &rows);
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id,value,rank");
        assert_eq!(lines[2], "B,,2");
    }
}
