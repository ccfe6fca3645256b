use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_cell, headers, result_of, split, Section};

/// Format output as tables: scalar fields first, then one table per row
/// section, then warnings and methodology from the envelope.
pub fn print_table(value: &Value) {
    match result_of(value) {
        Value::Object(result) => {
            let (scalars, sections) = split(result);
            if !scalars.is_empty() {
                print_fields(&scalars);
            }
            for section in &sections {
                print_section(section);
            }
        }
        Value::Array(arr) => {
            let rows: Vec<Map<String, Value>> =
                arr.iter().filter_map(Value::as_object).cloned().collect();
            print_rows(&rows);
        }
        other => println!("{}", format_cell(other)),
    }

    if let Some(envelope) = value.as_object() {
        print_envelope_notes(envelope);
    }
}

fn print_fields(fields: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in fields {
        builder.push_record([key.clone(), format_cell(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_section(section: &Section) {
    println!("\n{}:", section.title);
    print_rows(&section.rows);
}

fn print_rows(rows: &[Map<String, Value>]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }
    let cols = headers(rows);
    let mut builder = Builder::default();
    builder.push_record(cols.clone());
    for row in rows {
        builder.push_record(
            cols.iter()
                .map(|c| row.get(c).map(format_cell).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
