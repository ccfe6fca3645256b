use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

fn cli() -> Command {
    Command::cargo_bin("fund-analytics").unwrap()
}

fn monthly(id: &str, base: f64, months: usize) -> Value {
    let pattern = [0.02, -0.015, 0.01, 0.005];
    let observations: Vec<Value> = (0..months)
        .map(|i| {
            let (y, m) = (2022 + (i / 12) as i32, (i % 12) as u32 + 1);
            let last_day = match m {
                2 => 28,
                4 | 6 | 9 | 11 => 30,
                _ => 31,
            };
            json!({
                "date": format!("{:04}-{:02}-{:02}", y, m, last_day),
                "value": format!("{:.4}", base + pattern[i % pattern.len()]),
            })
        })
        .collect();
    json!({ "id": id, "name": format!("{} Fund", id), "observations": observations })
}

fn peer_group_doc() -> Value {
    json!({
        "peer_group": "Equity Long/Short",
        "as_of": "2023-12-31",
        "target_ids": ["B"],
        "members": [
            monthly("A", 0.001, 24),
            monthly("B", 0.002, 24),
            monthly("C", 0.003, 24),
            monthly("D", 0.004, 24),
        ],
        "periods": ["1y"],
        "metrics": ["return"]
    })
}

fn write_doc(dir: &Path, name: &str, doc: &Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_version() {
    cli()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("fund-analytics "));
}

#[test]
fn test_peer_rank_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_doc(dir.path(), "peers.json", &peer_group_doc());
    let out = cli()
        .args(["peer-rank", "--input", &input])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["result"]["tables"][0]["ranked"][0]["id"], "D");
    assert_eq!(v["result"]["targets"][0]["positions"][0]["percentile"], 67);
}

#[test]
fn test_peer_rank_from_stdin_as_csv() {
    cli()
        .args(["peer-rank", "--output", "csv"])
        .write_stdin(peer_group_doc().to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("horizon"))
        .stdout(predicate::str::contains("1y"));
}

#[test]
fn test_missing_input_is_error() {
    cli()
        .arg("screen")
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--input <file.json> or stdin required"));
}

#[test]
fn test_config_and_flag_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_doc(dir.path(), "peers.json", &peer_group_doc());
    let config = dir.path().join("analytics.toml");
    fs::write(&config, "[ranking]\nseed = 11\nmin_peers = 2\n").unwrap();

    let out = cli()
        .args(["peer-rank", "--input", &input, "--config"])
        .arg(&config)
        .args(["--tie-break", "first"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["assumptions"]["seed"], 11);
    assert_eq!(v["assumptions"]["min_peers"], 2);
    assert_eq!(v["assumptions"]["tie_break"], "first");
}

#[test]
fn test_publish_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_doc(dir.path(), "peers.json", &peer_group_doc());
    let blobs = dir.path().join("blobs");

    cli()
        .args(["peer-rank", "--input", &input, "--publish"])
        .arg(&blobs)
        .assert()
        .success();
    let key = blobs.join("peer_ranking/2023/12/peer_ranking_2023-12-31.json");
    assert!(key.exists());

    let mut second = peer_group_doc();
    second["peer_group"] = json!("Renamed");
    let input2 = write_doc(dir.path(), "peers2.json", &second);
    cli()
        .args(["peer-rank", "--input", &input2, "--merge", "--publish"])
        .arg(&blobs)
        .assert()
        .success();

    let doc: Value = serde_json::from_str(&fs::read_to_string(key).unwrap()).unwrap();
    assert_eq!(doc["report"], "peer_ranking");
    assert_eq!(doc["payload"]["result"]["peer_group"], "Renamed");
}

#[test]
fn test_risk_adjusted_inline_minimal() {
    cli()
        .args([
            "risk-adjusted",
            "--returns",
            "0.02,-0.01,0.03,0.01,-0.02,0.015",
            "--risk-free-rate",
            "0.0",
            "--output",
            "minimal",
        ])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^-?\d+(\.\d+)?\n$").unwrap());
}

#[test]
fn test_exposure_table_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_doc(
        dir.path(),
        "book.json",
        &json!({
            "nav": "1000",
            "positions": [
                {"name": "XOM", "long_value": "300", "categories": {"sector": "Energy"}},
                {"name": "MSFT", "short_value": "100", "categories": {"sector": "Tech"}}
            ]
        }),
    );
    cli()
        .args(["exposure", "--input", &input, "--output", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("totals.gross_pct"))
        .stdout(predicate::str::contains("Energy"))
        .stdout(predicate::str::contains("Methodology:"));
}

#[test]
fn test_invalid_input_reports_core_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_doc(dir.path(), "book.json", &json!({"nav": "0", "positions": []}));
    cli()
        .args(["exposure", "--input", &input])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
