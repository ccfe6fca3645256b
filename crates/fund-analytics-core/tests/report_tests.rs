#![cfg(all(feature = "report", feature = "ranking"))]

use chrono::NaiveDate;
use fund_analytics_core::peer_ranking::{calculate_peer_rankings, PeerMetric, PeerRankingInput};
use fund_analytics_core::performance::Horizon;
use fund_analytics_core::report::{
    blob_key, publish, BlobStore, FileBlobStore, PublishMode, ReportBlob,
};
use fund_analytics_core::{RankingConfig, ReturnFrequency, ReturnObservation, ReturnSeries};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn quarterly(id: &str, values: &[Decimal]) -> ReturnSeries {
    let ends = [(3, 31), (6, 30), (9, 30), (12, 31)];
    ReturnSeries::new(
        id,
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let (m, d) = ends[i % 4];
                ReturnObservation {
                    date: date(2023 + (i / 4) as i32, m, d),
                    value: *v,
                }
            })
            .collect(),
    )
}

fn ranking_input() -> PeerRankingInput {
    PeerRankingInput {
        peer_group: "Credit".into(),
        as_of: date(2024, 12, 31),
        target_ids: vec!["B".into()],
        members: vec![
            quarterly("A", &[dec!(0.01); 8]),
            quarterly("B", &[dec!(0.02); 8]),
            quarterly("C", &[dec!(0.03); 8]),
        ],
        benchmark: None,
        risk_free_rate: Decimal::ZERO,
        frequency: ReturnFrequency::Quarterly,
        periods: vec![Horizon::OneYear],
        metrics: vec![PeerMetric::Return],
        ranking: RankingConfig::default(),
    }
}

#[test]
fn test_publish_peer_ranking_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileBlobStore::new(dir.path());
    let input = ranking_input();
    let output = calculate_peer_rankings(&input).unwrap();

    let blob = ReportBlob::from_output("peer_ranking", input.as_of, &output).unwrap();
    let key = blob.key();
    assert_eq!(key, blob_key("peer_ranking", input.as_of));
    publish(&mut store, &key, &blob, PublishMode::Replace).unwrap();

    let path = dir
        .path()
        .join("peer_ranking/2024/12/peer_ranking_2024-12-31.json");
    assert!(path.exists());
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(on_disk["report"], "peer_ranking");
    assert_eq!(on_disk["as_of"], "2024-12-31");
    let ranked = &on_disk["payload"]["result"]["tables"][0]["ranked"];
    assert_eq!(ranked[0]["id"], "C");
    assert_eq!(on_disk["payload"]["result"]["targets"][0]["positions"][0]["percentile"], 51);
}

#[test]
fn test_merge_adds_section_without_losing_existing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileBlobStore::new(dir.path());
    let as_of = date(2024, 12, 31);
    let key = blob_key("monthly_pack", as_of);

    let first = ReportBlob::new("monthly_pack", as_of, json!({"rankings": {"credit": [1, 2]}}));
    publish(&mut store, &key, &first, PublishMode::Replace).unwrap();
    let second = ReportBlob::new("monthly_pack", as_of, json!({"rankings": {"macro": [3]}}));
    publish(&mut store, &key, &second, PublishMode::Merge).unwrap();

    let doc = store.read(&key).unwrap().unwrap();
    assert_eq!(doc["payload"]["rankings"]["credit"], json!([1, 2]));
    assert_eq!(doc["payload"]["rankings"]["macro"], json!([3]));
}

#[test]
fn test_empty_report_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileBlobStore::new(dir.path());
    let blob = ReportBlob::new("  ", date(2024, 1, 31), json!({}));
    assert!(publish(&mut store, "x.json", &blob, PublishMode::Replace).is_err());
}
