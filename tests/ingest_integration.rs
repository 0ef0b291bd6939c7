mod common;

use benchtrail::application::history_store::DuplicatePolicy;
use benchtrail::application::ingest::{IngestSettings, Ingestor};
use benchtrail::domain::benchmark::SeriesKey;
use benchtrail::domain::errors::{IngestError, StoreError};
use common::{DEPS, FLOW, memory_store, payload};
use serde_json::json;
use std::sync::Arc;

async fn ingestor(policy: DuplicatePolicy) -> Ingestor {
    Ingestor::new(Arc::new(memory_store(policy).await), IngestSettings::default())
}

#[tokio::test]
async fn test_valid_payload_lands_in_every_series() {
    let ingestor = ingestor(DuplicatePolicy::Reject).await;
    let body = payload("aaa1111", 1_653_449_030_827, &[(FLOW, 188483.0, "± 253"), (DEPS, 199393.0, "±512")]);

    let receipt = ingestor
        .ingest_json(&body.to_string(), Some("Benchmark"))
        .await
        .unwrap();
    assert_eq!(receipt.series_touched, 2);

    let point = ingestor
        .store()
        .latest(&SeriesKey::new("Benchmark", DEPS))
        .await
        .unwrap();
    assert_eq!(point.measurement().delta, 512.0);
    assert_eq!(point.run.commit.committer.username.as_deref(), Some("web-flow"));
}

#[tokio::test]
async fn test_each_invalid_field_is_named() {
    let ingestor = ingestor(DuplicatePolicy::Reject).await;
    let base = payload("aaa1111", 1_000, &[(FLOW, 1.0, "± 1"), (DEPS, 2.0, "± 1")]);

    let cases: Vec<(&str, Box<dyn Fn(&mut serde_json::Value)>)> = vec![
        ("commit", Box::new(|v: &mut serde_json::Value| v["commit"] = json!("abc"))),
        ("commit.distinct", Box::new(|v: &mut serde_json::Value| v["commit"]["distinct"] = json!("yes"))),
        ("commit.author.name", Box::new(|v: &mut serde_json::Value| v["commit"]["author"]["name"] = json!(null))),
        ("date", Box::new(|v: &mut serde_json::Value| v["date"] = json!("yesterday"))),
        ("date", Box::new(|v: &mut serde_json::Value| v["date"] = json!(-5))),
        ("tool", Box::new(|v: &mut serde_json::Value| v["tool"] = json!(""))),
        ("benches", Box::new(|v: &mut serde_json::Value| v["benches"] = json!([]))),
        ("benches[1].value", Box::new(|v: &mut serde_json::Value| v["benches"][1]["value"] = json!(-1.0))),
        ("benches[1].range", Box::new(|v: &mut serde_json::Value| v["benches"][1]["range"] = json!("± -4"))),
        ("benches[0].unit", Box::new(|v: &mut serde_json::Value| v["benches"][0]["unit"] = json!("ms/op"))),
        ("benches[0].name", Box::new(|v: &mut serde_json::Value| v["benches"][0]["name"] = json!(" "))),
    ];

    for (field, mutate) in cases {
        let mut body = base.clone();
        mutate(&mut body);
        match ingestor.ingest_value(&body, None, None).await {
            Err(IngestError::Validation(e)) => assert_eq!(e.field, field, "{}", e),
            other => panic!("expected validation error at {}, got {:?}", field, other.map(|r| r.seq)),
        }
    }
    assert_eq!(ingestor.store().series_count().await, 0);
}

#[tokio::test]
async fn test_reingest_follows_duplicate_policy() {
    let reject = ingestor(DuplicatePolicy::Reject).await;
    let body = payload("aaa1111", 1_000, &[(FLOW, 1.0, "± 1")]);
    reject.ingest_value(&body, None, None).await.unwrap();

    let err = reject.ingest_value(&body, None, None).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Store(StoreError::DuplicateCommit { .. })
    ));

    let receipt = reject
        .ingest_value(&body, None, Some(DuplicatePolicy::Upsert))
        .await
        .unwrap();
    assert_eq!(receipt.replaced.len(), 1);
    assert_eq!(
        reject
            .store()
            .query(&SeriesKey::new("Benchmark", FLOW), None)
            .await
            .len(),
        1
    );
}
