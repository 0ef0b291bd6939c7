mod common;

use benchtrail::application::history_store::{DuplicatePolicy, HistoryStore};
use benchtrail::domain::benchmark::{Measurement, SeriesKey, TimeRange};
use benchtrail::domain::errors::StoreError;
use benchtrail::infrastructure::InMemoryHistoryBackend;
use chrono::{TimeZone, Utc};
use common::{DEPS, FLOW, SUITE, memory_store, run};
use std::sync::Arc;

fn flow() -> SeriesKey {
    SeriesKey::new(SUITE, FLOW)
}

fn values(store_points: impl Iterator<Item = benchtrail::application::SeriesPoint>) -> Vec<f64> {
    store_points.map(|p| p.measurement().value).collect()
}

#[tokio::test]
async fn test_out_of_order_runs_read_back_sorted() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    store.append(run("c3", 3_000, &[(FLOW, 3.0, 1.0)])).await.unwrap();
    store.append(run("c1", 1_000, &[(FLOW, 1.0, 1.0)])).await.unwrap();
    store.append(run("c2", 2_000, &[(FLOW, 2.0, 1.0)])).await.unwrap();

    assert_eq!(values(store.query(&flow(), None).await), vec![1.0, 2.0, 3.0]);
    assert_eq!(store.latest(&flow()).await.unwrap().commit_id(), "c3");
}

#[tokio::test]
async fn test_duplicate_commit_rejected_by_default() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    store
        .append(run("abc", 1_000, &[(FLOW, 10.0, 1.0), (DEPS, 20.0, 1.0)]))
        .await
        .unwrap();

    let err = store
        .append(run("abc", 2_000, &[(FLOW, 11.0, 1.0)]))
        .await
        .unwrap_err();
    match err {
        StoreError::DuplicateCommit { key, commit_id } => {
            assert_eq!(key, flow());
            assert_eq!(commit_id, "abc");
        }
        other => panic!("expected DuplicateCommit, got {:?}", other),
    }

    assert_eq!(store.query(&flow(), None).await.len(), 1);
    assert_eq!(store.latest(&flow()).await.unwrap().measurement().value, 10.0);
}

#[tokio::test]
async fn test_upsert_replaces_point_without_growing() {
    let store = memory_store(DuplicatePolicy::Upsert).await;
    store.append(run("abc", 1_000, &[(FLOW, 10.0, 1.0)])).await.unwrap();
    store.append(run("def", 2_000, &[(FLOW, 12.0, 1.0)])).await.unwrap();

    let receipt = store.append(run("abc", 1_500, &[(FLOW, 11.0, 1.0)])).await.unwrap();
    assert_eq!(receipt.replaced, vec![flow()]);

    let points: Vec<_> = store.query(&flow(), None).await.collect();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].commit_id(), "abc");
    assert_eq!(points[0].measurement().value, 11.0);
    assert_eq!(points[0].timestamp(), Utc.timestamp_millis_opt(1_500).unwrap());
}

#[tokio::test]
async fn test_per_call_overwrite_on_reject_store() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    store.append(run("abc", 1_000, &[(FLOW, 10.0, 1.0)])).await.unwrap();

    store
        .append_with_policy(run("abc", 1_000, &[(FLOW, 9.0, 1.0)]), DuplicatePolicy::Upsert)
        .await
        .unwrap();
    assert_eq!(store.latest(&flow()).await.unwrap().measurement().value, 9.0);
}

#[tokio::test]
async fn test_unit_mismatch_leaves_every_series_unchanged() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    store
        .append(run("c1", 1_000, &[(FLOW, 10.0, 1.0), (DEPS, 20.0, 1.0)]))
        .await
        .unwrap();

    // DEPS is fine, FLOW drifts to milliseconds: nothing of the run may land.
    let mut drifted = run("c2", 2_000, &[(DEPS, 21.0, 1.0)]);
    drifted
        .measurements
        .push(Measurement::new(FLOW, 0.01, 0.0, "ms"));

    let err = store.append(drifted).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnitMismatch { ref expected, ref actual, .. } if expected == "ns/iter" && actual == "ms"
    ));

    assert_eq!(store.query(&flow(), None).await.len(), 1);
    assert_eq!(store.query(&SeriesKey::new(SUITE, DEPS), None).await.len(), 1);
    assert_eq!(store.run_count().await, 1);
}

#[tokio::test]
async fn test_range_query_bounds_are_inclusive() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    for i in 1..=5 {
        store
            .append(run(&format!("c{}", i), i * 1_000, &[(FLOW, i as f64, 1.0)]))
            .await
            .unwrap();
    }
    let at = |ms: i64| Utc.timestamp_millis_opt(ms).unwrap();

    let inside = store
        .query(&flow(), Some(TimeRange::between(at(2_000), at(4_000))))
        .await;
    assert_eq!(values(inside), vec![2.0, 3.0, 4.0]);

    let since = store.query(&flow(), Some(TimeRange::since(at(4_000)))).await;
    assert_eq!(values(since), vec![4.0, 5.0]);

    let until = store.query(&flow(), Some(TimeRange::until(at(1_000)))).await;
    assert_eq!(values(until), vec![1.0]);

    let inverted = store
        .query(&flow(), Some(TimeRange::between(at(4_000), at(2_000))))
        .await;
    assert_eq!(inverted.len(), 0);

    let before_history = store.query(&flow(), Some(TimeRange::until(at(10)))).await;
    assert_eq!(before_history.len(), 0);

    let last_two = store.last_n(&flow(), 2).await;
    assert_eq!(values(last_two), vec![4.0, 5.0]);
}

#[tokio::test]
async fn test_unknown_key_is_empty() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    let missing = SeriesKey::new("Nightly", "nothing");
    assert_eq!(store.query(&missing, None).await.len(), 0);
    assert!(store.latest(&missing).await.is_none());
}

#[tokio::test]
async fn test_concurrent_appends_all_land() {
    let store = Arc::new(memory_store(DuplicatePolicy::Reject).await);

    let mut handles = Vec::new();
    for i in 0..16i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append(run(&format!("c{}", i), (16 - i) * 100, &[(FLOW, i as f64, 0.5)]))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let points: Vec<_> = store.query(&flow(), None).await.collect();
    assert_eq!(points.len(), 16);
    assert!(points.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
}

#[tokio::test]
async fn test_reader_snapshot_is_stable_during_writes() {
    let store = memory_store(DuplicatePolicy::Reject).await;
    store.append(run("c1", 1_000, &[(FLOW, 1.0, 1.0)])).await.unwrap();

    let mut cursor = store.query(&flow(), None).await;
    store.append(run("c0", 500, &[(FLOW, 0.5, 1.0)])).await.unwrap();

    assert_eq!(cursor.next().unwrap().commit_id(), "c1");
    assert!(cursor.next().is_none());
}

#[tokio::test]
async fn test_backend_failure_leaves_index_untouched() {
    use anyhow::Result;
    use async_trait::async_trait;
    use benchtrail::domain::benchmark::Run;
    use benchtrail::domain::repositories::{HistoryBackend, StoredRun};

    struct FailingBackend;

    #[async_trait]
    impl HistoryBackend for FailingBackend {
        async fn append(&self, _run: &Run) -> Result<i64> {
            anyhow::bail!("disk full")
        }
        async fn load(&self) -> Result<Vec<StoredRun>> {
            Ok(Vec::new())
        }
        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    let store = HistoryStore::open(Arc::new(FailingBackend), DuplicatePolicy::Reject)
        .await
        .unwrap();
    let err = store.append(run("c1", 1_000, &[(FLOW, 1.0, 1.0)])).await.unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
    assert_eq!(store.series_count().await, 0);

    // Control: same run succeeds on a working backend.
    let ok = HistoryStore::open(Arc::new(InMemoryHistoryBackend::new()), DuplicatePolicy::Reject)
        .await
        .unwrap();
    ok.append(run("c1", 1_000, &[(FLOW, 1.0, 1.0)])).await.unwrap();
    assert_eq!(ok.series_count().await, 1);
}
