mod common;

use benchtrail::application::bootstrap::PersistenceBootstrap;
use benchtrail::application::history_store::{DuplicatePolicy, HistoryStore};
use benchtrail::config::StoreEnvConfig;
use benchtrail::domain::benchmark::SeriesKey;
use common::{DEPS, FLOW, SUITE, run};

async fn open(url: &str, policy: DuplicatePolicy) -> HistoryStore {
    let config = StoreEnvConfig {
        database_url: url.to_string(),
        duplicate_policy: policy,
    };
    let backend = PersistenceBootstrap::init(&config).await.unwrap();
    HistoryStore::open(backend, policy).await.unwrap()
}

async fn reopen_preserves_history(url: &str) {
    let flow = SeriesKey::new(SUITE, FLOW);
    {
        let store = open(url, DuplicatePolicy::Upsert).await;
        store
            .append(run("c2", 2_000, &[(FLOW, 20.0, 1.0), (DEPS, 40.0, 1.0)]))
            .await
            .unwrap();
        store
            .append(run("c1", 1_000, &[(FLOW, 10.0, 1.0), (DEPS, 30.0, 1.0)]))
            .await
            .unwrap();
        // Upsert only FLOW for c2; DEPS keeps the original point.
        store
            .append(run("c2", 2_000, &[(FLOW, 21.0, 1.0)]))
            .await
            .unwrap();
    }

    let store = open(url, DuplicatePolicy::Reject).await;
    let flow_values: Vec<f64> = store
        .query(&flow, None)
        .await
        .map(|p| p.measurement().value)
        .collect();
    assert_eq!(flow_values, vec![10.0, 21.0]);

    let deps_values: Vec<f64> = store
        .query(&SeriesKey::new(SUITE, DEPS), None)
        .await
        .map(|p| p.measurement().value)
        .collect();
    assert_eq!(deps_values, vec![30.0, 40.0]);

    // Reopened store enforces its own policy against replayed history.
    assert!(
        store
            .append(run("c1", 3_000, &[(FLOW, 1.0, 1.0)]))
            .await
            .is_err()
    );
    store
        .append(run("c3", 3_000, &[(FLOW, 30.0, 1.0)]))
        .await
        .unwrap();
    assert_eq!(store.latest(&flow).await.unwrap().commit_id(), "c3");
}

#[tokio::test]
async fn test_sqlite_reopen_preserves_history() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("bench.db").display());
    reopen_preserves_history(&url).await;
}

#[tokio::test]
async fn test_jsonl_reopen_preserves_history() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("jsonl://{}", dir.path().join("logs/history.jsonl").display());
    reopen_preserves_history(&url).await;
}

#[tokio::test]
async fn test_memory_backend_starts_empty() {
    let store = open("memory://", DuplicatePolicy::Reject).await;
    assert_eq!(store.series_count().await, 0);
}
