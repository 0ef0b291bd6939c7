#![allow(dead_code)]

use benchtrail::application::history_store::{DuplicatePolicy, HistoryStore};
use benchtrail::domain::benchmark::{CommitRef, Measurement, Person, Run};
use benchtrail::infrastructure::InMemoryHistoryBackend;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::Arc;

pub const SUITE: &str = "Benchmark";
pub const FLOW: &str = "Locations (min)/Flow";
pub const DEPS: &str = "Locations (min)/Flow + Deps";

pub fn commit(id: &str) -> CommitRef {
    let person = Person {
        name: "Dev".to_string(),
        email: "dev@example.com".to_string(),
        username: Some("dev".to_string()),
    };
    CommitRef {
        id: id.to_string(),
        message: format!("Commit {}", id),
        url: format!("https://github.com/owner/repo/commit/{}", id),
        author: person.clone(),
        committer: person,
        distinct: true,
        timestamp: None,
        tree_id: None,
    }
}

pub fn run(id: &str, ts_ms: i64, benches: &[(&str, f64, f64)]) -> Run {
    Run {
        suite: SUITE.to_string(),
        tool: "cargo".to_string(),
        commit: commit(id),
        timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
        measurements: benches
            .iter()
            .map(|(name, value, delta)| Measurement::new(*name, *value, *delta, "ns/iter"))
            .collect(),
    }
}

pub fn payload(id: &str, date: i64, benches: &[(&str, f64, &str)]) -> Value {
    json!({
        "commit": {
            "author": { "email": "dev@example.com", "name": "Dev", "username": "dev" },
            "committer": { "email": "noreply@github.com", "name": "GitHub", "username": "web-flow" },
            "distinct": true,
            "id": id,
            "message": format!("Commit {}", id),
            "timestamp": "2022-05-24T20:09:51-07:00",
            "tree_id": "ecf3c2149a7af5e3c4fda938ffce84b186383e14",
            "url": format!("https://github.com/owner/repo/commit/{}", id)
        },
        "date": date,
        "tool": "cargo",
        "benches": benches
            .iter()
            .map(|(name, value, range)| json!({
                "name": name,
                "value": value,
                "range": range,
                "unit": "ns/iter"
            }))
            .collect::<Vec<_>>()
    })
}

pub async fn memory_store(policy: DuplicatePolicy) -> HistoryStore {
    HistoryStore::open(Arc::new(InMemoryHistoryBackend::new()), policy)
        .await
        .unwrap()
}
