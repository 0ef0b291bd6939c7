use crate::application::history_store::{AppendReceipt, DuplicatePolicy, HistoryStore};
use crate::application::ingest::payload::parse_range;
use crate::domain::benchmark::{CommitRef, Measurement, Person, Run};
use crate::domain::errors::{IngestError, ValidationError};
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Units accepted when no explicit list is configured.
pub const DEFAULT_UNITS: &[&str] = &["ns/iter", "ns", "us", "ms", "s", "ops/s", "bytes"];

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Suite used when the caller does not name one.
    pub default_suite: String,
    pub allowed_units: BTreeSet<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            default_suite: "Benchmark".to_string(),
            allowed_units: DEFAULT_UNITS.iter().map(|u| u.to_string()).collect(),
        }
    }
}

/// Validates raw CI payloads and appends them to the history store.
///
/// A payload is either fully valid and appended as one run, or rejected with
/// the first offending field; nothing is applied partially.
pub struct Ingestor {
    store: Arc<HistoryStore>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(store: Arc<HistoryStore>, settings: IngestSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Decode, validate and append one JSON run payload.
    pub async fn ingest_json(
        &self,
        payload: &str,
        suite: Option<&str>,
    ) -> Result<AppendReceipt, IngestError> {
        let value: Value = serde_json::from_str(payload)?;
        self.ingest_value(&value, suite, None).await
    }

    /// Validate and append an already-decoded payload. `policy` overrides the
    /// store's duplicate policy for this call.
    pub async fn ingest_value(
        &self,
        value: &Value,
        suite: Option<&str>,
        policy: Option<DuplicatePolicy>,
    ) -> Result<AppendReceipt, IngestError> {
        let suite = suite.unwrap_or(&self.settings.default_suite);
        let run = match self.parse_run(value, suite) {
            Ok(run) => run,
            Err(e) => {
                warn!("Rejected payload for suite {}: {}", suite, e);
                return Err(e.into());
            }
        };

        let policy = policy.unwrap_or(self.store.duplicate_policy());
        let receipt = self.store.append_with_policy(run, policy).await?;
        info!(
            "Ingested {} measurements for commit {} ({})",
            receipt.run.measurements.len(),
            receipt.run.commit.short_id(),
            suite
        );
        Ok(receipt)
    }

    /// Turn a raw payload into a [`Run`], checking schema conformance,
    /// non-negative values and known units.
    pub fn parse_run(&self, value: &Value, suite: &str) -> Result<Run, ValidationError> {
        if suite.trim().is_empty() {
            return Err(ValidationError::new("suite", "must not be empty"));
        }
        let root = as_object(value, "$")?;

        let commit = parse_commit(object_field(root, "commit", "commit")?)?;

        let date = root
            .get("date")
            .ok_or_else(|| ValidationError::new("date", "missing"))?
            .as_i64()
            .ok_or_else(|| ValidationError::new("date", "expected integer epoch milliseconds"))?;
        if date < 0 {
            return Err(ValidationError::new("date", "must not be negative"));
        }
        let timestamp = Utc
            .timestamp_millis_opt(date)
            .single()
            .ok_or_else(|| ValidationError::new("date", "out of range"))?;

        let tool = string_field(root, "tool", "tool")?;
        if tool.trim().is_empty() {
            return Err(ValidationError::new("tool", "must not be empty"));
        }

        let benches = root
            .get("benches")
            .ok_or_else(|| ValidationError::new("benches", "missing"))?
            .as_array()
            .ok_or_else(|| ValidationError::new("benches", "expected array"))?;
        if benches.is_empty() {
            return Err(ValidationError::new("benches", "must contain at least one benchmark"));
        }

        let mut seen = HashSet::new();
        let mut measurements = Vec::with_capacity(benches.len());
        for (i, bench) in benches.iter().enumerate() {
            let m = self.parse_bench(bench, &format!("benches[{}]", i))?;
            if !seen.insert(m.name.clone()) {
                return Err(ValidationError::new(
                    format!("benches[{}].name", i),
                    format!("'{}' reported twice in one run", m.name),
                ));
            }
            measurements.push(m);
        }

        Ok(Run {
            suite: suite.to_string(),
            tool,
            commit,
            timestamp,
            measurements,
        })
    }

    fn parse_bench(&self, value: &Value, path: &str) -> Result<Measurement, ValidationError> {
        let bench = as_object(value, path)?;

        let name = string_field(bench, "name", &format!("{}.name", path))?;
        if name.trim().is_empty() {
            return Err(ValidationError::new(format!("{}.name", path), "must not be empty"));
        }

        let value_path = format!("{}.value", path);
        let value = bench
            .get("value")
            .ok_or_else(|| ValidationError::new(&value_path, "missing"))?
            .as_f64()
            .ok_or_else(|| ValidationError::new(&value_path, "expected number"))?;
        if !value.is_finite() {
            return Err(ValidationError::new(&value_path, "must be finite"));
        }
        if value < 0.0 {
            return Err(ValidationError::new(&value_path, "must not be negative"));
        }

        let range_path = format!("{}.range", path);
        let delta = match bench.get("range") {
            Some(Value::String(range)) => parse_range(range).ok_or_else(|| {
                ValidationError::new(&range_path, format!("expected '± <number>', got '{}'", range))
            })?,
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ValidationError::new(&range_path, "expected number"))?,
            Some(_) => return Err(ValidationError::new(&range_path, "expected '± <number>'")),
            None => return Err(ValidationError::new(&range_path, "missing")),
        };
        if delta < 0.0 {
            return Err(ValidationError::new(&range_path, "must not be negative"));
        }

        let unit_path = format!("{}.unit", path);
        let unit = string_field(bench, "unit", &unit_path)?;
        if !self.settings.allowed_units.contains(&unit) {
            return Err(ValidationError::new(&unit_path, format!("unknown unit '{}'", unit)));
        }

        Ok(Measurement {
            name,
            value,
            delta,
            unit,
        })
    }
}

fn parse_commit(commit: &Map<String, Value>) -> Result<CommitRef, ValidationError> {
    let id = string_field(commit, "id", "commit.id")?;
    if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("commit.id", "expected a commit hash"));
    }

    let distinct = commit
        .get("distinct")
        .ok_or_else(|| ValidationError::new("commit.distinct", "missing"))?
        .as_bool()
        .ok_or_else(|| ValidationError::new("commit.distinct", "expected boolean"))?;

    Ok(CommitRef {
        id,
        message: string_field(commit, "message", "commit.message")?,
        url: string_field(commit, "url", "commit.url")?,
        author: parse_person(object_field(commit, "author", "commit.author")?, "commit.author")?,
        committer: parse_person(
            object_field(commit, "committer", "commit.committer")?,
            "commit.committer",
        )?,
        distinct,
        timestamp: optional_string(commit, "timestamp", "commit.timestamp")?,
        tree_id: optional_string(commit, "tree_id", "commit.tree_id")?,
    })
}

fn parse_person(person: &Map<String, Value>, path: &str) -> Result<Person, ValidationError> {
    Ok(Person {
        name: string_field(person, "name", &format!("{}.name", path))?,
        email: optional_string(person, "email", &format!("{}.email", path))?.unwrap_or_default(),
        username: optional_string(person, "username", &format!("{}.username", path))?,
    })
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::new(path, "expected object"))
}

fn object_field<'a>(
    obj: &'a Map<String, Value>,
    name: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    as_object(
        obj.get(name)
            .ok_or_else(|| ValidationError::new(path, "missing"))?,
        path,
    )
}

fn string_field(obj: &Map<String, Value>, name: &str, path: &str) -> Result<String, ValidationError> {
    obj.get(name)
        .ok_or_else(|| ValidationError::new(path, "missing"))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::new(path, "expected string"))
}

fn optional_string(
    obj: &Map<String, Value>,
    name: &str,
    path: &str,
) -> Result<Option<String>, ValidationError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(path, "expected string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryHistoryBackend;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "commit": {
                "author": { "email": "dev@example.com", "name": "Dev", "username": "dev" },
                "committer": { "email": "noreply@github.com", "name": "GitHub", "username": "web-flow" },
                "distinct": true,
                "id": "ad9b274d2581010f09a1831498d371269d03367a",
                "message": "Fix bench results",
                "timestamp": "2022-05-24T20:09:51-07:00",
                "tree_id": "ecf3c2149a7af5e3c4fda938ffce84b186383e14",
                "url": "https://example.com/commit/ad9b274"
            },
            "date": 1653449030827i64,
            "tool": "cargo",
            "benches": [
                { "name": "Locations (min)/Flow", "value": 188483, "range": "± 253", "unit": "ns/iter" },
                { "name": "Locations (min)/Flow + Deps", "value": 199393, "range": "± 512", "unit": "ns/iter" }
            ]
        })
    }

    async fn ingestor() -> Ingestor {
        let store = HistoryStore::open(Arc::new(InMemoryHistoryBackend::new()), DuplicatePolicy::Reject)
            .await
            .unwrap();
        Ingestor::new(Arc::new(store), IngestSettings::default())
    }

    #[tokio::test]
    async fn test_parse_valid_payload() {
        let ingestor = ingestor().await;
        let run = ingestor.parse_run(&payload(), "Benchmark").unwrap();

        assert_eq!(run.tool, "cargo");
        assert_eq!(run.timestamp.timestamp_millis(), 1653449030827);
        assert_eq!(run.commit.committer.username.as_deref(), Some("web-flow"));
        assert_eq!(run.measurements.len(), 2);
        assert_eq!(run.measurements[0].delta, 253.0);
    }

    #[tokio::test]
    async fn test_first_offending_field_is_reported() {
        let ingestor = ingestor().await;

        let mut bad = payload();
        bad["benches"][1]["range"] = json!("about 5");
        bad["benches"][1]["unit"] = json!("furlongs");
        let err = ingestor.parse_run(&bad, "Benchmark").unwrap_err();
        assert_eq!(err.field, "benches[1].range");

        let mut negative = payload();
        negative["benches"][0]["value"] = json!(-3);
        let err = ingestor.parse_run(&negative, "Benchmark").unwrap_err();
        assert_eq!(err.field, "benches[0].value");

        let mut unknown_unit = payload();
        unknown_unit["benches"][0]["unit"] = json!("furlongs");
        let err = ingestor.parse_run(&unknown_unit, "Benchmark").unwrap_err();
        assert_eq!(err.field, "benches[0].unit");

        let mut no_commit = payload();
        no_commit["commit"]["id"] = json!("");
        let err = ingestor.parse_run(&no_commit, "Benchmark").unwrap_err();
        assert_eq!(err.field, "commit.id");
    }

    #[tokio::test]
    async fn test_repeated_bench_name_rejected() {
        let ingestor = ingestor().await;
        let mut bad = payload();
        bad["benches"][1]["name"] = json!("Locations (min)/Flow");

        let err = ingestor.parse_run(&bad, "Benchmark").unwrap_err();
        assert_eq!(err.field, "benches[1].name");
    }

    #[tokio::test]
    async fn test_invalid_payload_appends_nothing() {
        let ingestor = ingestor().await;
        let mut bad = payload();
        bad["benches"][1]["value"] = json!("fast");

        let err = ingestor.ingest_value(&bad, None, None).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        assert_eq!(ingestor.store().series_count().await, 0);
    }

    #[tokio::test]
    async fn test_ingest_json_appends_under_default_suite() {
        let ingestor = ingestor().await;
        let receipt = ingestor
            .ingest_json(&payload().to_string(), None)
            .await
            .unwrap();

        assert_eq!(receipt.series_touched, 2);
        assert_eq!(receipt.run.suite, "Benchmark");
        assert_eq!(ingestor.store().keys().await.len(), 2);
    }

    #[tokio::test]
    async fn test_not_json_is_decode_error() {
        let ingestor = ingestor().await;
        let err = ingestor.ingest_json("window.BENCHMARK_DATA", None).await.unwrap_err();
        assert_eq!(err.reason(), "decode");
    }
}
