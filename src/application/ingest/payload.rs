//! Wire shape of one run as emitted by the CI benchmark action.
//!
//! ```json
//! { "commit": { ... }, "date": 1653449030827, "tool": "cargo",
//!   "benches": [ { "name": "Locations (min)/Flow", "value": 188483,
//!                  "range": "± 253", "unit": "ns/iter" } ] }
//! ```
//!
//! Decoding goes through [`super::Ingestor`], which validates field by
//! field; these types are used to write the same shape back out.

use crate::domain::benchmark::{CommitRef, Measurement, Person, Run};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPerson {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommit {
    pub author: RawPerson,
    pub committer: RawPerson,
    pub distinct: bool,
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBench {
    pub name: String,
    pub value: f64,
    /// `"± <number>"`
    pub range: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRun {
    pub commit: RawCommit,
    /// Epoch milliseconds.
    pub date: i64,
    pub tool: String,
    pub benches: Vec<RawBench>,
}

impl From<&Person> for RawPerson {
    fn from(person: &Person) -> Self {
        Self {
            email: person.email.clone(),
            name: person.name.clone(),
            username: person.username.clone(),
        }
    }
}

impl From<&CommitRef> for RawCommit {
    fn from(commit: &CommitRef) -> Self {
        Self {
            author: RawPerson::from(&commit.author),
            committer: RawPerson::from(&commit.committer),
            distinct: commit.distinct,
            id: commit.id.clone(),
            message: commit.message.clone(),
            timestamp: commit.timestamp.clone(),
            tree_id: commit.tree_id.clone(),
            url: commit.url.clone(),
        }
    }
}

impl From<&Measurement> for RawBench {
    fn from(m: &Measurement) -> Self {
        Self {
            name: m.name.clone(),
            value: m.value,
            range: m.formatted_range(),
            unit: m.unit.clone(),
        }
    }
}

impl RawRun {
    /// Wire form of `run` restricted to `measurements`.
    pub fn from_run<'a>(run: &Run, measurements: impl IntoIterator<Item = &'a Measurement>) -> Self {
        Self {
            commit: RawCommit::from(&run.commit),
            date: run.timestamp.timestamp_millis(),
            tool: run.tool.clone(),
            benches: measurements.into_iter().map(RawBench::from).collect(),
        }
    }
}

/// Parse `"± 253"` (also `"+/- 253"`, `"±253"` or a bare number) into a delta.
pub fn parse_range(range: &str) -> Option<f64> {
    let trimmed = range.trim();
    let number = trimmed
        .strip_prefix('±')
        .or_else(|| trimmed.strip_prefix("+/-"))
        .unwrap_or(trimmed)
        .trim();
    let delta: f64 = number.parse().ok()?;
    if delta.is_finite() { Some(delta) } else { None }
}
