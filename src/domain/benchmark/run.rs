use crate::domain::benchmark::measurement::Measurement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author or committer identity as reported by the VCS provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Commit identity a run was measured against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    /// Full commit hash.
    pub id: String,
    pub message: String,
    pub url: String,
    pub author: Person,
    pub committer: Person,
    /// `false` when the commit was batch-pushed together with others.
    pub distinct: bool,
    /// Commit time as reported by the VCS (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
}

impl CommitRef {
    /// First line of the commit message.
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// One CI execution of a benchmark suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Suite the run belongs to (the key under `entries` in the data file).
    pub suite: String,
    /// Benchmark tool that produced the run, e.g. `cargo`.
    pub tool: String,
    pub commit: CommitRef,
    pub timestamp: DateTime<Utc>,
    pub measurements: Vec<Measurement>,
}
