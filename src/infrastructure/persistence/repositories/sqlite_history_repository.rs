use crate::domain::benchmark::{CommitRef, Measurement, Run};
use crate::domain::repositories::{HistoryBackend, StoredRun};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::TryStreamExt;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryBackend for SqliteHistoryRepository {
    async fn append(&self, run: &Run) -> Result<i64> {
        let commit_json =
            serde_json::to_string(&run.commit).context("Failed to encode commit metadata")?;

        // Run row and measurement rows commit together or not at all.
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO runs (suite, tool, commit_id, commit_json, timestamp_ms)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.suite)
        .bind(&run.tool)
        .bind(&run.commit.id)
        .bind(&commit_json)
        .bind(run.timestamp.timestamp_millis())
        .execute(&mut *tx)
        .await
        .context("Failed to save run")?;
        let seq = result.last_insert_rowid();

        for (position, m) in run.measurements.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO measurements (run_seq, position, suite, name, value, delta, unit)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(seq)
            .bind(position as i64)
            .bind(&run.suite)
            .bind(&m.name)
            .bind(m.value)
            .bind(m.delta)
            .bind(&m.unit)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to save measurement '{}'", m.name))?;
        }

        tx.commit().await.context("Failed to commit run")?;
        debug!("Persisted run seq {} ({} measurements)", seq, run.measurements.len());
        Ok(seq)
    }

    async fn load(&self) -> Result<Vec<StoredRun>> {
        let mut measurements: HashMap<i64, Vec<Measurement>> = HashMap::new();
        let mut rows = sqlx::query(
            "SELECT run_seq, name, value, delta, unit FROM measurements ORDER BY run_seq ASC, position ASC",
        )
        .fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            let seq: i64 = row.try_get("run_seq")?;
            measurements.entry(seq).or_default().push(Measurement {
                name: row.try_get("name")?,
                value: row.try_get("value")?,
                delta: row.try_get("delta")?,
                unit: row.try_get("unit")?,
            });
        }
        drop(rows);

        let rows = sqlx::query(
            "SELECT seq, suite, tool, commit_json, timestamp_ms FROM runs ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let seq: i64 = row.try_get("seq")?;
            let commit_json: String = row.try_get("commit_json")?;
            let commit: CommitRef = serde_json::from_str(&commit_json)
                .with_context(|| format!("Corrupt commit metadata in run {}", seq))?;
            let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
            let timestamp = Utc
                .timestamp_millis_opt(timestamp_ms)
                .single()
                .with_context(|| format!("Invalid timestamp {} in run {}", timestamp_ms, seq))?;

            runs.push(StoredRun {
                seq,
                run: Run {
                    suite: row.try_get("suite")?,
                    tool: row.try_get("tool")?,
                    commit,
                    timestamp,
                    measurements: measurements.remove(&seq).unwrap_or_default(),
                },
            });
        }
        Ok(runs)
    }

    fn describe(&self) -> String {
        "sqlite".to_string()
    }
}
