use anyhow::{Context, Result};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// SQLite connection pool with the benchmark history schema applied.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let in_memory = db_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Commits must survive a crash before append returns.
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` is its own database.
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Runs: one row per appended run, in append order
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                suite TEXT NOT NULL,
                tool TEXT NOT NULL,
                commit_id TEXT NOT NULL,
                commit_json TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                ingested_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create runs table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_runs_suite_time
            ON runs (suite, timestamp_ms);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create runs index")?;

        // 2. Measurements: one row per (series key, run, measurement)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS measurements (
                run_seq INTEGER NOT NULL REFERENCES runs (seq),
                position INTEGER NOT NULL,
                suite TEXT NOT NULL,
                name TEXT NOT NULL,
                value REAL NOT NULL,
                delta REAL NOT NULL,
                unit TEXT NOT NULL,
                PRIMARY KEY (run_seq, position)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create measurements table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_measurements_series
            ON measurements (suite, name, run_seq);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create measurements index")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
