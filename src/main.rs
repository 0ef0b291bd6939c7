//! benchtrail - benchmark history store with regression detection
//!
//! # Usage
//! ```sh
//! benchtrail ingest run.json --suite Benchmark --fail-on-regression
//! benchtrail import dev/bench/data.js
//! benchtrail export dev/bench/data.js --repo-url https://github.com/owner/repo
//! benchtrail query --suite Benchmark --name "Locations (min)/Flow" --last 20 --csv
//! ```
//!
//! # Environment Variables
//! - `DATABASE_URL` - `sqlite://benchtrail.db` (default), `jsonl://<path>` or `memory://`
//! - `LOG_FORMAT` - `pretty` (default) or `json`
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use benchtrail::application::BenchmarkService;
use benchtrail::application::query::write_cursor_csv;
use benchtrail::config::{Config, LogFormat};
use benchtrail::domain::benchmark::{SeriesKey, TimeRange};
use benchtrail::infrastructure::benchmark_data::{export_benchmark_data, read_benchmark_data};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Benchmark history store with regression detection", long_about = None)]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, store and evaluate one CI run payload
    Ingest {
        /// JSON run payload (`-` for stdin)
        file: PathBuf,

        /// Suite the run belongs to (default: DEFAULT_SUITE)
        #[arg(short, long)]
        suite: Option<String>,

        /// Exit non-zero when any measurement regressed
        #[arg(long)]
        fail_on_regression: bool,
    },
    /// Backfill history from a data.js / data.json file
    Import {
        file: PathBuf,
    },
    /// Write the history as a data.js file for the chart page
    Export {
        out: PathBuf,

        #[arg(long, default_value = "")]
        repo_url: String,
    },
    /// Print one series
    Query {
        #[arg(long)]
        suite: String,

        #[arg(long)]
        name: String,

        /// Inclusive lower bound (RFC 3339 or epoch millis)
        #[arg(long)]
        since: Option<String>,

        /// Inclusive upper bound (RFC 3339 or epoch millis)
        #[arg(long)]
        until: Option<String>,

        /// Only the last N points
        #[arg(long)]
        last: Option<usize>,

        /// CSV instead of JSON lines
        #[arg(long)]
        csv: bool,
    },
    /// List suites and their series counts
    Suites,
    /// Print Prometheus metrics for the store
    Metrics,
}

fn init_logging(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());

    // stdout is reserved for command output.
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .init(),
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ms) = value.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .with_context(|| format!("Timestamp out of range: {}", value));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp (expected RFC 3339 or epoch millis): {}", value))
}

fn read_input(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        io::read_to_string(io::stdin()).context("Failed to read payload from stdin")
    } else {
        fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config = config.with_database_url(url);
    }
    init_logging(config.observability.log_format);

    info!("benchtrail {} starting", env!("CARGO_PKG_VERSION"));
    let service = BenchmarkService::build(&config).await?;

    match cli.command {
        Commands::Ingest {
            file,
            suite,
            fail_on_regression,
        } => {
            let payload = read_input(&file)?;
            let outcome = service.ingest_json(&payload, suite.as_deref()).await?;
            for alert in outcome.report.alerts() {
                println!("{}", serde_json::to_string(&alert)?);
            }
            if fail_on_regression && outcome.report.has_regressions() {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Import { file } => {
            let data = read_benchmark_data(&file)?;
            let applied = service.import_data_file(&data).await?;
            println!("Imported {} runs", applied);
        }
        Commands::Export { out, repo_url } => {
            let runs = export_benchmark_data(service.store(), &repo_url, &out).await?;
            println!("Exported {} runs to {}", runs, out.display());
        }
        Commands::Query {
            suite,
            name,
            since,
            until,
            last,
            csv,
        } => {
            let key = SeriesKey::new(suite, name);
            let range = TimeRange {
                since: since.as_deref().map(parse_instant).transpose()?,
                until: until.as_deref().map(parse_instant).transpose()?,
            };
            let range = (range != TimeRange::default()).then_some(range);

            let cursor = service.store().query(&key, range).await;
            let cursor = match last {
                Some(n) => cursor.tail(n),
                None => cursor,
            };

            if csv {
                write_cursor_csv(cursor, io::stdout())?;
            } else {
                for point in cursor {
                    let m = point.measurement();
                    println!(
                        "{}",
                        serde_json::json!({
                            "timestamp": point.timestamp(),
                            "commit": point.commit_id(),
                            "value": m.value,
                            "range": m.formatted_range(),
                            "unit": m.unit,
                        })
                    );
                }
            }
        }
        Commands::Suites => {
            for suite in service.query().suites().await {
                println!("{}\t{}", suite.suite, suite.series);
            }
        }
        Commands::Metrics => match service.metrics() {
            Some(metrics) => print!("{}", metrics.render()),
            None => info!("Metrics disabled (METRICS_ENABLED=false)"),
        },
    }

    Ok(ExitCode::SUCCESS)
}
