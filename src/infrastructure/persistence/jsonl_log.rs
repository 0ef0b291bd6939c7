use crate::domain::benchmark::Run;
use crate::domain::repositories::{HistoryBackend, StoredRun};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
struct LogRecord {
    seq: i64,
    run: Run,
}

/// Records read back from the log, plus how to repair its tail.
struct Scan {
    records: Vec<LogRecord>,
    repair: Option<TailRepair>,
}

enum TailRepair {
    /// Drop an incomplete final record, keeping this many bytes.
    Truncate(u64),
    /// Final record is whole but its newline never made it to disk.
    Terminate,
}

/// Write position of the log. `len` only ever covers whole, synced records.
struct LogState {
    next_seq: i64,
    len: u64,
}

/// Append-only JSON-lines file: one run per line, fsync'd on every append.
///
/// A failed append truncates the file back to its last committed length,
/// so neither a short write nor a failed sync leaves a record behind.
pub struct JsonlHistoryLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl JsonlHistoryLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create history log directory")?;
        }

        let log = Self {
            path,
            state: Mutex::new(LogState {
                next_seq: 1,
                len: 0,
            }),
        };
        let scan = log.scan().await?;
        if let Some(repair) = scan.repair {
            log.repair_tail(repair).await?;
        }
        let last = scan.records.iter().map(|r| r.seq).max().unwrap_or(0);
        let len = match fs::metadata(&log.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e).context("Failed to stat history log"),
        };
        *log.state.lock().await = LogState {
            next_seq: last + 1,
            len,
        };

        info!(
            "Opened history log: {} ({} records)",
            log.path.display(),
            scan.records.len()
        );
        Ok(log)
    }

    async fn scan(&self) -> Result<Scan> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Scan {
                    records: Vec::new(),
                    repair: None,
                });
            }
            Err(e) => return Err(e).context("Failed to read history log"),
        };

        let terminated = text.is_empty() || text.ends_with('\n');
        let lines: Vec<&str> = text.lines().collect();
        let mut records = Vec::with_capacity(lines.len());
        let mut repair = None;

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let is_last = i + 1 == lines.len();
            match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => {
                    if is_last && !terminated {
                        repair = Some(TailRepair::Terminate);
                    }
                    records.push(record);
                }
                // A torn final line is an append that never completed.
                Err(e) if is_last && !terminated => {
                    warn!(
                        "Dropping incomplete trailing record in {}: {}",
                        self.path.display(),
                        e
                    );
                    let keep = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
                    repair = Some(TailRepair::Truncate(keep as u64));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Corrupt record on line {} of {}", i + 1, self.path.display())
                    });
                }
            }
        }
        Ok(Scan { records, repair })
    }

    async fn repair_tail(&self, repair: TailRepair) -> Result<()> {
        let mut file = match repair {
            TailRepair::Truncate(len) => {
                let file = OpenOptions::new()
                    .write(true)
                    .open(&self.path)
                    .await
                    .context("Failed to open history log for repair")?;
                file.set_len(len)
                    .await
                    .context("Failed to truncate history log")?;
                file
            }
            TailRepair::Terminate => {
                let mut file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .await
                    .context("Failed to open history log for repair")?;
                file.write_all(b"\n")
                    .await
                    .context("Failed to terminate history log")?;
                file
            }
        };
        file.flush().await?;
        file.sync_all().await.context("Failed to sync history log")?;
        Ok(())
    }

    /// Write and sync `line` at `offset`, the committed end of the log.
    async fn write_record(file: &mut File, offset: u64, line: &[u8]) -> Result<()> {
        file.seek(SeekFrom::Start(offset))
            .await
            .context("Failed to seek history log")?;
        file.write_all(line)
            .await
            .context("Failed to write history log")?;
        file.flush().await.context("Failed to flush history log")?;
        file.sync_all().await.context("Failed to sync history log")?;
        Ok(())
    }

    /// Cut the file back to `len` after a failed append.
    async fn rollback(file: &File, len: u64) -> Result<()> {
        file.set_len(len)
            .await
            .context("Failed to truncate history log")?;
        file.sync_all().await.context("Failed to sync history log")?;
        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for JsonlHistoryLog {
    async fn append(&self, run: &Run) -> Result<i64> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;

        let mut line = serde_json::to_string(&LogRecord {
            seq,
            run: run.clone(),
        })
        .context("Failed to encode run")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .await
            .context("Failed to open history log")?;

        // Bytes past the committed length belong to an append that failed.
        let on_disk = file
            .metadata()
            .await
            .context("Failed to stat history log")?
            .len();
        if on_disk > state.len {
            warn!(
                "Discarding {} uncommitted bytes in {}",
                on_disk - state.len,
                self.path.display()
            );
            Self::rollback(&file, state.len).await?;
        }

        if let Err(e) = Self::write_record(&mut file, state.len, line.as_bytes()).await {
            if let Err(undo) = Self::rollback(&file, state.len).await {
                warn!(
                    "Failed to roll back {} after a failed append: {:#}",
                    self.path.display(),
                    undo
                );
            }
            return Err(e);
        }

        state.len += line.len() as u64;
        state.next_seq = seq + 1;
        Ok(seq)
    }

    async fn load(&self) -> Result<Vec<StoredRun>> {
        Ok(self
            .scan()
            .await?
            .records
            .into_iter()
            .map(|r| StoredRun {
                seq: r.seq,
                run: r.run,
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }
}
