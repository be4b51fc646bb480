use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::RunSink;
use crate::domain::RunSummary;

/// Writes each run to `<dir>/<run_id>/`: `summary.json`, plus `hourly.jsonl` on success.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn run_dir(&self, run_id: uuid::Uuid) -> PathBuf {
        self.dir.join(run_id.to_string())
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("refusing to overwrite {}", path.display()))?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl RunSink for JsonFileSink {
    async fn persist(&self, summary: &RunSummary) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating output dir {}", self.dir.display()))?;
        let run_dir = self.run_dir(summary.run_id);
        fs::create_dir(&run_dir)
            .await
            .with_context(|| format!("run {} already persisted", summary.run_id))?;

        let record = serde_json::to_vec_pretty(&summary.summary_record()).context("serializing summary")?;
        write_new(&run_dir.join("summary.json"), &record).await?;

        let mut rows = 0;
        if summary.optimization_status.is_success() {
            let mut lines = Vec::new();
            for row in summary.hourly_records() {
                serde_json::to_writer(&mut lines, &row).context("serializing hourly row")?;
                lines.push(b'\n');
                rows += 1;
            }
            write_new(&run_dir.join("hourly.jsonl"), &lines).await?;
        }

        info!(run_id = %summary.run_id, rows, dir = %run_dir.display(), "Run persisted");
        Ok(())
    }
}
