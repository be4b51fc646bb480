//! Persistence of run results.
//!
//! Results are append-only per run id: a sink never overwrites an existing run,
//! and hourly rows are written only for runs that produced a plan.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{HourlyRecord, RunSummary, SummaryRecord};

pub mod json;

pub use json::JsonFileSink;

#[async_trait]
pub trait RunSink: Send + Sync {
    async fn persist(&self, summary: &RunSummary) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct StoredRun {
    pub summary: SummaryRecord,
    pub hourly: Vec<HourlyRecord>,
}

/// In-memory sink for tests and dashboards.
#[derive(Debug, Default)]
pub struct MemorySink {
    runs: Mutex<HashMap<Uuid, StoredRun>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: Uuid) -> Option<StoredRun> {
        self.runs.lock().get(&run_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }
}

#[async_trait]
impl RunSink for MemorySink {
    async fn persist(&self, summary: &RunSummary) -> Result<()> {
        let mut runs = self.runs.lock();
        if runs.contains_key(&summary.run_id) {
            anyhow::bail!("run {} already persisted", summary.run_id);
        }
        let hourly = if summary.optimization_status.is_success() {
            summary.hourly_records()
        } else {
            Vec::new()
        };
        runs.insert(summary.run_id, StoredRun { summary: summary.summary_record(), hourly });
        Ok(())
    }
}
