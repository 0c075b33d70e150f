//! Best-effort JSON persistence: the task journal and tool stats
//! snapshots.
//!
//! The journal is an append-only JSONL file (one summary line per
//! terminal task), so each append is O(1) instead of rewriting the whole
//! history. `load` returns the newest entries up to the configured
//! limit; `compact` rewrites the file down to that cap. None of this is
//! authoritative state.

use chrono::{DateTime, Utc};
use maestro_core::{Task, TaskStatus};
use maestro_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Payload characters retained in a journal line.
const PAYLOAD_PREVIEW_LEN: usize = 120;

/// Compact, human-greppable record of one terminal task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: u64,
    pub worker: String,
    /// Truncated to the first 120 characters.
    pub payload: String,
    pub status: TaskStatus,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        let payload = if task.payload.chars().count() > PAYLOAD_PREVIEW_LEN {
            task.payload.chars().take(PAYLOAD_PREVIEW_LEN).collect()
        } else {
            task.payload.clone()
        };
        Self {
            id: task.id.as_u64(),
            worker: task.worker.clone(),
            payload,
            status: task.status,
            retry_count: task.retry_count,
            error: task.error.clone(),
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// Append-only task journal capped (on read and compaction) to the
/// newest `limit` entries.
#[derive(Debug, Clone)]
pub struct TaskJournal {
    path: PathBuf,
    limit: usize,
}

impl TaskJournal {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one terminal task as a JSON line.
    pub fn append(&self, task: &Task) -> io::Result<()> {
        let summary = TaskSummary::from(task);
        let line = serde_json::to_string(&summary).map_err(io::Error::other)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Read the newest `limit` summaries, oldest first. A missing file
    /// is an empty journal; unparseable lines are skipped with a
    /// warning.
    pub fn load(&self) -> io::Result<Vec<TaskSummary>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut summaries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TaskSummary>(&line) {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    warn!(journal = %self.path.display(), error = %err, "skipping malformed journal line");
                }
            }
        }
        if summaries.len() > self.limit {
            summaries.drain(..summaries.len() - self.limit);
        }
        Ok(summaries)
    }

    /// Rewrite the file down to the newest `limit` entries.
    pub fn compact(&self) -> io::Result<()> {
        let summaries = self.load()?;
        let mut out = String::new();
        for summary in &summaries {
            let line = serde_json::to_string(summary).map_err(io::Error::other)?;
            out.push_str(&line);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
    }
}

/// Write a JSON snapshot of the tool catalog, metrics, cache and history
/// sizes. Write-on-demand; the registry itself stays authoritative.
pub fn write_tool_stats(registry: &ToolRegistry, path: &Path) -> io::Result<()> {
    let stats = registry.stats();
    let json = serde_json::to_vec_pretty(&stats).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
