//! Capped append log of tool invocations.

use chrono::{DateTime, Utc};
use maestro_core::{JsonMap, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One recorded invocation.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub tool: String,
    pub parameters: JsonMap,
    pub result: ToolResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(tool: impl Into<String>, parameters: JsonMap, result: ToolResult) -> Self {
        Self {
            tool: tool.into(),
            parameters,
            result,
            caller: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_caller(mut self, caller: Option<String>) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Append-only invocation log capped to the newest `capacity` entries;
/// the oldest entry is silently dropped on overflow.
#[derive(Debug)]
pub struct ToolHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl Default for ToolHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ToolHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The newest `count` entries, most recent first.
    pub fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        let entries = self.lock();
        entries.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
