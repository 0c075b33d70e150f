//! Schedulable unit of work and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Unique, monotonically increasing task identifier.
///
/// Ids are assigned by the orchestrator from an atomic counter, so a
/// later-submitted task always has a larger id than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling priority. The derived `Ord` follows declaration order, so
/// `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Task lifecycle states.
///
/// `Pending` and `Running` are live; the other four are terminal and
/// immutable. Every transition method on [`Task`] refuses to move a
/// task out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::TimedOut
                | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed_out",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// One unit of scheduled work, dispatched to a named worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub worker: String,
    pub payload: String,
    pub priority: TaskPriority,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_count: u32,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with default priority, a 30s timeout and no
    /// retry budget. The orchestrator overrides these from its config.
    pub fn new(id: TaskId, worker: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id,
            worker: worker.into(),
            payload: payload.into(),
            priority: TaskPriority::default(),
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_count: 0,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark the task as running. Returns `false` if the task is not
    /// pending.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Spend one unit of retry budget. Returns `false` when the budget
    /// is exhausted or the task is terminal; the caller must then move
    /// the task to its terminal state instead.
    pub fn spend_retry(&mut self) -> bool {
        if self.status.is_terminal() || self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        true
    }

    /// Transition to `Completed` with the worker's result.
    pub fn complete(&mut self, result: impl Into<String>) -> bool {
        self.finish(TaskStatus::Completed, Some(result.into()), None)
    }

    /// Transition to `Failed` with the final error.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.finish(TaskStatus::Failed, None, Some(error.into()))
    }

    /// Transition to `TimedOut` with the final error.
    pub fn time_out(&mut self, error: impl Into<String>) -> bool {
        self.finish(TaskStatus::TimedOut, None, Some(error.into()))
    }

    /// Transition a pending task to `Cancelled`. Running tasks are not
    /// preempted and terminal tasks are immutable.
    pub fn cancel(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.finish(TaskStatus::Cancelled, None, None)
    }

    fn finish(
        &mut self,
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.result = result;
        self.error = error;
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId::new(1), "writer", "draft a note")
    }

    #[test]
    fn priorities_order_low_to_critical() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
    }

    #[test]
    fn lifecycle_pending_running_completed() {
        let mut t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.start());
        assert_eq!(t.status, TaskStatus::Running);
        assert!(t.started_at.is_some());
        assert!(t.complete("done"));
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.result.as_deref(), Some("done"));
        assert!(t.completed_at.is_some());
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut t = task();
        t.start();
        t.fail("boom");
        assert!(!t.complete("late"));
        assert!(!t.cancel());
        assert!(!t.start());
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("boom"));
        assert!(t.result.is_none());
    }

    #[test]
    fn retry_budget_is_bounded() {
        let mut t = task().with_max_retries(2);
        t.start();
        assert!(t.spend_retry());
        assert!(t.spend_retry());
        assert!(!t.spend_retry());
        assert_eq!(t.retry_count, 2);
    }

    #[test]
    fn cancel_only_affects_pending_tasks() {
        let mut pending = task();
        assert!(pending.cancel());
        assert_eq!(pending.status, TaskStatus::Cancelled);

        let mut running = task();
        running.start();
        assert!(!running.cancel());
        assert_eq!(running.status, TaskStatus::Running);
    }
}
