//! Error taxonomy for task scheduling, tool execution and workflows.
//!
//! Errors in this workspace never cross the queue or registry boundary as
//! `Err` values for batch operations; they are folded into `Task::error`
//! or `ToolResult::error` so that batch calls always produce a full
//! result list. The types here exist for the paths where a structured
//! error is the natural return value.

use crate::task::TaskId;

/// Errors produced while driving a task through the orchestrator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// No worker with the requested name is registered. Terminal, never
    /// retried.
    #[error("worker '{name}' is not registered")]
    WorkerNotFound { name: String },

    /// The worker did not finish within the task deadline.
    #[error("task {id} timed out after {timeout_ms}ms")]
    Timeout { id: TaskId, timeout_ms: u64 },

    /// The worker itself reported a failure.
    #[error("worker '{worker}' failed: {reason}")]
    ExecutionFailed { worker: String, reason: String },
}

impl TaskError {
    /// Whether the orchestrator may spend retry budget on this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::Timeout { .. } | TaskError::ExecutionFailed { .. }
        )
    }
}

/// Errors produced by the tool execution pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Tool (or alias) is not present in the registry. Terminal.
    #[error("tool '{name}' not found in registry")]
    NotFound { name: String },

    /// Tool exists but has been disabled. Terminal, no retry.
    #[error("tool '{name}' is disabled")]
    Disabled { name: String },

    /// Parameters failed schema validation. Terminal, not retried and
    /// never cached.
    #[error("invalid parameters for tool '{tool}': {reason}")]
    Validation { tool: String, reason: String },

    /// The tool function did not finish within its per-call deadline.
    #[error("tool '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// The tool function reported a failure.
    #[error("tool '{name}' execution failed: {reason}")]
    Execution { name: String, reason: String },
}

impl ToolError {
    /// Whether the registry may spend retry budget on this error.
    ///
    /// Only transient failures (timeouts and execution errors) are
    /// retryable; lookup, status and validation failures short-circuit.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolError::Timeout { .. } | ToolError::Execution { .. }
        )
    }
}

/// Structural errors detected when a workflow definition is built.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow '{name}' has no steps")]
    EmptyWorkflow { name: String },

    /// A step names a dependency index that does not exist.
    #[error("workflow '{name}': step {step} depends on unknown step {dependency}")]
    UnknownDependency {
        name: String,
        step: usize,
        dependency: usize,
    },

    /// The dependency graph contains a cycle, so some steps can never
    /// become ready.
    #[error("workflow '{name}' has a dependency cycle involving step {step}")]
    DependencyCycle { name: String, step: usize },
}

/// Opaque failure reported by a [`Worker`](crate::worker::Worker)
/// implementation. Workers are external collaborators; the orchestrator
/// makes no assumption about the failure beyond its message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct WorkerError {
    pub reason: String,
}

impl WorkerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Opaque failure reported by user-supplied capability code: tool
/// functions, pre/post hooks and completion listeners.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct CapabilityError {
    pub reason: String,
}

impl CapabilityError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
