//! # Maestro
//!
//! Maestro is an agent task orchestration and tool execution engine. It
//! pairs a priority task queue with bounded-concurrency dispatch and a
//! dependency-resolved workflow runner, and its tool-invocation layer
//! provides parameter validation, TTL caching, retry-with-backoff and
//! per-tool observability.
//!
//! ## Core Components
//!
//! - **[`Orchestrator`]**: top-level scheduler owning the worker
//!   registry and the priority queue, with `process_queue`, `pipeline`,
//!   `parallel` and `run_workflow` execution modes
//! - **[`Worker`]**: the opaque executor contract a task is dispatched to
//! - **[`Workflow`]**: a DAG of steps with variable propagation,
//!   validated at definition time
//! - **[`ToolRegistry`]**: catalog + execution pipeline (validate →
//!   cache → run → retry → record) for [`Tool`]s
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use maestro::{Orchestrator, TaskSpec, Worker, WorkerError};
//! use std::sync::Arc;
//!
//! struct EchoWorker;
//!
//! #[async_trait]
//! impl Worker for EchoWorker {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn run(&self, payload: &str) -> Result<String, WorkerError> {
//!         Ok(payload.to_string())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let orchestrator = Orchestrator::new();
//! orchestrator.register_worker(Arc::new(EchoWorker));
//! orchestrator.queue_task(TaskSpec::new("echo", "hello"));
//! let done = orchestrator.drain().await;
//! assert_eq!(done[0].result.as_deref(), Some("hello"));
//! # }
//! ```

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use maestro_core as core;
pub use maestro_runtime as runtime;
pub use maestro_tools as tools;

// ============================================================================
// Flat re-exports of the public surface
// ============================================================================

pub use maestro_core::{
    Capability, CapabilityError, FnCapability, JsonMap, ParamSpec, ParamType, ParameterSchema,
    SchemaViolation, Task, TaskError, TaskId, TaskPriority, TaskQueue, TaskStatus, Tool,
    ToolError, ToolResult, ToolStatus, Worker, WorkerError, WorkflowError,
};
pub use maestro_runtime::{
    ConfigError, Orchestrator, OrchestratorConfig, QueueStatus, StepStatus, TaskJournal,
    TaskSpec, TaskSummary, Workflow, WorkflowBuilder, WorkflowRun, WorkflowStep, WorkerCall,
    render_result, substitute, write_tool_stats,
};
pub use maestro_tools::{
    CacheStats, ExecuteOptions, HistoryEntry, RegistryConfig, RegistryStats, ToolCache,
    ToolHistory, ToolInfo, ToolMetrics, ToolRegistry,
};
