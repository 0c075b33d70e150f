//! # Maestro Runtime
//!
//! The scheduling layer of Maestro: the [`Orchestrator`] (worker
//! registry, priority queue, bounded-concurrency dispatch and the
//! pipeline / parallel execution modes), the [`Workflow`] DAG engine,
//! payload templating, runtime configuration and best-effort JSON
//! persistence.

pub mod config;
pub mod journal;
pub mod orchestrator;
pub mod template;
pub mod workflow;

pub use config::{ConfigError, OrchestratorConfig};
pub use journal::{TaskJournal, TaskSummary, write_tool_stats};
pub use orchestrator::{
    CompletionListener, Orchestrator, QueueStatus, TaskSpec, WorkerCall, render_result,
};
pub use template::substitute;
pub use workflow::{StepStatus, Workflow, WorkflowBuilder, WorkflowRun, WorkflowStep};
