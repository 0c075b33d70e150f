//! # Maestro Core
//!
//! Core types and traits for the Maestro task orchestration engine.
//! This crate provides the vocabulary shared by the tool execution layer
//! and the scheduling runtime: tasks, the priority queue, the worker and
//! capability contracts, tool descriptors, and the error taxonomy.

pub mod error;
pub mod queue;
pub mod schema;
pub mod task;
pub mod tool;
pub mod worker;

pub use error::{CapabilityError, TaskError, ToolError, WorkerError, WorkflowError};
pub use queue::TaskQueue;
pub use schema::{ParamSpec, ParamType, ParameterSchema, SchemaViolation};
pub use task::{Task, TaskId, TaskPriority, TaskStatus};
pub use tool::{Capability, FnCapability, JsonMap, PostHook, PreHook, Tool, ToolResult, ToolStatus};
pub use worker::Worker;
