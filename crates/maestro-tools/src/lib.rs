//! # Maestro Tools
//!
//! The tool execution layer: a registry of invocable capabilities with
//! parameter validation, TTL caching, retry-with-backoff and
//! observability (per-tool metrics and a capped invocation history).

pub mod cache;
pub mod history;
pub mod metrics;
pub mod registry;

pub use cache::{CacheStats, ToolCache};
pub use history::{HistoryEntry, ToolHistory};
pub use metrics::ToolMetrics;
pub use registry::{ExecuteOptions, RegistryConfig, RegistryStats, ToolInfo, ToolRegistry};
