//! The worker contract consumed by the orchestrator.

use crate::error::WorkerError;
use async_trait::async_trait;

/// An opaque executor that tasks are dispatched to.
///
/// A worker takes an instruction payload and produces a result string.
/// Everything else (prompt construction, model choice) is internal to
/// the implementation. The orchestrator wraps every call in a deadline
/// and owns the retry budget, so implementations should not retry
/// internally.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use maestro_core::{Worker, WorkerError};
///
/// struct EchoWorker;
///
/// #[async_trait]
/// impl Worker for EchoWorker {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn run(&self, payload: &str) -> Result<String, WorkerError> {
///         Ok(payload.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync {
    /// Unique name the orchestrator resolves tasks against.
    fn name(&self) -> &str;

    /// Execute one instruction payload to completion.
    async fn run(&self, payload: &str) -> Result<String, WorkerError>;
}
