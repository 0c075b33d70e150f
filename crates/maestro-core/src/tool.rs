//! Tool descriptors, the capability contract and execution results.

use crate::error::CapabilityError;
use crate::schema::{ParamSpec, ParameterSchema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Named parameter map passed to tool functions. serde_json's default
/// `Map` is BTree-backed, so serializing it yields sorted keys; the
/// cache relies on that for canonical keys.
pub type JsonMap = serde_json::Map<String, Value>;

/// The tool function contract: an invocable accepting named parameters
/// and returning a JSON-serializable value.
///
/// Implementations may be fully async; synchronous functions are wrapped
/// with [`FnCapability`]. The registry owns validation, caching, timeout
/// and retry; a capability only does the work.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, params: &JsonMap) -> Result<Value, CapabilityError>;
}

/// Adapter exposing a plain synchronous closure as a [`Capability`].
///
/// # Example
///
/// ```rust
/// use maestro_core::{FnCapability, JsonMap};
/// use serde_json::{Value, json};
///
/// let double = FnCapability::new(|params: &JsonMap| {
///     let n = params.get("n").and_then(Value::as_i64).unwrap_or(0);
///     Ok(json!(n * 2))
/// });
/// ```
pub struct FnCapability<F> {
    f: F,
}

impl<F> FnCapability<F>
where
    F: Fn(&JsonMap) -> Result<Value, CapabilityError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(&JsonMap) -> Result<Value, CapabilityError> + Send + Sync,
{
    async fn invoke(&self, params: &JsonMap) -> Result<Value, CapabilityError> {
        (self.f)(params)
    }
}

/// Registration status of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Active,
    /// Calls short-circuit with a failure result.
    Disabled,
    /// Calls proceed but log a warning.
    Deprecated,
    Experimental,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ToolStatus::Active => "active",
            ToolStatus::Disabled => "disabled",
            ToolStatus::Deprecated => "deprecated",
            ToolStatus::Experimental => "experimental",
        };
        write!(f, "{label}")
    }
}

/// Best-effort hook run before a tool executes. A failure is logged and
/// swallowed, never aborting the call.
pub type PreHook = Arc<dyn Fn(&str, &JsonMap) -> Result<(), CapabilityError> + Send + Sync>;

/// Best-effort hook run after a successful execution.
pub type PostHook = Arc<dyn Fn(&str, &ToolResult) -> Result<(), CapabilityError> + Send + Sync>;

/// A named, schema-validated, cacheable capability.
///
/// The descriptor carries everything the registry needs to run the tool:
/// the parameter schema, cache and retry knobs, the per-call deadline,
/// and the handler itself.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
    pub category: String,
    pub permissions: HashSet<String>,
    pub status: ToolStatus,
    pub aliases: Vec<String>,
    pub cacheable: bool,
    /// Per-tool TTL override; the cache default applies when `None`.
    pub cache_ttl: Option<Duration>,
    pub timeout: Duration,
    /// Additional attempts after the first, with linear backoff between.
    pub retry_count: u32,
    handler: Arc<dyn Capability>,
    pre_hook: Option<PreHook>,
    post_hook: Option<PostHook>,
}

impl Tool {
    pub fn new(name: impl Into<String>, handler: Arc<dyn Capability>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: ParameterSchema::new(),
            category: "general".to_string(),
            permissions: HashSet::new(),
            status: ToolStatus::default(),
            aliases: Vec::new(),
            cacheable: false,
            cache_ttl: None,
            timeout: Duration::from_secs(10),
            retry_count: 0,
            handler,
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Add one parameter to the schema.
    pub fn with_param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.schema = self.schema.with_param(name, spec);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Mark results as cacheable under the cache's default TTL.
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    /// Mark results as cacheable with a per-tool TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cacheable = true;
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_pre_hook(
        mut self,
        hook: impl Fn(&str, &JsonMap) -> Result<(), CapabilityError> + Send + Sync + 'static,
    ) -> Self {
        self.pre_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_post_hook(
        mut self,
        hook: impl Fn(&str, &ToolResult) -> Result<(), CapabilityError> + Send + Sync + 'static,
    ) -> Self {
        self.post_hook = Some(Arc::new(hook));
        self
    }

    pub fn pre_hook(&self) -> Option<&PreHook> {
        self.pre_hook.as_ref()
    }

    pub fn post_hook(&self) -> Option<&PostHook> {
        self.post_hook.as_ref()
    }

    /// Run the underlying capability. The registry wraps this in the
    /// tool's deadline and retry budget.
    pub async fn invoke(&self, params: &JsonMap) -> Result<Value, CapabilityError> {
        self.handler.invoke(params).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("category", &self.category)
            .field("aliases", &self.aliases)
            .field("cacheable", &self.cacheable)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// The outcome of one `execute` call. Immutable once produced.
///
/// The `Display` form is the backward-compatible text surface: the data
/// rendered as plain text on success, `Tool error: <reason>` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    /// A successful real (non-cached) execution.
    pub fn success(data: Value, execution_time: Duration) -> Self {
        Self {
            success: true,
            data,
            error: None,
            execution_time,
            cached: false,
            timestamp: Utc::now(),
        }
    }

    /// A successful result served from the cache.
    pub fn from_cache(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            execution_time: Duration::ZERO,
            cached: true,
            timestamp: Utc::now(),
        }
    }

    /// A failure that never reached the tool function (lookup, status or
    /// validation short-circuits).
    pub fn failure(error: impl Into<String>) -> Self {
        Self::failure_after(error, Duration::ZERO)
    }

    /// A failure after real execution time was spent.
    pub fn failure_after(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
            execution_time,
            cached: false,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.success {
            match &self.data {
                Value::String(s) => write!(f, "{s}"),
                other => write!(f, "{other}"),
            }
        } else {
            let reason = self.error.as_deref().unwrap_or("unknown");
            write!(f, "Tool error: {reason}")
        }
    }
}
