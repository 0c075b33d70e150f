//! Catalog and execution pipeline for tools.
//!
//! `execute` drives one call through the full pipeline:
//! resolve alias → status gate → validate → cache lookup → pre-hook →
//! timed run with linear-backoff retries → cache store → post-hook →
//! metrics/history recording. Failures never escape as errors; every
//! outcome is folded into a [`ToolResult`].

use crate::cache::{CacheStats, ToolCache};
use crate::history::{HistoryEntry, ToolHistory};
use crate::metrics::ToolMetrics;
use dashmap::DashMap;
use maestro_core::{JsonMap, Tool, ToolError, ToolResult, ToolStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sizing knobs for a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub cache_size: usize,
    pub cache_ttl: Duration,
    pub history_capacity: usize,
    pub caching_enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_size: 100,
            cache_ttl: Duration::from_secs(300),
            history_capacity: 1000,
            caching_enabled: true,
        }
    }
}

/// Per-call options for [`ToolRegistry::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub caller: Option<String>,
    pub skip_cache: bool,
    pub skip_validation: bool,
    pub metadata: Option<Value>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Catalog row in a [`RegistryStats`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub category: String,
    pub status: ToolStatus,
    pub aliases: Vec<String>,
    pub cacheable: bool,
}

/// Serializable snapshot of the whole registry. Write-on-demand, not
/// authoritative state.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub tools: Vec<ToolInfo>,
    pub metrics: HashMap<String, ToolMetrics>,
    pub cache: CacheStats,
    pub history_entries: usize,
}

/// How an outcome is accounted in metrics.
enum Accounting {
    CacheHit,
    Run,
    Rejected,
}

/// Catalog of invocable tools; owns the cache, metrics and history.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Tool>>,
    aliases: RwLock<HashMap<String, String>>,
    cache: ToolCache,
    metrics: DashMap<String, ToolMetrics>,
    history: ToolHistory,
    caching_enabled: bool,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            cache: ToolCache::new(config.cache_size, config.cache_ttl),
            metrics: DashMap::new(),
            history: ToolHistory::new(config.history_capacity),
            caching_enabled: config.caching_enabled,
        }
    }

    /// Register a tool and its aliases, replacing any previous tool of
    /// the same name (and that tool's aliases).
    pub fn register(&self, tool: Tool) {
        let name = tool.name.clone();
        let new_aliases = tool.aliases.clone();
        {
            let mut aliases = self.write_aliases();
            aliases.retain(|_, target| *target != name);
            for alias in new_aliases {
                aliases.insert(alias, name.clone());
            }
        }
        debug!(tool = %name, "registered tool");
        self.write_tools().insert(name, tool);
    }

    /// Remove a tool, its aliases, its metrics entry and its cached
    /// results. Returns `false` for unknown names.
    pub fn unregister(&self, name: &str) -> bool {
        let Some(canonical) = self.resolve(name) else {
            return false;
        };
        self.write_tools().remove(&canonical);
        self.write_aliases().retain(|_, target| *target != canonical);
        self.metrics.remove(&canonical);
        self.cache.invalidate(Some(&canonical));
        debug!(tool = %canonical, "unregistered tool");
        true
    }

    /// Resolve a name or alias to the canonical tool name. Alias
    /// resolution is one level: an alias maps directly to a tool name.
    pub fn resolve(&self, name: &str) -> Option<String> {
        if self.read_tools().contains_key(name) {
            return Some(name.to_string());
        }
        self.read_aliases().get(name).cloned()
    }

    /// Fetch a tool by name or alias.
    pub fn get(&self, name: &str) -> Option<Tool> {
        let canonical = self.resolve(name)?;
        self.read_tools().get(&canonical).cloned()
    }

    /// All canonical tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_tools().keys().cloned().collect();
        names.sort();
        names
    }

    /// Canonical names of tools in the given category, sorted.
    pub fn tools_by_category(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .read_tools()
            .values()
            .filter(|tool| tool.category == category)
            .map(|tool| tool.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read_tools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_tools().is_empty()
    }

    /// Toggle a tool to `Disabled` without unregistering it.
    pub fn disable_tool(&self, name: &str) -> bool {
        self.set_status(name, ToolStatus::Disabled)
    }

    /// Toggle a tool back to `Active`.
    pub fn enable_tool(&self, name: &str) -> bool {
        self.set_status(name, ToolStatus::Active)
    }

    fn set_status(&self, name: &str, status: ToolStatus) -> bool {
        let Some(canonical) = self.resolve(name) else {
            return false;
        };
        let mut tools = self.write_tools();
        match tools.get_mut(&canonical) {
            Some(tool) => {
                tool.status = status;
                true
            }
            None => false,
        }
    }

    /// Metrics for one tool (by name or alias).
    pub fn get_metrics(&self, name: &str) -> Option<ToolMetrics> {
        let canonical = self.resolve(name)?;
        self.metrics.get(&canonical).map(|entry| entry.value().clone())
    }

    /// Metrics for every tool that has been called.
    pub fn all_metrics(&self) -> HashMap<String, ToolMetrics> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// The newest `count` history entries, most recent first.
    pub fn history(&self, count: usize) -> Vec<HistoryEntry> {
        self.history.recent(count)
    }

    /// Drop cached results for one tool, or for all tools.
    pub fn invalidate_cache(&self, tool: Option<&str>) {
        self.cache.invalidate(tool);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Snapshot of catalog, metrics, cache and history sizes.
    pub fn stats(&self) -> RegistryStats {
        let mut tools: Vec<ToolInfo> = self
            .read_tools()
            .values()
            .map(|tool| ToolInfo {
                name: tool.name.clone(),
                description: tool.description.clone(),
                category: tool.category.clone(),
                status: tool.status,
                aliases: tool.aliases.clone(),
                cacheable: tool.cacheable,
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        RegistryStats {
            tools,
            metrics: self.all_metrics(),
            cache: self.cache.stats(),
            history_entries: self.history.len(),
        }
    }

    /// Execute a tool through the full pipeline.
    ///
    /// Unknown names fail immediately and are not recorded (there is no
    /// registered tool to attribute the call to). Every other outcome of
    /// the call, from cache hit to exhausted retries, is recorded into
    /// metrics and history before it is returned.
    pub async fn execute(&self, name: &str, params: JsonMap, opts: ExecuteOptions) -> ToolResult {
        let Some(tool) = self.get(name) else {
            debug!(tool = %name, "execute: unknown tool");
            let err = ToolError::NotFound {
                name: name.to_string(),
            };
            return ToolResult::failure(err.to_string());
        };

        match tool.status {
            ToolStatus::Disabled => {
                let err = ToolError::Disabled {
                    name: tool.name.clone(),
                };
                let result = ToolResult::failure(err.to_string());
                self.record(&tool, &params, &result, &opts, Accounting::Rejected);
                return result;
            }
            ToolStatus::Deprecated => {
                warn!(tool = %tool.name, "executing deprecated tool");
            }
            ToolStatus::Active | ToolStatus::Experimental => {}
        }

        if !opts.skip_validation {
            if let Err(violation) = tool.schema.validate(&params) {
                let err = ToolError::Validation {
                    tool: tool.name.clone(),
                    reason: violation.to_string(),
                };
                let result = ToolResult::failure(err.to_string());
                self.record(&tool, &params, &result, &opts, Accounting::Rejected);
                return result;
            }
        }

        let use_cache = tool.cacheable && self.caching_enabled && !opts.skip_cache;
        if use_cache {
            if let Some(data) = self.cache.get(&tool.name, &params) {
                debug!(tool = %tool.name, "cache hit");
                let result = ToolResult::from_cache(data);
                self.record(&tool, &params, &result, &opts, Accounting::CacheHit);
                return result;
            }
            self.metrics
                .entry(tool.name.clone())
                .or_default()
                .record_cache_miss();
        }

        if let Some(hook) = tool.pre_hook() {
            if let Err(err) = hook(&tool.name, &params) {
                warn!(tool = %tool.name, error = %err, "pre-execute hook failed");
            }
        }

        let timeout_ms = tool.timeout.as_millis() as u64;
        let total_attempts = tool.retry_count + 1;
        let mut last_failure = (String::new(), Duration::ZERO);

        for attempt in 1..=total_attempts {
            let started = Instant::now();
            let outcome = tokio::time::timeout(tool.timeout, tool.invoke(&params)).await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(data)) => {
                    let result = ToolResult::success(data.clone(), elapsed);
                    if use_cache {
                        self.cache.set(&tool.name, &params, data, tool.cache_ttl);
                    }
                    if let Some(hook) = tool.post_hook() {
                        if let Err(err) = hook(&tool.name, &result) {
                            warn!(tool = %tool.name, error = %err, "post-execute hook failed");
                        }
                    }
                    self.record(&tool, &params, &result, &opts, Accounting::Run);
                    return result;
                }
                Ok(Err(err)) => {
                    let err = ToolError::Execution {
                        name: tool.name.clone(),
                        reason: err.reason,
                    };
                    last_failure = (err.to_string(), elapsed);
                }
                Err(_) => {
                    let err = ToolError::Timeout {
                        name: tool.name.clone(),
                        timeout_ms,
                    };
                    last_failure = (err.to_string(), elapsed);
                }
            }

            if attempt < total_attempts {
                // Linear backoff: 0.5s after the first failed attempt,
                // 1.0s after the second, and so on.
                let backoff = Duration::from_millis(500 * u64::from(attempt));
                warn!(
                    tool = %tool.name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_failure.0,
                    "tool attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        let (reason, elapsed) = last_failure;
        let result = ToolResult::failure_after(reason, elapsed);
        self.record(&tool, &params, &result, &opts, Accounting::Run);
        result
    }

    fn record(
        &self,
        tool: &Tool,
        params: &JsonMap,
        result: &ToolResult,
        opts: &ExecuteOptions,
        accounting: Accounting,
    ) {
        {
            let mut metrics = self.metrics.entry(tool.name.clone()).or_default();
            match accounting {
                Accounting::CacheHit => metrics.record_cache_hit(),
                Accounting::Rejected => metrics.record_rejected(),
                Accounting::Run => metrics.record_run(result.success, result.execution_time),
            }
        }
        self.history.record(
            HistoryEntry::new(&tool.name, params.clone(), result.clone())
                .with_caller(opts.caller.clone())
                .with_metadata(opts.metadata.clone()),
        );
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // maps themselves stay usable.
    fn read_tools(&self) -> RwLockReadGuard<'_, HashMap<String, Tool>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tools(&self) -> RwLockWriteGuard<'_, HashMap<String, Tool>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_aliases(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.aliases.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_aliases(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.aliases.write().unwrap_or_else(|e| e.into_inner())
    }
}
