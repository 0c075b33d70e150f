//! Per-tool invocation counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Cumulative counters for one tool.
///
/// Timing fields cover real (non-cached) executions only: cache hits and
/// calls rejected before the tool function ran (validation failures,
/// disabled tools) count as calls but contribute no timing sample.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolMetrics {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Number of real executions backing the timing fields.
    pub executions: u64,
    pub total_execution_time: Duration,
    pub min_execution_time: Option<Duration>,
    pub max_execution_time: Option<Duration>,
    pub last_called_at: Option<DateTime<Utc>>,
}

impl ToolMetrics {
    /// Record a real (non-cached) execution outcome.
    pub fn record_run(&mut self, success: bool, execution_time: Duration) {
        self.total_calls += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.executions += 1;
        self.total_execution_time += execution_time;
        self.min_execution_time = Some(match self.min_execution_time {
            Some(min) => min.min(execution_time),
            None => execution_time,
        });
        self.max_execution_time = Some(match self.max_execution_time {
            Some(max) => max.max(execution_time),
            None => execution_time,
        });
        self.last_called_at = Some(Utc::now());
    }

    /// Record a call served from the cache.
    pub fn record_cache_hit(&mut self) {
        self.total_calls += 1;
        self.successes += 1;
        self.cache_hits += 1;
        self.last_called_at = Some(Utc::now());
    }

    /// Record a cache lookup that missed (the call then proceeds to a
    /// real execution, recorded separately).
    pub fn record_cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    /// Record a call rejected before the tool function ran.
    pub fn record_rejected(&mut self) {
        self.total_calls += 1;
        self.failures += 1;
        self.last_called_at = Some(Utc::now());
    }

    /// Fraction of calls that succeeded, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total_calls as f64
    }

    /// Mean duration over real executions; `None` before the first run.
    pub fn average_execution_time(&self) -> Option<Duration> {
        if self.executions == 0 {
            return None;
        }
        Some(self.total_execution_time / self.executions as u32)
    }

    /// Fraction of cache lookups that hit, in `[0, 1]`.
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64
    }
}

impl std::fmt::Display for ToolMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} calls ({} ok, {} failed), {:.0}% cache hits",
            self.total_calls,
            self.successes,
            self.failures,
            self.cache_hit_rate() * 100.0,
        )?;
        if let Some(avg) = self.average_execution_time() {
            write!(f, ", avg {}", humantime::format_duration(avg))?;
        }
        Ok(())
    }
}
