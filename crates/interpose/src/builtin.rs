//! Built-in interceptors
//!
//! - [`MetricsInterceptor`]: call counts and cumulative latency per operation
//! - [`TracingInterceptor`]: a `tracing` span around every intercepted call
//!
//! Neither declares any signatures by default. Add them with
//! `with_signature` or through the `intercepts` list of a
//! [`PluginConfig`](crate::PluginConfig).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{Level, Span, info, span};

use crate::error::{InterposeError, InterposeResult};
use crate::interceptor::Interceptor;
use crate::invocation::{Invocation, Outcome};
use crate::properties::Properties;
use crate::signature::{OperationSignature, Signature};

/// Counters for one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationStats {
    /// Completed calls
    pub calls: u64,
    /// Time spent in the call, including inner interceptors
    pub total: Duration,
}

impl OperationStats {
    /// Mean latency, zero when nothing was recorded
    pub fn average(&self) -> Duration {
        u32::try_from(self.calls)
            .ok()
            .and_then(|calls| self.total.checked_div(calls))
            .unwrap_or_default()
    }
}

/// Per-operation call metrics.
///
/// Clones share their counters and label, so a clone handed to a chain (or
/// to an [`InterceptorRegistry`](crate::InterceptorRegistry) factory and
/// configured there) can be read through the original.
#[derive(Debug, Clone, Default)]
pub struct MetricsInterceptor {
    label: Arc<RwLock<Option<String>>>,
    signatures: Vec<Signature>,
    stats: Arc<DashMap<OperationSignature, OperationStats>>,
}

impl MetricsInterceptor {
    /// Create a collector with no signatures
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one more operation
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Set the label reported alongside the counters
    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.label.write() = Some(label.into());
        self
    }

    /// Configured label
    pub fn label(&self) -> Option<String> {
        self.label.read().clone()
    }

    /// Counters keyed by operation (`Surface.operation(T1, T2)`)
    pub fn snapshot(&self) -> BTreeMap<String, OperationStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect()
    }

    /// Total calls across all operations
    pub fn total_calls(&self) -> u64 {
        self.stats.iter().map(|entry| entry.value().calls).sum()
    }

    /// Clear all counters
    pub fn reset(&self) {
        self.stats.clear();
    }

    /// Log the counters at `info` level
    pub fn report(&self) {
        let label = self.label().unwrap_or_else(|| "metrics".to_string());
        for (operation, stats) in self.snapshot() {
            info!(
                label = %label,
                operation = %operation,
                calls = stats.calls,
                avg_us = stats.average().as_micros() as u64,
                "Operation metrics"
            );
        }
    }
}

impl Interceptor for MetricsInterceptor {
    fn name(&self) -> &str {
        "metrics"
    }

    fn signatures(&self) -> Vec<Signature> {
        self.signatures.clone()
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
        let operation = *invocation.operation();
        let started = Instant::now();
        let outcome = invocation.proceed();
        let elapsed = started.elapsed();

        let mut stats = self.stats.entry(operation).or_default();
        stats.calls += 1;
        stats.total += elapsed;
        outcome
    }

    fn set_properties(&mut self, properties: &Properties) -> InterposeResult<()> {
        if let Some(label) = properties.get("label") {
            let label = label
                .as_str()
                .ok_or_else(|| InterposeError::invalid_property("label", "expected a string"))?;
            *self.label.write() = Some(label.to_string());
        }
        Ok(())
    }

    fn set_signatures(&mut self, signatures: Vec<Signature>) -> InterposeResult<()> {
        self.signatures = signatures;
        Ok(())
    }
}

/// Wraps every intercepted call in a span named `intercept` carrying the
/// surface and operation
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    level: Level,
    signatures: Vec<Signature>,
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            signatures: Vec::new(),
        }
    }
}

impl TracingInterceptor {
    /// Create a tracer at `debug` level with no signatures
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one more operation
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Set the span level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Span level
    pub fn level(&self) -> Level {
        self.level
    }

    fn span(&self, operation: &OperationSignature) -> Span {
        let surface = operation.surface().name();
        let name = operation.name();
        match self.level {
            Level::TRACE => span!(Level::TRACE, "intercept", surface, operation = name),
            Level::DEBUG => span!(Level::DEBUG, "intercept", surface, operation = name),
            Level::INFO => span!(Level::INFO, "intercept", surface, operation = name),
            Level::WARN => span!(Level::WARN, "intercept", surface, operation = name),
            _ => span!(Level::ERROR, "intercept", surface, operation = name),
        }
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn signatures(&self) -> Vec<Signature> {
        self.signatures.clone()
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
        let span = self.span(invocation.operation());
        let _entered = span.enter();
        invocation.proceed()
    }

    fn set_properties(&mut self, properties: &Properties) -> InterposeResult<()> {
        if let Some(level) = properties.get_str("level") {
            self.level = level.parse().map_err(|_| {
                InterposeError::invalid_property(
                    "level",
                    format!("'{level}' is not one of trace, debug, info, warn, error"),
                )
            })?;
        } else if properties.contains("level") {
            return Err(InterposeError::invalid_property("level", "expected a string"));
        }
        Ok(())
    }

    fn set_signatures(&mut self, signatures: Vec<Signature>) -> InterposeResult<()> {
        self.signatures = signatures;
        Ok(())
    }
}
