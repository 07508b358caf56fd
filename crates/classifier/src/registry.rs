//! Whole-message dispatch: ordered parser walk with failure isolation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::composite::Composite;
use crate::dialects::{RailsDialect, SidekiqDialect};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::model::LogRecord;
use crate::traits::LineParser;

/// A dispatch result: the record plus the name of the parser that
/// produced it.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub record: LogRecord,
    pub source: String,
}

/// Ordered, deduplicated collection of dialect-level parsers.
///
/// Registration order is dispatch priority. Mutation is a
/// configuration-time concern; `dispatch` takes `&self` and is safe to
/// call concurrently over a shared, already-configured registry.
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn LineParser>>,
    metrics: DispatchMetrics,
}

impl ParserRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            metrics: DispatchMetrics::new(),
        }
    }

    /// Registry pre-loaded with the built-in dialect parsers.
    ///
    /// Order matters: more specific tests run first.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(Composite::<RailsDialect>::new()))
            .register(Arc::new(Composite::<SidekiqDialect>::new()));
        registry
    }

    /// Append `parser` unless it is already present. Identity-based and
    /// idempotent; returns the registry for chaining.
    pub fn register(&mut self, parser: Arc<dyn LineParser>) -> &mut Self {
        if !self.contains(&parser) {
            self.parsers.push(parser);
        }
        self
    }

    /// Move `parser` to the front, registering it if absent. Repeated
    /// prepends re-order rather than duplicate.
    pub fn prepend(&mut self, parser: Arc<dyn LineParser>) -> &mut Self {
        self.remove(&parser);
        self.parsers.insert(0, parser);
        self
    }

    /// Place `parser` at `index` (clamped to the current length),
    /// removing any prior occurrence first.
    pub fn insert(&mut self, index: usize, parser: Arc<dyn LineParser>) -> &mut Self {
        self.remove(&parser);
        let index = index.min(self.parsers.len());
        self.parsers.insert(index, parser);
        self
    }

    pub fn unregister(&mut self, parser: &Arc<dyn LineParser>) -> &mut Self {
        self.remove(parser);
        self
    }

    pub fn clear(&mut self) {
        self.parsers.clear();
    }

    /// Defensive copy of the current parser list, in dispatch order.
    pub fn list(&self) -> Vec<Arc<dyn LineParser>> {
        self.parsers.clone()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    pub fn contains(&self, parser: &Arc<dyn LineParser>) -> bool {
        self.parsers.iter().any(|p| Arc::ptr_eq(p, parser))
    }

    /// Counters recorded across all `dispatch` calls on this registry.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Classify `message` with the first matching parser.
    ///
    /// Walks the list in priority order. A parser that fails (by error or
    /// by panic) is logged and skipped, so a misbehaving third-party parser
    /// never aborts dispatch for the whole registry. Returns `None` for an
    /// empty message, or when no parser produces a record.
    pub fn dispatch(&self, message: &str) -> Option<Dispatch> {
        if message.is_empty() {
            return None;
        }
        self.metrics.record_dispatch();
        for parser in &self.parsers {
            if !parser.matches(message) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| parser.extract(message))) {
                Ok(Ok(Some(record))) => {
                    self.metrics.record_match(record.line_type() == "unknown");
                    return Some(Dispatch {
                        record,
                        source: parser.name().into_owned(),
                    });
                }
                Ok(Ok(None)) => continue,
                Ok(Err(error)) => {
                    self.metrics.record_failure();
                    warn!(
                        parser = %parser.name(),
                        %error,
                        "parser failed during dispatch, trying next"
                    );
                }
                Err(panic) => {
                    self.metrics.record_panic();
                    warn!(
                        parser = %parser.name(),
                        reason = panic_message(&panic),
                        "parser panicked during dispatch, trying next"
                    );
                }
            }
        }
        self.metrics.record_unmatched();
        None
    }

    fn remove(&mut self, parser: &Arc<dyn LineParser>) {
        self.parsers.retain(|p| !Arc::ptr_eq(p, parser));
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
