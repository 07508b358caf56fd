//! Dispatch counters for the parser registry.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters recorded across [`dispatch`](crate::registry::ParserRegistry::dispatch)
/// calls.
///
/// All operations use `Ordering::Relaxed`: these are observability
/// counters, eventual correctness is sufficient.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    dispatched: AtomicU64,
    matched: AtomicU64,
    unknown_records: AtomicU64,
    unmatched: AtomicU64,
    parser_failures: AtomicU64,
    parser_panics: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_match(&self, unknown: bool) {
        self.matched.fetch_add(1, Ordering::Relaxed);
        if unknown {
            self.unknown_records.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        self.parser_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_panic(&self) {
        self.parser_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot.
    ///
    /// Individual reads are atomic; the snapshot as a whole is not
    /// transactional, which is acceptable for metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            unknown_records: self.unknown_records.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            parser_failures: self.parser_failures.load(Ordering::Relaxed),
            parser_panics: self.parser_panics.load(Ordering::Relaxed),
        }
    }
}

/// A serializable read-only view of [`DispatchMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Non-empty messages handed to dispatch.
    pub dispatched: u64,
    /// Messages some parser produced a record for.
    pub matched: u64,
    /// Matched records that fell back to the unknown classification.
    pub unknown_records: u64,
    /// Messages no parser claimed.
    pub unmatched: u64,
    /// Parser errors swallowed during dispatch.
    pub parser_failures: u64,
    /// Parser panics contained during dispatch.
    pub parser_panics: u64,
}
