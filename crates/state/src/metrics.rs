//! Prometheus metrics for proof-backed state reads.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Metrics for one view family's fetch and cache behavior.
#[derive(Clone)]
pub struct StateMetrics {
    /// Reads answered from the verified-fact cache.
    pub cache_hits: Counter,
    /// Reads that missed the cache.
    pub cache_misses: Counter,
    /// Retrieval requests actually issued to the transport.
    pub fetches: Counter,
    /// Reads that attached to an already in-flight request.
    pub coalesced_waits: Counter,
    /// Fetches that ended in a retrieval error.
    pub fetch_failures: Counter,
    /// Proofs rejected during verification.
    pub invalid_proofs: Counter,
    /// End-to-end fetch latency in seconds (transport + verification).
    pub fetch_latency_seconds: Histogram,
}

impl Default for StateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMetrics {
    pub fn new() -> Self {
        // Network round trips: 1ms to ~65s
        let latency_buckets = exponential_buckets(0.001, 2.0, 17);
        Self {
            cache_hits: Counter::default(),
            cache_misses: Counter::default(),
            fetches: Counter::default(),
            coalesced_waits: Counter::default(),
            fetch_failures: Counter::default(),
            invalid_proofs: Counter::default(),
            fetch_latency_seconds: Histogram::new(latency_buckets),
        }
    }

    /// Register all metrics with a Prometheus registry.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "wisp_state_cache_hits",
            "Reads answered from the verified-fact cache",
            self.cache_hits.clone(),
        );
        registry.register(
            "wisp_state_cache_misses",
            "Reads that missed the verified-fact cache",
            self.cache_misses.clone(),
        );
        registry.register(
            "wisp_state_fetches",
            "Retrieval requests issued to the transport",
            self.fetches.clone(),
        );
        registry.register(
            "wisp_state_coalesced_waits",
            "Reads attached to an already in-flight request",
            self.coalesced_waits.clone(),
        );
        registry.register(
            "wisp_state_fetch_failures",
            "Fetches that ended in a retrieval error",
            self.fetch_failures.clone(),
        );
        registry.register(
            "wisp_state_invalid_proofs",
            "Proofs rejected during verification",
            self.invalid_proofs.clone(),
        );
        registry.register(
            "wisp_state_fetch_latency_seconds",
            "End-to-end fetch latency in seconds",
            self.fetch_latency_seconds.clone(),
        );
    }
}

/// Optional metrics handle; disabled is a no-op.
#[derive(Clone, Default)]
pub struct OptionalMetrics(Option<Arc<StateMetrics>>);

impl OptionalMetrics {
    pub fn enabled(metrics: Arc<StateMetrics>) -> Self {
        Self(Some(metrics))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        if let Some(m) = &self.0 {
            m.cache_hits.inc();
        }
    }

    #[inline]
    pub fn record_cache_miss(&self) {
        if let Some(m) = &self.0 {
            m.cache_misses.inc();
        }
    }

    #[inline]
    pub fn record_fetch(&self) {
        if let Some(m) = &self.0 {
            m.fetches.inc();
        }
    }

    #[inline]
    pub fn record_coalesced_wait(&self) {
        if let Some(m) = &self.0 {
            m.coalesced_waits.inc();
        }
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        if let Some(m) = &self.0 {
            m.fetch_failures.inc();
        }
    }

    #[inline]
    pub fn record_invalid_proof(&self) {
        if let Some(m) = &self.0 {
            m.invalid_proofs.inc();
        }
    }

    #[inline]
    pub fn record_fetch_latency(&self, latency_secs: f64) {
        if let Some(m) = &self.0 {
            m.fetch_latency_seconds.observe(latency_secs);
        }
    }
}
