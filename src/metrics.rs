//! Observability counters for queries sent, responses/errors matched, and
//! evictions — a lazily-initialized `prometheus::Registry` with a handful of
//! counters, exposed as a static so call sites don't need to thread a handle
//! through. Behind the `metrics` feature; with it disabled every recorder
//! is a no-op so call sites never need a `#[cfg]`.

#[cfg(feature = "metrics")]
mod imp {
    use std::sync::LazyLock;

    use prometheus::{Counter, Registry};

    pub static METRICS: LazyLock<EngineMetrics> = LazyLock::new(EngineMetrics::default);

    #[derive(Debug, Clone)]
    pub struct EngineMetrics {
        pub queries_sent_total: Counter,
        pub responses_matched_total: Counter,
        pub errors_matched_total: Counter,
        pub timeouts_evicted_total: Counter,
        pub requests_handled_total: Counter,
        pub registry: Registry,
    }

    impl Default for EngineMetrics {
        fn default() -> Self {
            let registry = Registry::new();

            let queries_sent_total = Counter::new(
                "dht_queries_sent_total",
                "Total outbound DHT queries sent by the runner",
            )
            .expect("failed to create queries_sent_total counter");
            let responses_matched_total = Counter::new(
                "dht_responses_matched_total",
                "Total inbound responses correlated to a live transaction",
            )
            .expect("failed to create responses_matched_total counter");
            let errors_matched_total = Counter::new(
                "dht_errors_matched_total",
                "Total inbound error messages correlated to a live transaction",
            )
            .expect("failed to create errors_matched_total counter");
            let timeouts_evicted_total = Counter::new(
                "dht_timeouts_evicted_total",
                "Total peers evicted from the routing table after exhausting retries",
            )
            .expect("failed to create timeouts_evicted_total counter");
            let requests_handled_total = Counter::new(
                "dht_requests_handled_total",
                "Total inbound queries handled by the request handler",
            )
            .expect("failed to create requests_handled_total counter");

            for counter in [
                &queries_sent_total,
                &responses_matched_total,
                &errors_matched_total,
                &timeouts_evicted_total,
                &requests_handled_total,
            ] {
                registry
                    .register(Box::new(counter.clone()))
                    .expect("failed to register counter");
            }

            EngineMetrics {
                queries_sent_total,
                responses_matched_total,
                errors_matched_total,
                timeouts_evicted_total,
                requests_handled_total,
                registry,
            }
        }
    }

    pub fn record_query_sent() {
        METRICS.queries_sent_total.inc();
    }

    pub fn record_response_matched() {
        METRICS.responses_matched_total.inc();
    }

    pub fn record_error_matched() {
        METRICS.errors_matched_total.inc();
    }

    pub fn record_timeout_evicted() {
        METRICS.timeouts_evicted_total.inc();
    }

    pub fn record_request_handled() {
        METRICS.requests_handled_total.inc();
    }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    pub fn record_query_sent() {}
    pub fn record_response_matched() {}
    pub fn record_error_matched() {}
    pub fn record_timeout_evicted() {}
    pub fn record_request_handled() {}
}

pub use imp::*;
