//! Query metrics and tracing spans.
//!
//! Metrics are exported through OpenTelemetry with a Prometheus exporter (`metrics`
//! feature); spans are emitted through `tracing` (`tracing` feature).

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
#[cfg(feature = "metrics")]
use opentelemetry_prometheus::PrometheusExporter;

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<LifeguardMetrics> = Lazy::new(LifeguardMetrics::init);

#[cfg(feature = "metrics")]
pub struct LifeguardMetrics {
    pub exporter: PrometheusExporter,
    pub queries_total: Counter<u64>,
    pub query_errors_total: Counter<u64>,
    pub query_duration: Histogram<f64>,
    pub repository_queries_total: Counter<u64>,
    pub after_load_events_total: Counter<u64>,
}

#[cfg(feature = "metrics")]
impl LifeguardMetrics {
    pub fn init() -> Self {
        let exporter = opentelemetry_prometheus::exporter().build().expect("failed to build prometheus exporter");
        let meter = global::meter("lifeguard");

        let queries_total = meter.u64_counter("lifeguard_queries_total")
            .with_description("Total statements executed").build();

        let query_errors_total = meter.u64_counter("lifeguard_query_errors_total")
            .with_description("Statements that failed in the database").build();

        let query_duration = meter.f64_histogram("lifeguard_query_duration_seconds")
            .with_description("Duration of statements").build();

        let repository_queries_total = meter.u64_counter("lifeguard_repository_queries_total")
            .with_description("Repository query method invocations").build();

        let after_load_events_total = meter.u64_counter("lifeguard_after_load_events_total")
            .with_description("After-load events published for loaded entities").build();

        Self {
            exporter,
            queries_total,
            query_errors_total,
            query_duration,
            repository_queries_total,
            after_load_events_total,
        }
    }

    pub fn record_query(&self, elapsed: std::time::Duration) {
        self.queries_total.add(1, &[]);
        self.query_duration.record(elapsed.as_secs_f64(), &[]);
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.add(1, &[]);
    }

    pub fn record_repository_query(&self) {
        self.repository_queries_total.add(1, &[]);
    }

    pub fn record_after_load_event(&self) {
        self.after_load_events_total.add(1, &[]);
    }
}

/// Span helpers shared by the executor and repository layers.
#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span around one statement sent to the database.
    pub fn execute_query_span(query: &str) -> Span {
        tracing::debug_span!("lifeguard.execute_query", db.statement = %query)
    }

    /// Span around one repository query method invocation.
    pub fn repository_query_span(method: &str) -> Span {
        tracing::info_span!("lifeguard.repository_query", query.method = %method)
    }
}
