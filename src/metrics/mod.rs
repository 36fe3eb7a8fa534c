//! Metrics collection for observability

use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Histogram, Opts,
    Registry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Context management metrics
    pub context_truncations: Counter,
    pub context_messages_dropped: Histogram,
    pub context_window_usage_percent: Histogram,
    pub context_summarizations: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let context_truncations = register_counter_with_registry!(
            Opts::new(
                "context_truncations_total",
                "Total histories truncated to fit the context window"
            ),
            registry
        )?;

        let context_messages_dropped = register_histogram_with_registry!(
            "context_messages_dropped",
            "Messages dropped per truncation",
            registry
        )?;

        let context_window_usage_percent = register_histogram_with_registry!(
            "context_window_usage_percent",
            "Context window usage percentage per prepared request",
            registry
        )?;

        let context_summarizations = register_counter_with_registry!(
            Opts::new(
                "context_summarizations_total",
                "Total conversation summaries produced"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            context_truncations,
            context_messages_dropped,
            context_window_usage_percent,
            context_summarizations,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a truncation that dropped messages from the window
    pub fn record_truncation(&self, dropped: usize) {
        self.context_truncations.inc();
        self.context_messages_dropped.observe(dropped as f64);
    }

    /// Record context window usage for a prepared request
    pub fn record_usage(&self, usage_percent: f64) {
        self.context_window_usage_percent.observe(usage_percent);
    }

    /// Record a summarization event
    pub fn record_summarization(&self) {
        self.context_summarizations.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_truncation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_truncation(3);
        metrics.record_truncation(0);
        assert_eq!(metrics.context_truncations.get() as usize, 2);
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_usage(42.0);
        let exported = metrics.export_prometheus();
        assert!(exported.contains("context_window_usage_percent"));
    }
}
