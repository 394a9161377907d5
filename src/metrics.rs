// Prometheus metrics for the throttled execution core
//
// Collected per reporting pass:
// - Admissions granted per service (counter)
// - Time spent waiting for admission (histogram)
// - Downstream call failures by kind (counter)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Throttle gate metrics
    pub static ref THROTTLE_ADMISSIONS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("throttle_admissions_total", "Total admissions granted by the throttle gate"),
        &["service"]
    ).expect("Failed to create throttle admissions metric");

    pub static ref THROTTLE_WAIT_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("throttle_wait_seconds", "Time callers spent waiting for admission"),
        &["service"]
    ).expect("Failed to create throttle wait metric");

    // Downstream call metrics
    pub static ref CALL_FAILURES_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("call_failures_total", "Total downstream call failures absorbed by the failure shell"),
        &["service", "kind"]
    ).expect("Failed to create call failures metric");

    pub static ref CALL_RETRIES_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("call_retries_total", "Total retry attempts made by the failure shell"),
        &["service"]
    ).expect("Failed to create call retries metric");
}

/// Initialize metrics registry - must be called once at process startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(THROTTLE_ADMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(THROTTLE_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(CALL_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CALL_RETRIES_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
///
/// The job logs this at the end of a pass instead of serving it over HTTP.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_metrics() {
        let _ = init();

        THROTTLE_ADMISSIONS_TOTAL
            .with_label_values(&["records"])
            .inc();
        THROTTLE_WAIT_SECONDS
            .with_label_values(&["records"])
            .observe(0.2);

        let metrics = REGISTRY.gather();
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_gather_text_format() {
        let _ = init();
        CALL_FAILURES_TOTAL
            .with_label_values(&["timetrack", "transport"])
            .inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("call_failures_total"));
    }
}
