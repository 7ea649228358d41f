//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Latency buckets in seconds; authorization is cheap, so the low end is dense.
const DURATION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context("Failed to set histogram buckets")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Register metric descriptions so HELP/TYPE lines appear from startup.
pub fn describe_metrics() {
    describe_counter!("porttrack_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "porttrack_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "porttrack_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        "porttrack_authz_decisions_total",
        "Authorization decisions by policy and outcome"
    );

    gauge!("porttrack_http_requests_in_flight").set(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_describe_metrics_creates_no_unlabelled_decision_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, describe_metrics);
        let rendered = handle.render();

        assert!(rendered.contains("porttrack_http_requests_in_flight"));
        assert!(!rendered.contains("policy=\"\""));
    }
}
