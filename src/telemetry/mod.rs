//! Telemetry initialization: metrics, tracing, and structured logging

pub mod metrics;
pub mod tracing_setup;

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "porttrack_core=info,tower_http=debug";

/// Initialise logging, optional OTLP tracing and optional Prometheus metrics.
///
/// Returns the Prometheus handle when metrics are enabled so the server can
/// expose `/metrics`.
pub fn init(config: &TelemetryConfig) -> anyhow::Result<Option<PrometheusHandle>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let prometheus_handle = if config.metrics_enabled {
        let handle = metrics::install_prometheus_recorder()?;
        metrics::describe_metrics();
        Some(handle)
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    // The OpenTelemetry layer is typed on the composed subscriber, so each
    // format builds its own stack.
    if config.log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json().flatten_event(true);
        let otel_layer = tracing_setup::create_otel_layer(config);
        registry.with(fmt_layer).with(otel_layer).try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let otel_layer = tracing_setup::create_otel_layer(config);
        registry.with(fmt_layer).with(otel_layer).try_init()?;
    }

    Ok(prometheus_handle)
}
