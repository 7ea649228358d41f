//! OpenTelemetry tracing setup

use crate::config::TelemetryConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;

/// Create an OpenTelemetry layer when OTLP export is enabled and configured.
///
/// Runs before the subscriber exists, so problems go to stderr.
pub fn create_otel_layer<S>(config: &TelemetryConfig) -> Option<OpenTelemetryLayer<S, SdkTracer>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    if !config.tracing_enabled {
        return None;
    }

    let Some(endpoint) = config.otlp_endpoint.clone() else {
        eprintln!("WARN: OTEL_TRACING_ENABLED=true but OTEL_EXPORTER_OTLP_ENDPOINT not set, skipping");
        return None;
    };

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(err) => {
            eprintln!("ERROR: Failed to create OTLP exporter: {}", err);
            return None;
        }
    };

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    opentelemetry::global::set_tracer_provider(provider);

    Some(tracing_opentelemetry::layer().with_tracer(tracer))
}
