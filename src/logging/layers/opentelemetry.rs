use crate::logging::layers::BoxLayer;
use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{resource::Resource, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;
use url::Url;

const TRACER_NAME: &str = "flowent";

/// Flushes and shuts the tracer provider down when the command ends.
pub struct OpenTelemetryGuard {
    provider: SdkTracerProvider,
}

impl Drop for OpenTelemetryGuard {
    fn drop(&mut self) {
        if let Err(err) = self.provider.force_flush() {
            eprintln!("warning: failed to flush spans: {}", err);
        }
        let _ = self.provider.shutdown();
    }
}

/// OTLP/gRPC span export for node executions.
pub fn build_opentelemetry_layer<S>(
    endpoint: &Url,
    service_name: Option<&str>,
) -> Result<(BoxLayer<S>, OpenTelemetryGuard)>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.as_str())
        .build()
        .with_context(|| format!("failed to build OTLP exporter for {}", endpoint))?;

    let resource = Resource::builder()
        .with_service_name(service_name.unwrap_or(TRACER_NAME).to_string())
        .with_attribute(KeyValue::new("service.version", crate::VERSION))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();
    let layer = OpenTelemetryLayer::new(provider.tracer(TRACER_NAME));

    Ok((Box::new(layer), OpenTelemetryGuard { provider }))
}
