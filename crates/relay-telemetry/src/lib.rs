//! Telemetry for the relay
//!
//! Structured logging through `tracing-subscriber`, with optional OTLP
//! export of traces and metrics

mod metadata;
pub mod metrics;

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use relay_config::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig, TracingConfig};

pub use metrics::RelayMetrics;

/// Guard that flushes and shuts down telemetry providers on drop
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.meter_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown meter provider: {e}");
        }
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown tracer provider: {e}");
        }
    }
}

/// Initialize logging and, when an exporter is configured, OTLP export
///
/// `RUST_LOG` takes precedence over `log_filter`. The returned guard must
/// be held for the lifetime of the application.
///
/// # Errors
///
/// Returns an error if exporter construction fails or a global subscriber
/// is already installed
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.map_or(LogFormat::Text, |c| c.log_format);
    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json().with_target(true))),
    };

    let mut guard = TelemetryGuard {
        meter_provider: None,
        tracer_provider: None,
    };

    // Without an exporter the global meter stays a no-op
    let export = config.and_then(|c| c.exporter.as_ref().map(|exporter| (c, exporter)));

    let otel_layer = match export {
        Some((telemetry_config, exporter)) => {
            let resource = metadata::build_resource(telemetry_config);

            let meter_provider = init_metrics(exporter, resource.clone())?;
            global::set_meter_provider(meter_provider.clone());
            guard.meter_provider = Some(meter_provider);

            let tracer_provider = init_tracer(telemetry_config, exporter, resource)?;
            let tracer = tracer_provider.tracer("relay");
            global::set_tracer_provider(tracer_provider.clone());
            guard.tracer_provider = Some(tracer_provider);

            tracing::debug!(endpoint = %exporter.endpoint, "otlp export enabled");
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

/// Initialize periodic OTLP metrics export
fn init_metrics(exporter: &ExporterConfig, resource: opentelemetry_sdk::Resource) -> anyhow::Result<SdkMeterProvider> {
    use opentelemetry_otlp::MetricExporter;
    use opentelemetry_sdk::metrics::PeriodicReader;

    let metric_exporter = match exporter.protocol {
        ExportProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(exporter.endpoint.as_str())
            .build(),
        ExportProtocol::HttpProto => MetricExporter::builder()
            .with_http()
            .with_endpoint(exporter.endpoint.as_str())
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build metrics exporter: {e}"))?;

    let reader = PeriodicReader::builder(metric_exporter)
        .with_interval(exporter.export_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

/// Initialize batched OTLP trace export
fn init_tracer(
    config: &TelemetryConfig,
    exporter: &ExporterConfig,
    resource: opentelemetry_sdk::Resource,
) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_otlp::SpanExporter;

    let span_exporter = match exporter.protocol {
        ExportProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(exporter.endpoint.as_str())
            .build(),
        ExportProtocol::HttpProto => SpanExporter::builder()
            .with_http()
            .with_endpoint(exporter.endpoint.as_str())
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build span exporter: {e}"))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler_for(config.tracing.as_ref()))
        .with_batch_exporter(span_exporter)
        .build())
}

/// Pick the span sampler; unconfigured tracing samples everything, parent-based
fn sampler_for(settings: Option<&TracingConfig>) -> Sampler {
    let (rate, parent_based) = settings.map_or((1.0, true), |t| (t.sampling_rate, t.parent_based));

    let root = match rate {
        r if r >= 1.0 => Sampler::AlwaysOn,
        r if r <= 0.0 => Sampler::AlwaysOff,
        r => Sampler::TraceIdRatioBased(r),
    };

    if parent_based {
        Sampler::ParentBased(Box::new(root))
    } else {
        root
    }
}
