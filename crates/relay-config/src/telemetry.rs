use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Telemetry configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name for telemetry metadata
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Console log format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Additional resource attributes
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
    /// OTLP exporter shared by traces and metrics
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
    /// Trace sampling configuration
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

/// Console log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// OTLP exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// OTLP endpoint URL
    pub endpoint: Url,
    /// Export protocol
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Metrics export interval
    #[serde(default = "default_export_interval", deserialize_with = "crate::duration::deserialize")]
    pub export_interval: Duration,
}

/// OTLP export protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    /// gRPC (default)
    #[default]
    Grpc,
    /// HTTP/protobuf
    HttpProto,
}

/// Trace sampling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// Fraction of root traces to sample
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Respect the sampling decision of an incoming parent span
    #[serde(default = "default_parent_based")]
    pub parent_based: bool,
}

fn default_service_name() -> String {
    "relay".to_string()
}

const fn default_export_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_sampling_rate() -> f64 {
    1.0
}

const fn default_parent_based() -> bool {
    true
}
