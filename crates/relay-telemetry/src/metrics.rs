//! Relay metric names and recorders
//!
//! Instruments come from the global meter provider, so they are no-ops
//! until an OTLP exporter is configured.

use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};

pub const RELAY_REQUEST_COUNT: &str = "relay.request.count";
pub const RELAY_UPSTREAM_RETRY_COUNT: &str = "relay.upstream.retry.count";
pub const RELAY_STREAM_ACTIVE: &str = "relay.stream.active";
pub const RELAY_STREAM_DURATION: &str = "relay.stream.duration";
pub const RELAY_TIME_TO_FIRST_TOKEN: &str = "relay.time_to_first_token";

/// Instruments recorded by the relay service
#[derive(Clone)]
pub struct RelayMetrics {
    requests: Counter<u64>,
    retries: Counter<u64>,
    active_streams: UpDownCounter<i64>,
    stream_duration: Histogram<f64>,
    time_to_first_token: Histogram<f64>,
}

impl RelayMetrics {
    /// Create instruments on the global `relay` meter
    pub fn new() -> Self {
        let meter = global::meter("relay");

        Self {
            requests: meter
                .u64_counter(RELAY_REQUEST_COUNT)
                .with_description("Relay requests by outcome")
                .build(),
            retries: meter
                .u64_counter(RELAY_UPSTREAM_RETRY_COUNT)
                .with_description("Upstream connection retries")
                .build(),
            active_streams: meter
                .i64_up_down_counter(RELAY_STREAM_ACTIVE)
                .with_description("Streams currently holding an upstream connection")
                .build(),
            stream_duration: meter
                .f64_histogram(RELAY_STREAM_DURATION)
                .with_unit("s")
                .with_description("Lifetime of relayed streams")
                .build(),
            time_to_first_token: meter
                .f64_histogram(RELAY_TIME_TO_FIRST_TOKEN)
                .with_unit("s")
                .with_description("Delay between accepting a request and forwarding its first delta")
                .build(),
        }
    }

    /// Count a finished request with its outcome label
    pub fn record_request(&self, outcome: &'static str) {
        self.requests.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// Count one scheduled upstream retry
    pub fn record_retry(&self) {
        self.retries.add(1, &[]);
    }

    /// Mark a stream as holding an upstream connection
    pub fn stream_opened(&self) {
        self.active_streams.add(1, &[]);
    }

    /// Mark a stream as released and record how long it lived
    pub fn stream_closed(&self, opened_at: Instant, outcome: &'static str) {
        self.active_streams.add(-1, &[]);
        self.stream_duration
            .record(opened_at.elapsed().as_secs_f64(), &[KeyValue::new("outcome", outcome)]);
    }

    /// Record the delay until the first forwarded delta
    pub fn record_first_token(&self, accepted_at: Instant) {
        self.time_to_first_token.record(accepted_at.elapsed().as_secs_f64(), &[]);
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
