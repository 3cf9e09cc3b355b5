use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register units and help text for every metric the crate emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sourcedeck_list_cache_hit_total",
            Unit::Count,
            "Total number of list cache hits, labelled by tier."
        );
        describe_counter!(
            "sourcedeck_list_cache_miss_total",
            Unit::Count,
            "Total number of list cache misses."
        );
        describe_counter!(
            "sourcedeck_list_cache_persist_error_total",
            Unit::Count,
            "Total number of failed writes to the persistent list cache tier."
        );
        describe_counter!(
            "sourcedeck_pipeline_discarded_total",
            Unit::Count,
            "Total number of list responses dropped because a newer request superseded them."
        );
        describe_histogram!(
            "sourcedeck_pipeline_fetch_ms",
            Unit::Milliseconds,
            "List page fetch latency in milliseconds."
        );
        describe_counter!(
            "sourcedeck_retry_attempt_total",
            Unit::Count,
            "Total number of retries scheduled after transient failures."
        );
    });
}
