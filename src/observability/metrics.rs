//! Counters for the fetch cycle
//!
//! Names follow the Prometheus conventions. Without an installed recorder every
//! call is a no-op, so library users and tests pay nothing for them.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalizer metrics
    NormalizerRecordsReceived,
    NormalizerIncidentsEmitted,
    NormalizerRecordsDropped,

    // Geocoder metrics
    GeocoderLookups,
    GeocoderLookupFailures,

    // Pipeline metrics
    PipelineFetchSuccess,
    PipelineFetchFailures,

    // Cache metrics
    CacheHits,
    CacheMisses,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizerRecordsReceived => "powercheck_normalizer_records_received_total",
            MetricName::NormalizerIncidentsEmitted => "powercheck_normalizer_incidents_emitted_total",
            MetricName::NormalizerRecordsDropped => "powercheck_normalizer_records_dropped_total",
            MetricName::GeocoderLookups => "powercheck_geocoder_lookups_total",
            MetricName::GeocoderLookupFailures => "powercheck_geocoder_lookup_failures_total",
            MetricName::PipelineFetchSuccess => "powercheck_pipeline_fetch_success_total",
            MetricName::PipelineFetchFailures => "powercheck_pipeline_fetch_failures_total",
            MetricName::CacheHits => "powercheck_cache_hits_total",
            MetricName::CacheMisses => "powercheck_cache_misses_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::NormalizerRecordsReceived,
            MetricName::NormalizerIncidentsEmitted,
            MetricName::NormalizerRecordsDropped,
            MetricName::GeocoderLookups,
            MetricName::GeocoderLookupFailures,
            MetricName::PipelineFetchSuccess,
            MetricName::PipelineFetchFailures,
            MetricName::CacheHits,
            MetricName::CacheMisses,
        ]
        .into_iter()
    }
}

/// Start a Prometheus exporter when `POWERCHECK_METRICS_ADDR` is set.
///
/// Must be called from inside the tokio runtime; the HTTP listener is spawned
/// onto it. Leaves the default no-op recorder in place otherwise.
pub fn init_metrics() {
    let Some(addr) = metrics_addr(|key| std::env::var(key).ok()) else {
        return;
    };
    match install_exporter(addr) {
        Ok(()) => info!("Prometheus exporter listening at http://{}/metrics", addr),
        Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
    }
}

fn metrics_addr<F>(lookup: F) -> Option<SocketAddr>
where
    F: Fn(&str) -> Option<String>,
{
    let addr_str = lookup("POWERCHECK_METRICS_ADDR")?;
    match addr_str.trim().parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Invalid metrics addr '{}': {}", addr_str, e);
            None
        }
    }
}

fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    for name in MetricName::all_metrics() {
        ::metrics::describe_counter!(name.as_str(), name.as_str());
    }
    Ok(())
}

// ============================================================================
// Normalizer Metrics
// ============================================================================

pub mod normalizer {
    use super::MetricName;

    pub fn records_received(count: u64) {
        ::metrics::counter!(MetricName::NormalizerRecordsReceived.as_str()).increment(count);
    }

    pub fn incidents_emitted(count: u64) {
        ::metrics::counter!(MetricName::NormalizerIncidentsEmitted.as_str()).increment(count);
    }

    pub fn record_dropped(reason: &'static str) {
        ::metrics::counter!(MetricName::NormalizerRecordsDropped.as_str(), "reason" => reason)
            .increment(1);
    }
}

// ============================================================================
// Geocoder Metrics
// ============================================================================

pub mod geocoder {
    use super::MetricName;

    pub fn lookup() {
        ::metrics::counter!(MetricName::GeocoderLookups.as_str()).increment(1);
    }

    pub fn lookup_failure() {
        ::metrics::counter!(MetricName::GeocoderLookupFailures.as_str()).increment(1);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn fetch_success(source: &'static str) {
        ::metrics::counter!(MetricName::PipelineFetchSuccess.as_str(), "source" => source).increment(1);
    }

    pub fn fetch_failure(source: &'static str) {
        ::metrics::counter!(MetricName::PipelineFetchFailures.as_str(), "source" => source).increment(1);
    }
}

// ============================================================================
// Cache Metrics
// ============================================================================

pub mod cache {
    use super::MetricName;

    pub fn hit() {
        ::metrics::counter!(MetricName::CacheHits.as_str()).increment(1);
    }

    pub fn miss() {
        ::metrics::counter!(MetricName::CacheMisses.as_str()).increment(1);
    }
}
