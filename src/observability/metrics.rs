//! Stage counters for the ingestion pipeline and the comparison harness.
//!
//! Every function here is a no-op until a recorder is installed with [`init`].

use std::fmt;
use std::net::SocketAddr;
use tracing::info;

/// Environment variable holding the Prometheus listener address, e.g. `0.0.0.0:9000`
pub const METRICS_ADDR_ENV: &str = "HORIZON_METRICS_ADDR";

/// All metric names used by the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRecordsMapped,
    NormalizeRecordsUnmappable,
    NormalizeRecordsMalformed,
    NormalizeUnparseableDates,
    NormalizeDerivedIds,

    // Filter metrics
    FilterRecordsAccepted,
    FilterRecordsRejected,

    // Enrich metrics
    EnrichSkillsExtracted,

    // Stream metrics
    StreamBatchesEmitted,
    StreamBatchSize,

    // Sink metrics
    SinkBatchesWritten,
    SinkErrors,

    // Compare metrics
    CompareRowsScored,
    CompareAlternativeFailures,
    CompareSimilarity,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsMapped => "horizon_normalize_records_mapped_total",
            MetricName::NormalizeRecordsUnmappable => "horizon_normalize_records_unmappable_total",
            MetricName::NormalizeRecordsMalformed => "horizon_normalize_records_malformed_total",
            MetricName::NormalizeUnparseableDates => "horizon_normalize_unparseable_dates_total",
            MetricName::NormalizeDerivedIds => "horizon_normalize_derived_ids_total",
            MetricName::FilterRecordsAccepted => "horizon_filter_records_accepted_total",
            MetricName::FilterRecordsRejected => "horizon_filter_records_rejected_total",
            MetricName::EnrichSkillsExtracted => "horizon_enrich_skills_extracted_total",
            MetricName::StreamBatchesEmitted => "horizon_stream_batches_emitted_total",
            MetricName::StreamBatchSize => "horizon_stream_batch_size",
            MetricName::SinkBatchesWritten => "horizon_sink_batches_written_total",
            MetricName::SinkErrors => "horizon_sink_errors_total",
            MetricName::CompareRowsScored => "horizon_compare_rows_scored_total",
            MetricName::CompareAlternativeFailures => "horizon_compare_alternative_failures_total",
            MetricName::CompareSimilarity => "horizon_compare_similarity",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter when `HORIZON_METRICS_ADDR` is set.
///
/// Returns `Ok(false)` when no address is configured and metrics stay disabled.
pub fn init() -> Result<bool, Box<dyn std::error::Error>> {
    let Ok(addr) = std::env::var(METRICS_ADDR_ENV) else {
        info!("Metrics disabled ({} not set)", METRICS_ADDR_ENV);
        return Ok(false);
    };
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| format!("Invalid {}='{}': {}", METRICS_ADDR_ENV, addr, e))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;

    info!(%addr, "Metrics system initialized");
    Ok(true)
}

pub mod normalize {
    use super::MetricName;

    pub fn record_mapped(source: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsMapped.as_str(), "source" => source.to_string())
            .increment(1);
    }

    pub fn record_unmappable(source: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsUnmappable.as_str(), "source" => source.to_string())
            .increment(1);
    }

    pub fn records_malformed(source: &str, count: u64) {
        ::metrics::counter!(MetricName::NormalizeRecordsMalformed.as_str(), "source" => source.to_string())
            .increment(count);
    }

    pub fn unparseable_date(source: &str) {
        ::metrics::counter!(MetricName::NormalizeUnparseableDates.as_str(), "source" => source.to_string())
            .increment(1);
    }

    pub fn derived_id(source: &str) {
        ::metrics::counter!(MetricName::NormalizeDerivedIds.as_str(), "source" => source.to_string())
            .increment(1);
    }
}

pub mod filter {
    use super::MetricName;

    pub fn accepted(source: &str) {
        ::metrics::counter!(MetricName::FilterRecordsAccepted.as_str(), "source" => source.to_string())
            .increment(1);
    }

    /// `reason` is a short label such as `stale` or `out_of_domain`
    pub fn rejected(source: &str, reason: &'static str) {
        ::metrics::counter!(
            MetricName::FilterRecordsRejected.as_str(),
            "source" => source.to_string(),
            "reason" => reason
        )
        .increment(1);
    }
}

pub mod enrich {
    use super::MetricName;

    pub fn skills_extracted(count: usize) {
        ::metrics::counter!(MetricName::EnrichSkillsExtracted.as_str()).increment(count as u64);
    }
}

pub mod stream {
    use super::MetricName;

    pub fn batch_emitted(source: &str, size: usize) {
        ::metrics::counter!(MetricName::StreamBatchesEmitted.as_str(), "source" => source.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::StreamBatchSize.as_str()).record(size as f64);
    }
}

pub mod sink {
    use super::MetricName;

    pub fn batch_written() {
        ::metrics::counter!(MetricName::SinkBatchesWritten.as_str()).increment(1);
    }

    pub fn error() {
        ::metrics::counter!(MetricName::SinkErrors.as_str()).increment(1);
    }
}

pub mod compare {
    use super::MetricName;

    pub fn row_scored(similarity: Option<f64>) {
        ::metrics::counter!(MetricName::CompareRowsScored.as_str()).increment(1);
        if let Some(s) = similarity {
            ::metrics::histogram!(MetricName::CompareSimilarity.as_str()).record(s);
        }
    }

    pub fn alternative_failure(rows: usize) {
        ::metrics::counter!(MetricName::CompareAlternativeFailures.as_str()).increment(rows as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_names_follow_prefix_convention() {
        for name in [
            MetricName::NormalizeRecordsMapped,
            MetricName::FilterRecordsRejected,
            MetricName::SinkBatchesWritten,
            MetricName::CompareRowsScored,
        ] {
            assert!(name.as_str().starts_with("horizon_"));
            assert!(name.as_str().ends_with("_total"));
        }
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        normalize::record_mapped("generic");
        filter::rejected("generic", "stale");
        compare::row_scored(Some(0.5));
    }
}
