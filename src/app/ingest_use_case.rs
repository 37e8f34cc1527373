use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::ports::BatchSinkPort;
use crate::observability::metrics;
use crate::pipeline::ingestion::RecordSource;
use crate::pipeline::stream::{BatchStream, RunDiagnostics};

/// Summary of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub source_name: String,
    pub batches_written: u64,
    pub rows_written: u64,
    pub diagnostics: RunDiagnostics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drains a batch stream into a sink, one batch at a time
pub struct IngestUseCase {
    sink: Box<dyn BatchSinkPort>,
}

impl IngestUseCase {
    pub fn new(sink: Box<dyn BatchSinkPort>) -> Self {
        Self { sink }
    }

    /// Pull every batch and hand it to the sink in generation order.
    ///
    /// A source read failure or a sink failure ends the run with an error;
    /// batches already handed off stay written.
    pub async fn run<S: RecordSource>(&self, mut stream: BatchStream<'_, S>) -> Result<IngestReport> {
        let source_name = stream.source_name().to_string();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, source = %source_name, "starting ingest run");

        let mut batches_written = 0u64;
        let mut rows_written = 0u64;

        for next in stream.by_ref() {
            let batch = next.with_context(|| format!("reading input for source {source_name}"))?;
            if let Err(e) = self.sink.write_batch(&batch).await {
                metrics::sink::error();
                error!(%run_id, sequence = batch.sequence, error = %e, "sink rejected batch");
                return Err(e.context(format!("writing batch {}", batch.sequence)));
            }
            metrics::sink::batch_written();
            batches_written += 1;
            rows_written += batch.len() as u64;
        }

        let diagnostics = stream.into_diagnostics();
        let finished_at = Utc::now();
        info!(
            %run_id,
            source = %source_name,
            batches_written,
            rows_written,
            unmappable = diagnostics.unmappable,
            malformed = diagnostics.malformed,
            rejected = diagnostics.rejected(),
            "ingest run complete"
        );

        Ok(IngestReport {
            run_id,
            source_name,
            batches_written,
            rows_written,
            diagnostics,
            started_at,
            finished_at,
        })
    }
}
