use serde::Serialize;
use std::sync::Arc;
use std::vec;
use tracing::{debug, info};

use crate::constants;
use crate::domain::{CanonicalRow, LoadRecord, RawRecord, RunContext};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::RecordSource;
use crate::pipeline::processing::enrich::{SkillTaxonomy, TaxonomySkillExtractor};
use crate::pipeline::processing::normalize::{
    ColumnNormalizer, NormalizeOutcome, NormalizeWarning, UnmappableReason,
};
use crate::pipeline::processing::quality_gate::{
    FilterDecision, FilterPolicy, RecordFilter, RejectReason,
};

/// Explicit policy object handed to the pipeline at construction
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// When false every emitted row carries an empty `skills` list
    pub enable_skill_extraction: bool,
    pub filter: FilterPolicy,
    /// Rows per emitted batch
    pub batch_size: usize,
    /// Raw rows per input chunk
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_skill_extraction: false,
            filter: FilterPolicy::default(),
            batch_size: constants::DEFAULT_BATCH_SIZE,
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A bounded group of finalized rows, numbered in generation order from 0
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub sequence: u64,
    pub rows: Vec<LoadRecord>,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fate of a single raw record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Accepted {
        row: CanonicalRow,
        warnings: Vec<NormalizeWarning>,
    },
    Rejected(RejectReason),
    Unmappable(UnmappableReason),
}

/// Run-level counts surfaced to the caller instead of per-row errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunDiagnostics {
    pub records_read: u64,
    /// Rows the reader could not decode
    pub malformed: u64,
    pub unmappable: u64,
    pub unparseable_dates: u64,
    pub default_dates_applied: u64,
    pub derived_ids: u64,
    pub rejected_stale: u64,
    pub rejected_unknown_date: u64,
    pub rejected_out_of_domain: u64,
    pub rejected_excluded: u64,
    pub accepted: u64,
    pub batches: u64,
}

impl RunDiagnostics {
    /// Rows dropped before reaching the filter
    pub fn skipped(&self) -> u64 {
        self.malformed + self.unmappable
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_stale
            + self.rejected_unknown_date
            + self.rejected_out_of_domain
            + self.rejected_excluded
    }
}

/// normalize → filter → extract for one source
pub struct JobPipeline {
    normalizer: ColumnNormalizer,
    filter: RecordFilter,
    extractor: Option<TaxonomySkillExtractor>,
    batch_size: usize,
    chunk_size: usize,
}

impl JobPipeline {
    pub fn new(normalizer: ColumnNormalizer, config: PipelineConfig, taxonomy: Arc<SkillTaxonomy>) -> Self {
        let extractor = config
            .enable_skill_extraction
            .then(|| TaxonomySkillExtractor::new(taxonomy));
        Self {
            normalizer,
            filter: RecordFilter::new(config.filter),
            extractor,
            batch_size: config.batch_size.max(1),
            chunk_size: config.chunk_size.max(1),
        }
    }

    pub fn source_name(&self) -> &str {
        self.normalizer.source_name()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn skill_extraction_enabled(&self) -> bool {
        self.extractor.is_some()
    }

    /// Run one raw record through every stage. Pure apart from metric counters.
    pub fn process_record(&self, raw: &RawRecord, ordinal: u64, ctx: &RunContext) -> RecordOutcome {
        let source = self.normalizer.source_name();
        let record = match self.normalizer.normalize(raw, ordinal, ctx) {
            NormalizeOutcome::Mapped(record) => record,
            NormalizeOutcome::Unmappable(reason) => {
                metrics::normalize::record_unmappable(source);
                debug!(ordinal, error = %reason.to_error(source), "unmappable record");
                return RecordOutcome::Unmappable(reason);
            }
        };
        metrics::normalize::record_mapped(source);

        if let FilterDecision::Reject(reason) = self.filter.evaluate(&record, ctx.today) {
            metrics::filter::rejected(source, reject_label(&reason));
            debug!(source, ordinal, %reason, "record rejected");
            return RecordOutcome::Rejected(reason);
        }
        metrics::filter::accepted(source);

        let mut row = record.row;
        if let Some(extractor) = &self.extractor {
            row.skills = extractor.extract(Some(&row.job_title), row.job_description.as_deref());
            metrics::enrich::skills_extracted(row.skills.len());
        }

        RecordOutcome::Accepted {
            row,
            warnings: record.warnings,
        }
    }

    /// Lazily stream batches from `source`. Nothing is read until the first `next()`.
    pub fn stream<S: RecordSource>(&self, source: S, ctx: RunContext) -> BatchStream<'_, S> {
        BatchStream {
            pipeline: self,
            source,
            ctx,
            chunk: Vec::new().into_iter(),
            batch: Vec::with_capacity(self.batch_size),
            next_sequence: 0,
            next_ordinal: 0,
            diagnostics: RunDiagnostics::default(),
            finished: false,
        }
    }
}

fn reject_label(reason: &RejectReason) -> &'static str {
    match reason {
        RejectReason::Stale { .. } => "stale",
        RejectReason::UnknownDate => "unknown_date",
        RejectReason::OutOfDomain => "out_of_domain",
        RejectReason::Excluded { .. } => "excluded",
    }
}

/// Pull-driven batch iterator.
///
/// Holds at most one raw chunk and one in-progress batch. Each `next()` does
/// only the work needed to fill the next batch. After the input ends, or after
/// the source fails, the iterator is exhausted.
pub struct BatchStream<'p, S> {
    pipeline: &'p JobPipeline,
    source: S,
    ctx: RunContext,
    chunk: vec::IntoIter<RawRecord>,
    batch: Vec<LoadRecord>,
    next_sequence: u64,
    next_ordinal: u64,
    diagnostics: RunDiagnostics,
    finished: bool,
}

impl<S> BatchStream<'_, S> {
    pub fn source_name(&self) -> &str {
        self.pipeline.source_name()
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> RunDiagnostics {
        self.diagnostics
    }

    fn take_batch(&mut self) -> RowBatch {
        let rows = std::mem::replace(&mut self.batch, Vec::with_capacity(self.pipeline.batch_size));
        let batch = RowBatch {
            sequence: self.next_sequence,
            rows,
        };
        self.next_sequence += 1;
        self.diagnostics.batches += 1;
        metrics::stream::batch_emitted(self.pipeline.source_name(), batch.len());
        debug!(sequence = batch.sequence, rows = batch.len(), "batch ready");
        batch
    }

    fn record(&mut self, outcome: RecordOutcome) {
        let pipeline = self.pipeline;
        let source = pipeline.source_name();
        match outcome {
            RecordOutcome::Accepted { row, warnings } => {
                for warning in &warnings {
                    self.count_warning(source, warning);
                }
                self.diagnostics.accepted += 1;
                self.batch.push(row.to_load_record());
            }
            RecordOutcome::Rejected(reason) => match reason {
                RejectReason::Stale { .. } => self.diagnostics.rejected_stale += 1,
                RejectReason::UnknownDate => self.diagnostics.rejected_unknown_date += 1,
                RejectReason::OutOfDomain => self.diagnostics.rejected_out_of_domain += 1,
                RejectReason::Excluded { .. } => self.diagnostics.rejected_excluded += 1,
            },
            RecordOutcome::Unmappable(_) => self.diagnostics.unmappable += 1,
        }
    }

    fn count_warning(&mut self, source: &str, warning: &NormalizeWarning) {
        match warning {
            NormalizeWarning::UnparseableDate { .. } => {
                if let Some(err) = warning.to_error() {
                    debug!(source, error = %err, "date value dropped");
                }
                self.diagnostics.unparseable_dates += 1;
                metrics::normalize::unparseable_date(source);
            }
            NormalizeWarning::DefaultDateApplied { .. } => {
                self.diagnostics.default_dates_applied += 1;
            }
            NormalizeWarning::DerivedSourceId => {
                self.diagnostics.derived_ids += 1;
                metrics::normalize::derived_id(source);
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        let d = &self.diagnostics;
        info!(
            source = self.pipeline.source_name(),
            records_read = d.records_read,
            accepted = d.accepted,
            rejected = d.rejected(),
            skipped = d.skipped(),
            batches = d.batches,
            "stream complete"
        );
    }
}

impl<S: RecordSource> Iterator for BatchStream<'_, S> {
    type Item = Result<RowBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            while let Some(raw) = self.chunk.next() {
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.diagnostics.records_read += 1;

                let outcome = self.pipeline.process_record(&raw, ordinal, &self.ctx);
                self.record(outcome);

                if self.batch.len() >= self.pipeline.batch_size {
                    return Some(Ok(self.take_batch()));
                }
            }

            match self.source.next_chunk() {
                Ok(Some(chunk)) => {
                    if chunk.malformed > 0 {
                        self.diagnostics.malformed += chunk.malformed;
                        metrics::normalize::records_malformed(self.pipeline.source_name(), chunk.malformed);
                    }
                    self.chunk = chunk.records.into_iter();
                }
                Ok(None) => {
                    let last = (!self.batch.is_empty()).then(|| self.take_batch());
                    self.finish();
                    return last.map(Ok);
                }
                Err(e) => {
                    // The partial batch is dropped; nothing of it reached the sink.
                    self.batch.clear();
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}
