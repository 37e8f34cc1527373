// Data processing pipeline: ingestion, processing, and batch hand-off

pub mod ingestion;
pub mod processing;
pub mod storage;
pub mod stream;

// Re-export key types from each stage
pub use ingestion::{CsvRecordSource, IterRecordSource, RawChunk, RecordSource};
pub use stream::{BatchStream, JobPipeline, PipelineConfig, RecordOutcome, RowBatch, RunDiagnostics};
