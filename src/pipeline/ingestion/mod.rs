// Pipeline ingestion: raw record sources read in bounded chunks

pub mod csv_source;
pub mod memory_source;

pub use csv_source::CsvRecordSource;
pub use memory_source::IterRecordSource;

use crate::domain::RawRecord;
use crate::error::Result;

/// One bounded slice of raw input
#[derive(Debug, Default)]
pub struct RawChunk {
    pub records: Vec<RawRecord>,
    /// Rows the reader could not decode at all (bad UTF-8, broken quoting)
    pub malformed: u64,
}

/// Pull-based producer of raw records.
///
/// Each call returns at most one chunk; `Ok(None)` marks the end of input.
/// An `Err` means the input itself can no longer be read.
pub trait RecordSource {
    fn next_chunk(&mut self) -> Result<Option<RawChunk>>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        (**self).next_chunk()
    }
}
