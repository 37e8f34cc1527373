use super::{RawChunk, RecordSource};
use crate::domain::RawRecord;
use crate::error::Result;

/// Record source over any iterator of already-materialized rows
pub struct IterRecordSource<I> {
    records: I,
    chunk_size: usize,
}

impl<I> IterRecordSource<I>
where
    I: Iterator<Item = RawRecord>,
{
    pub fn new<T>(records: T, chunk_size: usize) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            records: records.into_iter(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<I> RecordSource for IterRecordSource<I>
where
    I: Iterator<Item = RawRecord>,
{
    fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        let records: Vec<RawRecord> = self.records.by_ref().take(self.chunk_size).collect();
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawChunk {
            records,
            malformed: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yields_bounded_chunks_then_none() {
        let rows: Vec<RawRecord> = (0..5)
            .map(|i| json!({ "id": i }).as_object().cloned().unwrap())
            .collect();
        let mut source = IterRecordSource::new(rows, 2);
        let sizes: Vec<usize> = std::iter::from_fn(|| source.next_chunk().unwrap())
            .map(|c| c.records.len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(source.next_chunk().unwrap().is_none());
    }
}
