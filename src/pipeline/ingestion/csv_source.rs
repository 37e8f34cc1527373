use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::{RawChunk, RecordSource};
use crate::domain::RawRecord;
use crate::error::{IngestError, Result};

/// Reads a delimited file in chunks of at most `chunk_size` rows.
///
/// Only the header and the chunk being filled are held in memory. Every cell is
/// surfaced as a JSON string; typing happens in the normalizer.
pub struct CsvRecordSource<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    chunk_size: usize,
    record: csv::StringRecord,
    exhausted: bool,
}

impl CsvRecordSource<File> {
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            IngestError::Io(std::io::Error::new(
                e.kind(),
                format!("opening {}: {}", path.display(), e),
            ))
        })?;
        debug!(path = %path.display(), chunk_size, "opened CSV input");
        Self::from_reader(file, chunk_size)
    }
}

impl<R: Read> CsvRecordSource<R> {
    pub fn from_reader(rdr: R, chunk_size: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
        Ok(Self {
            reader,
            headers,
            chunk_size: chunk_size.max(1),
            record: csv::StringRecord::new(),
            exhausted: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new();
        for (name, cell) in self.headers.iter().zip(self.record.iter()) {
            raw.insert(name.clone(), Value::String(cell.to_string()));
        }
        raw
    }
}

impl<R: Read> RecordSource for CsvRecordSource<R> {
    fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut chunk = RawChunk {
            records: Vec::with_capacity(self.chunk_size),
            malformed: 0,
        };

        while chunk.records.len() < self.chunk_size {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => chunk.records.push(self.to_raw()),
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "skipping malformed CSV row");
                    chunk.malformed += 1;
                }
            }
        }

        if chunk.records.is_empty() && chunk.malformed == 0 {
            return Ok(None);
        }
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "Title,Company,Date\n\
Data Engineer,Acme,2024-01-15\n\
Data Scientist,\"Globex, Inc\",01/15/2024\n\
ML Engineer,Initech,45306\n";

    #[test]
    fn reads_rows_as_string_maps_in_chunks() {
        let mut source = CsvRecordSource::from_reader(Cursor::new(SAMPLE), 2).unwrap();
        assert_eq!(source.headers(), &["Title", "Company", "Date"]);

        let first = source.next_chunk().unwrap().unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[1]["Company"], Value::String("Globex, Inc".into()));

        let second = source.next_chunk().unwrap().unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn records_keep_header_order() {
        let data = "Title,Company,Date,Apply Url\nData Engineer,Acme,2024-01-15,https://x\n";
        let mut source = CsvRecordSource::from_reader(Cursor::new(data), 10).unwrap();
        let chunk = source.next_chunk().unwrap().unwrap();
        let keys: Vec<&str> = chunk.records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Title", "Company", "Date", "Apply Url"]);
    }

    #[test]
    fn short_rows_only_carry_present_cells() {
        let data = "title,company,date\nData Engineer\n";
        let mut source = CsvRecordSource::from_reader(Cursor::new(data), 10).unwrap();
        let chunk = source.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.records[0].len(), 1);
    }

    #[test]
    fn invalid_utf8_rows_are_counted_not_fatal() {
        let mut data = b"title,company\nData Engineer,Acme\n".to_vec();
        data.extend_from_slice(b"Bad \xff row,X\n");
        data.extend_from_slice(b"Data Analyst,Globex\n");
        let mut source = CsvRecordSource::from_reader(Cursor::new(data), 10).unwrap();
        let chunk = source.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.records.len(), 2);
        assert_eq!(chunk.malformed, 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(CsvRecordSource::open("/definitely/not/here.csv", 10).is_err());
    }
}
