use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::ports::BatchSinkPort;
use crate::domain::LoadRecord;
use crate::pipeline::stream::RowBatch;

/// In-memory batch sink for development/testing
#[derive(Clone, Default)]
pub struct InMemoryBatchSink {
    batches: Arc<Mutex<Vec<RowBatch>>>,
    /// Fail the hand-off of this batch sequence, for exercising error paths
    fail_on: Option<u64>,
}

impl InMemoryBatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(sequence: u64) -> Self {
        Self {
            fail_on: Some(sequence),
            ..Self::default()
        }
    }

    pub async fn batches(&self) -> Vec<RowBatch> {
        self.batches.lock().await.clone()
    }

    /// All stored rows, in batch order
    pub async fn rows(&self) -> Vec<LoadRecord> {
        self.batches
            .lock()
            .await
            .iter()
            .flat_map(|b| b.rows.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl BatchSinkPort for InMemoryBatchSink {
    async fn write_batch(&self, batch: &RowBatch) -> Result<()> {
        if self.fail_on == Some(batch.sequence) {
            bail!("simulated sink failure on batch {}", batch.sequence);
        }
        let mut batches = self.batches.lock().await;
        if batches.iter().any(|b| b.sequence == batch.sequence) {
            bail!("batch {} already stored", batch.sequence);
        }
        batches.push(batch.clone());
        debug!(sequence = batch.sequence, rows = batch.len(), "stored batch in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(sequence: u64) -> RowBatch {
        RowBatch {
            sequence,
            rows: vec![LoadRecord::new()],
        }
    }

    #[tokio::test]
    async fn stores_batches_in_arrival_order() {
        let sink = InMemoryBatchSink::new();
        sink.write_batch(&batch(0)).await.unwrap();
        sink.write_batch(&batch(1)).await.unwrap();
        let stored = sink.batches().await;
        assert_eq!(stored.iter().map(|b| b.sequence).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(sink.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn refuses_to_replace_a_batch() {
        let sink = InMemoryBatchSink::new();
        sink.write_batch(&batch(0)).await.unwrap();
        assert!(sink.write_batch(&batch(0)).await.is_err());
    }
}
