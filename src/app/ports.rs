use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::compare_use_case::ComparisonReport;
use crate::pipeline::stream::RowBatch;

/// Durable destination for finalized row batches.
///
/// Batches arrive in generation order; each is self-contained and must not
/// replace an earlier one.
#[async_trait]
pub trait BatchSinkPort: Send + Sync {
    async fn write_batch(&self, batch: &RowBatch) -> anyhow::Result<()>;
}

/// Title/description pair handed to an alternative extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobText {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Model-based text-to-skills capability used only by the comparison harness
#[async_trait]
pub trait AlternativeExtractorPort: Send + Sync {
    fn name(&self) -> &str;

    /// One raw skill list per job, in input order. An error fails the whole batch.
    async fn extract_batch(&self, jobs: &[JobText]) -> crate::error::Result<Vec<Vec<String>>>;
}

#[async_trait]
pub trait ComparisonReportPort: Send + Sync {
    async fn write_report(&self, report: &ComparisonReport) -> anyhow::Result<()>;
}
