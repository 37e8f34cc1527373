use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::compare_use_case::{ComparisonReport, ComparisonRow};
use crate::app::ports::ComparisonReportPort;

pub const REPORT_HEADERS: [&str; 6] = [
    "row_id",
    "job_title",
    "description_snippet",
    "skills_taxonomy",
    "skills_alternative",
    "jaccard_similarity",
];

/// Writes the comparison table as CSV, one line per sampled record
pub struct CsvComparisonReportAdapter {
    path: PathBuf,
}

impl CsvComparisonReportAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

fn record_fields(row: &ComparisonRow) -> [String; 6] {
    [
        row.record_id.clone(),
        row.job_title.clone(),
        row.description_snippet.clone(),
        row.taxonomy_skills.join("|"),
        row.alternative_skills
            .as_ref()
            .map(|s| s.join("|"))
            .unwrap_or_default(),
        row.similarity
            .map(|s| format!("{:.4}", s))
            .unwrap_or_default(),
    ]
}

/// Serialize a report to CSV bytes
pub fn render_csv(report: &ComparisonReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS)?;
    for row in &report.rows {
        writer.write_record(record_fields(row))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV report: {}", e.error()))
}

#[async_trait]
impl ComparisonReportPort for CsvComparisonReportAdapter {
    async fn write_report(&self, report: &ComparisonReport) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let bytes = render_csv(report)?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!(rows = report.rows.len(), "Wrote comparison report to {}", self.path.display());
        Ok(())
    }
}
