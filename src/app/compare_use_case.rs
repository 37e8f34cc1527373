use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::{AlternativeExtractorPort, JobText};
use crate::constants;
use crate::domain::CanonicalRow;
use crate::observability::metrics;
use crate::pipeline::processing::enrich::TaxonomySkillExtractor;

/// Whether the harness calls the alternative extractor at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarnessMode {
    #[default]
    Compare,
    SkipAlternative,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Maximum rows taken from the front of the input
    pub sample_size: usize,
    /// Jobs per alternative-extractor call
    pub batch_size: usize,
    pub mode: HarnessMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sample_size: constants::DEFAULT_COMPARE_SAMPLE_SIZE,
            batch_size: constants::DEFAULT_COMPARE_BATCH_SIZE,
            mode: HarnessMode::default(),
        }
    }
}

/// One scored sample record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub record_id: String,
    pub job_title: String,
    pub description_snippet: String,
    pub taxonomy_skills: Vec<String>,
    /// `None` when the alternative was skipped, unavailable or failed for this row
    pub alternative_skills: Option<Vec<String>>,
    /// `None` whenever `alternative_skills` is `None`
    pub similarity: Option<f64>,
}

/// Aggregates over the whole sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub rows: usize,
    /// Rows that received an alternative result
    pub alternative_rows: usize,
    pub mean_similarity: Option<f64>,
    pub taxonomy_non_empty_rate: f64,
    /// `None` when no row received an alternative result
    pub alternative_non_empty_rate: Option<f64>,
    /// Mean skill count over rows with at least one taxonomy skill
    pub mean_taxonomy_skills: Option<f64>,
    /// Mean skill count over rows with at least one alternative skill
    pub mean_alternative_skills: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub alternative_name: Option<String>,
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
}

/// Jaccard index of two skill sets.
///
/// 1.0 when both are empty, 0.0 when exactly one is empty.
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => {
            let intersection = a.intersection(&b).count() as f64;
            let union = a.union(&b).count() as f64;
            intersection / union
        }
    }
}

/// First `max_chars` characters of the description, with `...` when cut
pub fn description_snippet(description: Option<&str>, max_chars: usize) -> String {
    let desc = description.unwrap_or("");
    let mut chars = desc.chars();
    let snippet: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{snippet}...")
    } else {
        snippet
    }
}

/// Scores the taxonomy extractor against an alternative extractor over a sample.
///
/// Read-only: input rows are never modified.
pub struct ComparisonHarness {
    extractor: TaxonomySkillExtractor,
    alternative: Option<Arc<dyn AlternativeExtractorPort>>,
    config: HarnessConfig,
}

impl ComparisonHarness {
    pub fn new(
        extractor: TaxonomySkillExtractor,
        alternative: Option<Arc<dyn AlternativeExtractorPort>>,
        config: HarnessConfig,
    ) -> Self {
        Self {
            extractor,
            alternative,
            config,
        }
    }

    pub async fn run(&self, rows: &[CanonicalRow]) -> ComparisonReport {
        let sample = &rows[..rows.len().min(self.config.sample_size)];
        info!(rows = sample.len(), mode = ?self.config.mode, "running extraction comparison");

        let taxonomy_results: Vec<Vec<String>> = sample
            .iter()
            .map(|row| {
                self.extractor
                    .extract(Some(&row.job_title), row.job_description.as_deref())
            })
            .collect();

        let alternative_results = self.run_alternative(sample).await;
        let alternative_name = match self.config.mode {
            HarnessMode::Compare => self.alternative.as_ref().map(|a| a.name().to_string()),
            HarnessMode::SkipAlternative => None,
        };

        let report_rows: Vec<ComparisonRow> = sample
            .iter()
            .zip(taxonomy_results)
            .zip(alternative_results)
            .map(|((row, taxonomy_skills), alternative_skills)| {
                let similarity = alternative_skills
                    .as_ref()
                    .map(|alt| jaccard_similarity(&taxonomy_skills, alt));
                metrics::compare::row_scored(similarity);
                ComparisonRow {
                    record_id: row.source_id.clone(),
                    job_title: row.job_title.clone(),
                    description_snippet: description_snippet(
                        row.job_description.as_deref(),
                        constants::DESCRIPTION_SNIPPET_LEN,
                    ),
                    taxonomy_skills,
                    alternative_skills,
                    similarity,
                }
            })
            .collect();

        let summary = summarize(&report_rows);
        info!(
            rows = summary.rows,
            alternative_rows = summary.alternative_rows,
            mean_similarity = ?summary.mean_similarity,
            "comparison complete"
        );
        ComparisonReport {
            alternative_name,
            rows: report_rows,
            summary,
        }
    }

    /// Per-row alternative results; a failed or short batch yields `None` for each of its rows.
    async fn run_alternative(&self, sample: &[CanonicalRow]) -> Vec<Option<Vec<String>>> {
        let alternative = match (self.config.mode, &self.alternative) {
            (HarnessMode::Compare, Some(alternative)) => alternative,
            (HarnessMode::Compare, None) => {
                warn!("alternative extractor unavailable; similarity will not be computed");
                return vec![None; sample.len()];
            }
            (HarnessMode::SkipAlternative, _) => return vec![None; sample.len()],
        };

        let mut results = Vec::with_capacity(sample.len());
        for batch in sample.chunks(self.config.batch_size.max(1)) {
            let jobs: Vec<JobText> = batch
                .iter()
                .map(|row| JobText {
                    title: Some(row.job_title.clone()).filter(|t| !t.trim().is_empty()),
                    description: row.job_description.clone(),
                })
                .collect();

            match alternative.extract_batch(&jobs).await {
                Ok(lists) if lists.len() >= jobs.len() => {
                    results.extend(
                        lists
                            .into_iter()
                            .take(jobs.len())
                            .map(|list| Some(self.canonicalize(list))),
                    );
                }
                Ok(lists) => {
                    warn!(
                        expected = jobs.len(),
                        got = lists.len(),
                        "alternative extractor returned too few results; batch left empty"
                    );
                    metrics::compare::alternative_failure(jobs.len());
                    results.extend(std::iter::repeat(None).take(jobs.len()));
                }
                Err(e) => {
                    warn!(error = %e, "alternative extraction failed for batch");
                    metrics::compare::alternative_failure(jobs.len());
                    results.extend(std::iter::repeat(None).take(jobs.len()));
                }
            }
        }
        results
    }

    /// Map raw model output onto canonical names; unknown strings are kept lower-cased.
    fn canonicalize(&self, raw: Vec<String>) -> Vec<String> {
        let taxonomy = self.extractor.taxonomy();
        let mut out: Vec<String> = Vec::with_capacity(raw.len());
        for skill in raw {
            let trimmed = skill.trim();
            if trimmed.is_empty() {
                continue;
            }
            let name = taxonomy
                .canonicalize(trimmed)
                .map(str::to_string)
                .unwrap_or_else(|| trimmed.to_lowercase());
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

fn summarize(rows: &[ComparisonRow]) -> ComparisonSummary {
    let n = rows.len();
    let rate = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };
    let mean = |values: &[f64]| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };

    let similarities: Vec<f64> = rows.iter().filter_map(|r| r.similarity).collect();
    let taxonomy_sizes: Vec<f64> = rows
        .iter()
        .map(|r| r.taxonomy_skills.len())
        .filter(|&len| len > 0)
        .map(|len| len as f64)
        .collect();
    let alternative_rows = rows.iter().filter(|r| r.alternative_skills.is_some()).count();
    let alternative_sizes: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.alternative_skills.as_ref())
        .map(|s| s.len())
        .filter(|&len| len > 0)
        .map(|len| len as f64)
        .collect();

    ComparisonSummary {
        rows: n,
        alternative_rows,
        mean_similarity: mean(&similarities),
        taxonomy_non_empty_rate: rate(taxonomy_sizes.len()),
        alternative_non_empty_rate: (alternative_rows > 0).then(|| rate(alternative_sizes.len())),
        mean_taxonomy_skills: mean(&taxonomy_sizes),
        mean_alternative_skills: mean(&alternative_sizes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestError, Result};
    use crate::pipeline::processing::enrich::SkillTaxonomy;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|x| x.to_string()).collect()
    }

    fn row(id: &str, title: &str, desc: Option<&str>) -> CanonicalRow {
        CanonicalRow {
            source_id: id.into(),
            source_name: "generic".into(),
            job_title: title.into(),
            job_description: desc.map(str::to_string),
            company_name: None,
            location: None,
            posted_date: None,
            job_url: None,
            skills: vec![],
            salary_info: None,
            ingested_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn extractor() -> TaxonomySkillExtractor {
        TaxonomySkillExtractor::new(Arc::new(SkillTaxonomy::builtin().unwrap()))
    }

    struct FixedAlternative {
        answers: Vec<Vec<String>>,
    }

    #[async_trait]
    impl AlternativeExtractorPort for FixedAlternative {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract_batch(&self, jobs: &[JobText]) -> Result<Vec<Vec<String>>> {
            Ok(self.answers.iter().take(jobs.len()).cloned().collect())
        }
    }

    struct BrokenAlternative;

    #[async_trait]
    impl AlternativeExtractorPort for BrokenAlternative {
        fn name(&self) -> &str {
            "broken"
        }

        async fn extract_batch(&self, _jobs: &[JobText]) -> Result<Vec<Vec<String>>> {
            Err(IngestError::AlternativeExtractorUnavailable("offline".into()))
        }
    }

    #[test]
    fn jaccard_edge_cases() {
        assert_eq!(jaccard_similarity(&[], &[]), 1.0);
        assert_eq!(jaccard_similarity(&s(&["sql"]), &[]), 0.0);
        assert_eq!(jaccard_similarity(&[], &s(&["sql"])), 0.0);
        assert_eq!(jaccard_similarity(&s(&["a", "b"]), &s(&["b", "a"])), 1.0);
        assert!((jaccard_similarity(&s(&["a", "b", "c"]), &s(&["b", "c", "d"])) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn jaccard_is_symmetric() {
        let a = s(&["python", "sql", "aws"]);
        let b = s(&["sql", "kafka"]);
        assert_eq!(jaccard_similarity(&a, &b), jaccard_similarity(&b, &a));
    }

    #[test]
    fn snippet_truncates_on_char_boundaries() {
        assert_eq!(description_snippet(None, 5), "");
        assert_eq!(description_snippet(Some("short"), 5), "short");
        assert_eq!(description_snippet(Some("éééééé"), 5), "ééééé...");
    }

    #[tokio::test]
    async fn skip_mode_leaves_alternative_and_similarity_empty() {
        let harness = ComparisonHarness::new(
            extractor(),
            Some(Arc::new(FixedAlternative { answers: vec![] })),
            HarnessConfig {
                mode: HarnessMode::SkipAlternative,
                ..HarnessConfig::default()
            },
        );
        let rows = vec![
            row("1", "Data Engineer", Some("Python and SQL")),
            row("2", "Data Analyst", Some("Tableau dashboards")),
        ];
        let report = harness.run(&rows).await;

        assert_eq!(report.rows.len(), 2);
        assert!(report.alternative_name.is_none());
        for r in &report.rows {
            assert!(r.alternative_skills.is_none());
            assert!(r.similarity.is_none());
        }
        assert_eq!(report.summary.taxonomy_non_empty_rate, 1.0);
        assert_eq!(report.summary.alternative_non_empty_rate, None);
        assert_eq!(report.summary.mean_similarity, None);
    }

    #[tokio::test]
    async fn compare_mode_canonicalizes_and_scores() {
        let harness = ComparisonHarness::new(
            extractor(),
            Some(Arc::new(FixedAlternative {
                answers: vec![s(&["Python", "PostgreSQL", "Postgres"]), s(&[])],
            })),
            HarnessConfig::default(),
        );
        let rows = vec![
            row("1", "Data Engineer", Some("Python and SQL")),
            row("2", "Data Analyst", None),
        ];
        let report = harness.run(&rows).await;

        assert_eq!(report.alternative_name.as_deref(), Some("fixed"));
        let first = &report.rows[0];
        assert_eq!(first.taxonomy_skills, s(&["python", "sql"]));
        assert_eq!(first.alternative_skills, Some(s(&["python", "postgresql"])));
        assert!((first.similarity.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        // Both empty
        assert_eq!(report.rows[1].similarity, Some(1.0));
        assert_eq!(report.summary.alternative_non_empty_rate, Some(0.5));
        assert_eq!(report.summary.mean_taxonomy_skills, Some(2.0));
    }

    #[tokio::test]
    async fn failed_batches_degrade_to_missing_results() {
        let harness = ComparisonHarness::new(
            extractor(),
            Some(Arc::new(BrokenAlternative)),
            HarnessConfig {
                batch_size: 1,
                ..HarnessConfig::default()
            },
        );
        let rows = vec![row("1", "Data Engineer", Some("SQL")), row("2", "ML Engineer", None)];
        let report = harness.run(&rows).await;
        assert!(report.rows.iter().all(|r| r.alternative_skills.is_none() && r.similarity.is_none()));
        assert_eq!(report.summary.alternative_rows, 0);
    }

    #[tokio::test]
    async fn short_batch_answers_are_discarded() {
        let harness = ComparisonHarness::new(
            extractor(),
            Some(Arc::new(FixedAlternative {
                answers: vec![s(&["sql"])],
            })),
            HarnessConfig::default(),
        );
        let rows = vec![row("1", "Data Engineer", Some("SQL")), row("2", "Data Engineer", None)];
        let report = harness.run(&rows).await;
        assert!(report.rows.iter().all(|r| r.alternative_skills.is_none()));
    }

    #[tokio::test]
    async fn sample_size_caps_rows() {
        let harness = ComparisonHarness::new(
            extractor(),
            None,
            HarnessConfig {
                sample_size: 1,
                ..HarnessConfig::default()
            },
        );
        let rows = vec![row("1", "Data Engineer", None), row("2", "Data Engineer", None)];
        let report = harness.run(&rows).await;
        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].similarity.is_none());
    }
}
