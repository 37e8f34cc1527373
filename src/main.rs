use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use horizon_ingest::app::compare_use_case::{ComparisonHarness, HarnessMode};
use horizon_ingest::app::ingest_use_case::IngestUseCase;
use horizon_ingest::app::ports::{AlternativeExtractorPort, ComparisonReportPort};
use horizon_ingest::config::IngestConfig;
use horizon_ingest::domain::{CanonicalRow, RunContext};
use horizon_ingest::infra::{CsvComparisonReportAdapter, GeminiExtractor, NdjsonDirSinkAdapter};
use horizon_ingest::observability;
use horizon_ingest::pipeline::processing::enrich::{SkillTaxonomy, TaxonomySkillExtractor};
use horizon_ingest::pipeline::processing::normalize::{ColumnNormalizer, SourceRegistry};
use horizon_ingest::pipeline::{CsvRecordSource, JobPipeline, PipelineConfig, RecordOutcome, RecordSource};

#[derive(Parser)]
#[command(name = "horizon-ingest")]
#[command(about = "Normalize, filter and enrich job-posting datasets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Optional TOML config file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a CSV export through the pipeline into NDJSON batch files
    Ingest {
        /// Registered source name (see `sources`)
        #[arg(long)]
        source: String,
        /// CSV file to read
        #[arg(long)]
        input: PathBuf,
        /// Directory receiving part-NNNNN.ndjson files
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Compare taxonomy extraction against the alternative extractor on a sample
    Compare {
        #[arg(long)]
        source: String,
        #[arg(long)]
        input: PathBuf,
        /// CSV report path
        #[arg(long, default_value = "output/skills_comparison.csv")]
        output: PathBuf,
        /// Only run the taxonomy extractor
        #[arg(long)]
        skip_alternative: bool,
        /// Override the sample size
        #[arg(long)]
        sample: Option<usize>,
    },
    /// List the registered source names
    Sources,
}

fn load_registry(config: &IngestConfig) -> horizon_ingest::error::Result<SourceRegistry> {
    match &config.sources_path {
        Some(path) => SourceRegistry::load(path),
        None => SourceRegistry::builtin(),
    }
}

fn load_taxonomy(config: &IngestConfig) -> horizon_ingest::error::Result<SkillTaxonomy> {
    match &config.taxonomy_path {
        Some(path) => SkillTaxonomy::load(path),
        None => SkillTaxonomy::builtin(),
    }
}

fn build_pipeline(
    config: &IngestConfig,
    pipeline_config: PipelineConfig,
    source: &str,
    taxonomy: Arc<SkillTaxonomy>,
) -> Result<JobPipeline, Box<dyn std::error::Error>> {
    let registry = load_registry(config)?;
    let normalizer = ColumnNormalizer::new(&registry, source)?;
    Ok(JobPipeline::new(normalizer, pipeline_config, taxonomy))
}

async fn run_ingest(
    config: &IngestConfig,
    source: &str,
    input: &Path,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let span = tracing::info_span!("ingest", source = %source);
    let _enter = span.enter();

    let taxonomy = Arc::new(load_taxonomy(config)?);
    let pipeline = build_pipeline(config, config.pipeline_config()?, source, taxonomy)?;
    let reader = CsvRecordSource::open(input, pipeline.chunk_size())?;
    let sink = NdjsonDirSinkAdapter::new(out)?;

    let report = IngestUseCase::new(Box::new(sink))
        .run(pipeline.stream(reader, RunContext::now()))
        .await?;

    let d = &report.diagnostics;
    println!("\n📊 Ingest results for {}:", report.source_name);
    println!("   Run id: {}", report.run_id);
    println!("   Records read: {}", d.records_read);
    println!("   Accepted: {}", d.accepted);
    println!("   Rejected: {} (stale {}, unknown date {}, out of domain {}, excluded {})",
        d.rejected(), d.rejected_stale, d.rejected_unknown_date, d.rejected_out_of_domain, d.rejected_excluded);
    println!("   Skipped: {} (malformed {}, unmappable {})", d.skipped(), d.malformed, d.unmappable);
    println!("   Batches written: {} ({} rows) to {}", report.batches_written, report.rows_written, out.display());
    if d.unparseable_dates > 0 {
        warn!(count = d.unparseable_dates, "some date values could not be parsed");
    }
    Ok(())
}

/// Accepted rows from the head of the input, up to `limit`
fn sample_rows(
    pipeline: &JobPipeline,
    mut reader: impl RecordSource,
    limit: usize,
) -> horizon_ingest::error::Result<Vec<CanonicalRow>> {
    let ctx = RunContext::now();
    let mut rows = Vec::with_capacity(limit);
    let mut ordinal = 0u64;
    while rows.len() < limit {
        let Some(chunk) = reader.next_chunk()? else {
            break;
        };
        for raw in &chunk.records {
            if let RecordOutcome::Accepted { row, .. } = pipeline.process_record(raw, ordinal, &ctx) {
                rows.push(row);
                if rows.len() == limit {
                    break;
                }
            }
            ordinal += 1;
        }
    }
    Ok(rows)
}

async fn run_compare(
    config: &IngestConfig,
    source: &str,
    input: &Path,
    output: &Path,
    skip_alternative: bool,
    sample: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let span = tracing::info_span!("compare", source = %source);
    let _enter = span.enter();

    let mode = if skip_alternative {
        HarnessMode::SkipAlternative
    } else {
        HarnessMode::Compare
    };
    let mut harness_config = config.harness_config(mode);
    if let Some(n) = sample {
        harness_config.sample_size = n;
    }

    let taxonomy = Arc::new(load_taxonomy(config)?);
    // The harness runs its own extractor; the pipeline only normalizes and filters here.
    let pipeline_config = PipelineConfig {
        enable_skill_extraction: false,
        ..config.pipeline_config()?
    };
    let pipeline = build_pipeline(config, pipeline_config, source, taxonomy.clone())?;
    let reader = CsvRecordSource::open(input, pipeline.chunk_size())?;
    let rows = sample_rows(&pipeline, reader, harness_config.sample_size)?;
    info!(rows = rows.len(), "sampled rows for comparison");

    let alternative: Option<Arc<dyn AlternativeExtractorPort>> = match mode {
        HarnessMode::SkipAlternative => None,
        HarnessMode::Compare => {
            match GeminiExtractor::new(config.api_key.clone(), config.compare.model.clone()) {
                Ok(extractor) => Some(Arc::new(extractor)),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            }
        }
    };

    let harness = ComparisonHarness::new(
        TaxonomySkillExtractor::new(taxonomy),
        alternative,
        harness_config,
    );
    let report = harness.run(&rows).await;
    CsvComparisonReportAdapter::new(output).write_report(&report).await?;

    let s = &report.summary;
    println!("\n📊 Skills extraction comparison ({} rows):", s.rows);
    println!("   Taxonomy non-empty rate: {:.1}%", s.taxonomy_non_empty_rate * 100.0);
    match s.alternative_non_empty_rate {
        Some(rate) => println!(
            "   {} non-empty rate: {:.1}%",
            report.alternative_name.as_deref().unwrap_or("alternative"),
            rate * 100.0
        ),
        None => println!("   Alternative extractor: not run"),
    }
    if let Some(mean) = s.mean_similarity {
        println!("   Mean Jaccard similarity: {:.4} over {} rows", mean, s.alternative_rows);
    }
    println!("   Report: {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_logging("logs");
    observability::init()?;

    let cli = Cli::parse();
    let config = IngestConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Ingest { source, input, out } => {
            println!("🔄 Ingesting {} from {}...", source, input.display());
            run_ingest(&config, &source, &input, &out).await
        }
        Commands::Compare {
            source,
            input,
            output,
            skip_alternative,
            sample,
        } => {
            println!("🔍 Comparing skill extractors on {}...", input.display());
            run_compare(&config, &source, &input, &output, skip_alternative, sample).await
        }
        Commands::Sources => {
            let registry = load_registry(&config)?;
            for name in registry.list_sources() {
                println!("{}", name);
            }
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("Run failed: {}", e);
        println!("❌ Run failed: {}", e);
    }
    result
}
