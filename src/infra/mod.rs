// Infrastructure adapters behind the application ports

pub mod comparison_report;
pub mod gemini_extractor;
pub mod ndjson_output_adapter;

pub use comparison_report::CsvComparisonReportAdapter;
pub use gemini_extractor::GeminiExtractor;
pub use ndjson_output_adapter::NdjsonDirSinkAdapter;
