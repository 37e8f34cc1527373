use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unmappable record from {source_name}: {reason}")]
    UnmappableRecord { source_name: String, reason: String },

    #[error("Unparseable date in field {field}: {value:?}")]
    UnparseableDate { field: String, value: String },

    #[error("Skill taxonomy configuration error: {0}")]
    TaxonomyConfig(String),

    #[error("Source configuration error: {0}")]
    SourceConfig(String),

    #[error("Alternative extractor unavailable: {0}")]
    AlternativeExtractorUnavailable(String),

    #[error("Batch sink failure: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
