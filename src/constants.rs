/// Source name constants to ensure consistency across the codebase.
/// These match the `source_name` keys of the built-in column map registry.
pub const HUGGINGFACE_DATA_JOBS: &str = "huggingface_data_jobs";
pub const KAGGLE_DATA_ENGINEER_2023: &str = "kaggle_data_engineer_2023";
pub const KAGGLE_LINKEDIN_JOBS_SKILLS_2024: &str = "kaggle_linkedin_jobs_skills_2024";
pub const GENERIC_SOURCE: &str = "generic";

// Pipeline defaults
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
/// Three years, counted the same way for every source regardless of date precision.
pub const DEFAULT_RECENCY_CUTOFF_DAYS: i64 = 3 * 365;

// Comparison harness defaults
pub const DEFAULT_COMPARE_SAMPLE_SIZE: usize = 300;
pub const DEFAULT_COMPARE_BATCH_SIZE: usize = 10;
pub const DESCRIPTION_SNIPPET_LEN: usize = 200;

/// Keywords that mark a title as belonging to the data domain.
/// Surrounding spaces make a keyword match whole words only.
pub const DATA_DOMAIN_KEYWORDS: &[&str] = &[
    "data engineer",
    "data engineering",
    "data science",
    "data scientist",
    "big data",
    "machine learning",
    "ml engineer",
    " ai ",
    "artificial intelligence",
    "analytics",
    "data analyst",
    "business intelligence",
    " bi ",
    "etl",
    "data pipeline",
    "data warehouse",
    "data lake",
];

/// Titles that contain a domain keyword but are not data roles.
pub const DATA_DOMAIN_EXCLUDES: &[&str] = &["data entry"];

/// Coarse category values (e.g. `job_title_short`) accepted as data-domain.
pub const DATA_DOMAIN_CATEGORIES: &[&str] = &[
    "Data Engineer",
    "Data Scientist",
    "Data Analyst",
    "Analytics Engineer",
    "Business Analyst",
    "Machine Learning Engineer",
];

/// Get all built-in source names
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        HUGGINGFACE_DATA_JOBS,
        KAGGLE_DATA_ENGINEER_2023,
        KAGGLE_LINKEDIN_JOBS_SKILLS_2024,
        GENERIC_SOURCE,
    ]
}
