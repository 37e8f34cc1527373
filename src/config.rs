use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::app::compare_use_case::{HarnessConfig, HarnessMode};
use crate::constants;
use crate::error::{IngestError, Result};
use crate::pipeline::processing::quality_gate::{DomainConflictPolicy, FilterPolicy};
use crate::pipeline::stream::PipelineConfig;

/// Run configuration: optional TOML file, then environment overrides
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub enable_skill_extraction: bool,
    pub recency_cutoff_days: i64,
    pub accept_unknown_dates: bool,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub domain: DomainConfig,
    pub compare: CompareConfig,
    /// Optional replacement for the built-in source registry
    pub sources_path: Option<String>,
    /// Optional replacement for the built-in skill taxonomy
    pub taxonomy_path: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub allow: Vec<String>,
    pub exclude: Vec<String>,
    pub categories: Vec<String>,
    pub conflict_policy: DomainConflictPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub sample_size: usize,
    pub batch_size: usize,
    pub model: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enable_skill_extraction: false,
            recency_cutoff_days: constants::DEFAULT_RECENCY_CUTOFF_DAYS,
            accept_unknown_dates: true,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            domain: DomainConfig::default(),
            compare: CompareConfig::default(),
            sources_path: None,
            taxonomy_path: None,
            api_key: None,
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            allow: owned(constants::DATA_DOMAIN_KEYWORDS),
            exclude: owned(constants::DATA_DOMAIN_EXCLUDES),
            categories: owned(constants::DATA_DOMAIN_CATEGORIES),
            conflict_policy: DomainConflictPolicy::default(),
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            sample_size: constants::DEFAULT_COMPARE_SAMPLE_SIZE,
            batch_size: constants::DEFAULT_COMPARE_BATCH_SIZE,
            model: None,
        }
    }
}

impl IngestConfig {
    /// Defaults, overlaid by `path` when given, then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: IngestConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Malformed values are errors.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_flag(&lookup, "HORIZON_ENABLE_SKILL_EXTRACTION")? {
            self.enable_skill_extraction = v;
        }
        if let Some(v) = parse_var(&lookup, "HORIZON_RECENCY_CUTOFF_DAYS")? {
            self.recency_cutoff_days = v;
        }
        if let Some(v) = parse_flag(&lookup, "HORIZON_ACCEPT_UNKNOWN_DATES")? {
            self.accept_unknown_dates = v;
        }
        if let Some(v) = parse_var(&lookup, "HORIZON_BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "HORIZON_CHUNK_SIZE")? {
            self.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, "HORIZON_COMPARE_SAMPLE_SIZE")? {
            self.compare.sample_size = v;
        }
        if let Some(v) = parse_var(&lookup, "HORIZON_COMPARE_BATCH_SIZE")? {
            self.compare.batch_size = v;
        }
        self.api_key = lookup("GOOGLE_API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .filter(|k| !k.trim().is_empty())
            .or(self.api_key.take());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.recency_cutoff()?;
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("chunk_size", self.chunk_size),
            ("compare.batch_size", self.compare.batch_size),
        ] {
            if value == 0 {
                return Err(IngestError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// The cutoff as a duration; negative or unrepresentable day counts are rejected
    pub fn recency_cutoff(&self) -> Result<Duration> {
        let days = self.recency_cutoff_days;
        if days < 0 {
            return Err(IngestError::Config(format!(
                "recency cutoff must be non-negative, got {days}"
            )));
        }
        Duration::try_days(days).ok_or_else(|| {
            IngestError::Config(format!("recency cutoff of {days} days is out of range"))
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            enable_skill_extraction: self.enable_skill_extraction,
            filter: FilterPolicy {
                recency_cutoff: self.recency_cutoff()?,
                accept_unknown_dates: self.accept_unknown_dates,
                domain_allow_list: self.domain.allow.clone(),
                domain_exclude_list: self.domain.exclude.clone(),
                domain_categories: self.domain.categories.clone(),
                conflict_policy: self.domain.conflict_policy,
            },
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
        })
    }

    pub fn harness_config(&self, mode: HarnessMode) -> HarnessConfig {
        HarnessConfig {
            sample_size: self.compare.sample_size,
            batch_size: self.compare.batch_size,
            mode,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| IngestError::Config(format!("{key}={raw:?} is invalid: {e}")))
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(IngestError::Config(format!(
            "{key}={raw:?} is not a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_constants() {
        let config = IngestConfig::default();
        assert!(!config.enable_skill_extraction);
        assert_eq!(config.recency_cutoff_days, 1095);
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.compare.sample_size, 300);
        assert_eq!(config.compare.batch_size, 10);
        assert_eq!(config.domain.exclude, vec!["data entry".to_string()]);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = IngestConfig::default();
        config
            .apply_env(env(&[
                ("HORIZON_ENABLE_SKILL_EXTRACTION", "1"),
                ("HORIZON_RECENCY_CUTOFF_DAYS", "30"),
                ("HORIZON_ACCEPT_UNKNOWN_DATES", "false"),
                ("HORIZON_BATCH_SIZE", "500"),
                ("GEMINI_API_KEY", "secret"),
            ]))
            .unwrap();
        assert!(config.enable_skill_extraction);
        assert!(!config.accept_unknown_dates);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.api_key.as_deref(), Some("secret"));

        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.filter.recency_cutoff, Duration::days(30));
        assert!(pipeline.enable_skill_extraction);
    }

    #[test]
    fn google_key_takes_precedence() {
        let mut config = IngestConfig::default();
        config
            .apply_env(env(&[("GOOGLE_API_KEY", "g"), ("GEMINI_API_KEY", "m")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));
    }

    #[test]
    fn malformed_values_are_errors() {
        let mut config = IngestConfig::default();
        let err = config
            .apply_env(env(&[("HORIZON_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        assert!(config
            .apply_env(env(&[("HORIZON_ENABLE_SKILL_EXTRACTION", "maybe")]))
            .is_err());
    }

    #[test]
    fn out_of_range_cutoff_is_a_config_error() {
        let mut config = IngestConfig::default();
        config
            .apply_env(env(&[("HORIZON_RECENCY_CUTOFF_DAYS", "200000000000")]))
            .unwrap();
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
        assert!(matches!(config.pipeline_config(), Err(IngestError::Config(_))));

        config.recency_cutoff_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let config = IngestConfig {
            batch_size: 0,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let config: IngestConfig = toml::from_str(
            r#"
enable_skill_extraction = true
batch_size = 50

[domain]
allow = ["data"]
conflict_policy = "allow_wins"
"#,
        )
        .unwrap();
        assert!(config.enable_skill_extraction);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.domain.allow, vec!["data".to_string()]);
        assert_eq!(config.domain.conflict_policy, DomainConflictPolicy::AllowWins);
        assert_eq!(config.domain.exclude, vec!["data entry".to_string()]);
        assert_eq!(config.chunk_size, 10_000);
    }
}
