use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::domain::CanonicalField;
use crate::error::{IngestError, Result};

const BUILTIN_SOURCES: &str = include_str!("../../../../config/sources.toml");

/// Which canonical fields a source must supply for a row to be mappable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredFields {
    JobTitle,
    SourceId,
    /// Either a title or a provider identifier is enough.
    #[default]
    Either,
}

/// One `{canonical field, candidate raw names}` entry of a column map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: CanonicalField,
    pub columns: Vec<String>,
}

/// Versioned column map for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceColumnMap {
    pub source_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub required: RequiredFields,
    /// Stamped on rows that carry no parseable posting date.
    #[serde(default)]
    pub default_posted_date: Option<NaiveDate>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    /// Append the shared synonym table after the source's own candidates.
    #[serde(default = "default_true")]
    pub use_default_synonyms: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    version: u32,
    #[serde(default)]
    synonyms: BTreeMap<CanonicalField, Vec<String>>,
    #[serde(default, rename = "source")]
    sources: Vec<SourceColumnMap>,
}

/// Ordered lookup plan for one source: canonical fields in claim priority order,
/// each with its normalized candidate column names.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub entries: Vec<(CanonicalField, Vec<String>)>,
}

/// Registry of column maps keyed by source name
pub struct SourceRegistry {
    version: u32,
    synonyms: BTreeMap<CanonicalField, Vec<String>>,
    sources: HashMap<String, SourceColumnMap>,
}

impl SourceRegistry {
    /// Registry with the built-in providers
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_SOURCES)
    }

    /// Load a registry file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::SourceConfig(format!(
                "Failed to read source registry '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)?;

        let synonyms = file
            .synonyms
            .into_iter()
            .map(|(field, names)| (field, names.iter().map(|n| normalize_column_name(n)).collect()))
            .collect();

        let mut sources = HashMap::new();
        for source in file.sources {
            if source.source_name.trim().is_empty() {
                return Err(IngestError::SourceConfig(
                    "source entry with empty source_name".to_string(),
                ));
            }
            let mut seen = Vec::new();
            for mapping in &source.fields {
                if seen.contains(&mapping.field) {
                    return Err(IngestError::SourceConfig(format!(
                        "source '{}' maps field '{}' more than once",
                        source.source_name, mapping.field
                    )));
                }
                seen.push(mapping.field);
            }
            if sources.contains_key(&source.source_name) {
                return Err(IngestError::SourceConfig(format!(
                    "duplicate source '{}'",
                    source.source_name
                )));
            }
            sources.insert(source.source_name.clone(), source);
        }

        debug!(version = file.version, sources = sources.len(), "loaded source registry");
        Ok(Self {
            version: file.version,
            synonyms,
            sources,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, source_name: &str) -> Option<&SourceColumnMap> {
        self.sources.get(source_name)
    }

    /// List all registered source names, sorted
    pub fn list_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Build the claim-ordered lookup plan for a source.
    pub fn plan_for(&self, map: &SourceColumnMap) -> ColumnPlan {
        let mut entries: Vec<(CanonicalField, Vec<String>)> = Vec::new();

        let declared = map.fields.iter().map(|m| m.field);
        let remaining = CanonicalField::ALL
            .into_iter()
            .filter(|f| !map.fields.iter().any(|m| m.field == *f));

        for field in declared.chain(remaining) {
            let mut candidates: Vec<String> = map
                .fields
                .iter()
                .filter(|m| m.field == field)
                .flat_map(|m| m.columns.iter().map(|c| normalize_column_name(c)))
                .collect();
            if map.use_default_synonyms {
                if let Some(shared) = self.synonyms.get(&field) {
                    for name in shared {
                        if !candidates.contains(name) {
                            candidates.push(name.clone());
                        }
                    }
                }
            }
            if !candidates.is_empty() {
                entries.push((field, candidates));
            }
        }

        ColumnPlan { entries }
    }
}

/// Fold a raw column name into its comparison form: trimmed, lower-case,
/// with runs of spaces, hyphens, dots and underscores collapsed to one `_`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
