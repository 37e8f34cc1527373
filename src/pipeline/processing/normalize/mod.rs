use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::domain::{CanonicalField, CanonicalRow, RawRecord, RunContext};
use crate::error::{IngestError, Result};
use crate::idempotency::{derive_source_id, RowIdentity};

pub mod dates;
pub mod registry;

pub use registry::{
    normalize_column_name, ColumnPlan, FieldMapping, RequiredFields, SourceColumnMap,
    SourceRegistry,
};

/// A canonical row draft plus what the normalizer had to guess or drop on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub row: CanonicalRow,
    /// Provider category (e.g. `job_title_short`), used by the domain filter only.
    pub category: Option<String>,
    pub warnings: Vec<NormalizeWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeWarning {
    /// A date candidate held a value no known encoding accepts; the field was left empty.
    UnparseableDate { column: String, value: String },
    DefaultDateApplied { date: NaiveDate },
    DerivedSourceId,
}

impl NormalizeWarning {
    /// Error form of the warning, for callers that want to surface it
    pub fn to_error(&self) -> Option<IngestError> {
        match self {
            NormalizeWarning::UnparseableDate { column, value } => {
                Some(IngestError::UnparseableDate {
                    field: column.clone(),
                    value: value.clone(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmappableReason {
    MissingTitle,
    MissingSourceId,
    MissingTitleAndSourceId,
}

impl UnmappableReason {
    pub fn to_error(&self, source_name: &str) -> IngestError {
        IngestError::UnmappableRecord {
            source_name: source_name.to_string(),
            reason: self.to_string(),
        }
    }
}

impl fmt::Display for UnmappableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            UnmappableReason::MissingTitle => "no recognizable job title column",
            UnmappableReason::MissingSourceId => "no recognizable identifier column",
            UnmappableReason::MissingTitleAndSourceId => {
                "neither a job title nor an identifier column"
            }
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Mapped(NormalizedRecord),
    Unmappable(UnmappableReason),
}

impl NormalizeOutcome {
    pub fn is_mapped(&self) -> bool {
        matches!(self, NormalizeOutcome::Mapped(_))
    }
}

/// Maps raw records of one source onto the canonical row shape.
///
/// Each canonical field takes the first candidate column (in the source's
/// priority order) that holds a usable value. A column, once claimed, is not
/// considered for any later field.
#[derive(Debug, Clone)]
pub struct ColumnNormalizer {
    map: SourceColumnMap,
    plan: ColumnPlan,
}

impl ColumnNormalizer {
    pub fn new(registry: &SourceRegistry, source_name: &str) -> Result<Self> {
        let map = registry.get(source_name).ok_or_else(|| {
            IngestError::SourceConfig(format!(
                "unknown source '{}'; known sources: {}",
                source_name,
                registry.list_sources().join(", ")
            ))
        })?;
        Ok(Self::from_map(registry, map.clone()))
    }

    pub fn from_map(registry: &SourceRegistry, map: SourceColumnMap) -> Self {
        let plan = registry.plan_for(&map);
        Self { map, plan }
    }

    pub fn source_name(&self) -> &str {
        &self.map.source_name
    }

    pub fn column_map(&self) -> &SourceColumnMap {
        &self.map
    }

    pub fn normalize(&self, record: &RawRecord, ordinal: u64, ctx: &RunContext) -> NormalizeOutcome {
        // Normalized column name -> raw value; on a name collision the column that comes first
        // in the input (header order for CSV) wins.
        let mut columns: Vec<(&str, &Value)> = Vec::with_capacity(record.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(record.len());
        for (raw_name, value) in record {
            let name = normalize_column_name(raw_name);
            if !index.contains_key(&name) {
                index.insert(name, columns.len());
                columns.push((raw_name.as_str(), value));
            }
        }
        let mut claimed = vec![false; columns.len()];

        let mut text: HashMap<CanonicalField, String> = HashMap::new();
        let mut posted_date: Option<NaiveDate> = None;
        let mut warnings = Vec::new();

        for (field, candidates) in &self.plan.entries {
            for candidate in candidates {
                let Some(&i) = index.get(candidate) else {
                    continue;
                };
                if claimed[i] {
                    continue;
                }
                let (raw_name, value) = columns[i];

                if *field == CanonicalField::PostedDate {
                    let Some(raw) = scalar_text(value) else {
                        continue;
                    };
                    claimed[i] = true;
                    match dates::parse_date_value(value) {
                        Some(date) => {
                            posted_date = Some(date);
                            break;
                        }
                        None => {
                            debug!(column = raw_name, value = %raw, "unparseable date");
                            warnings.push(NormalizeWarning::UnparseableDate {
                                column: raw_name.to_string(),
                                value: raw,
                            });
                        }
                    }
                } else if let Some(s) = scalar_text(value) {
                    claimed[i] = true;
                    text.insert(*field, s);
                    break;
                }
            }
        }

        let title = text.remove(&CanonicalField::JobTitle);
        let provider_id = text.remove(&CanonicalField::SourceId);

        let missing = match (self.map.required, title.is_some(), provider_id.is_some()) {
            (RequiredFields::JobTitle, false, _) => Some(UnmappableReason::MissingTitle),
            (RequiredFields::SourceId, _, false) => Some(UnmappableReason::MissingSourceId),
            (RequiredFields::Either, false, false) => {
                Some(UnmappableReason::MissingTitleAndSourceId)
            }
            _ => None,
        };
        if let Some(reason) = missing {
            return NormalizeOutcome::Unmappable(reason);
        }

        if posted_date.is_none() {
            if let Some(date) = self.map.default_posted_date {
                posted_date = Some(date);
                warnings.push(NormalizeWarning::DefaultDateApplied { date });
            }
        }

        let job_title = title.unwrap_or_default();
        let company_name = text.remove(&CanonicalField::CompanyName);
        let location = text.remove(&CanonicalField::Location);
        let job_url = text.remove(&CanonicalField::JobUrl);

        let source_id = match provider_id {
            Some(id) => id,
            None => {
                warnings.push(NormalizeWarning::DerivedSourceId);
                let date_text = posted_date.map(|d| d.format("%Y-%m-%d").to_string());
                derive_source_id(&RowIdentity {
                    source_name: &self.map.source_name,
                    ordinal,
                    job_title: &job_title,
                    company_name: company_name.as_deref(),
                    location: location.as_deref(),
                    posted_date: date_text.as_deref(),
                    job_url: job_url.as_deref(),
                })
            }
        };

        NormalizeOutcome::Mapped(NormalizedRecord {
            row: CanonicalRow {
                source_id,
                source_name: self.map.source_name.clone(),
                job_title,
                job_description: text.remove(&CanonicalField::JobDescription),
                company_name,
                location,
                posted_date,
                job_url,
                skills: Vec::new(),
                salary_info: text.remove(&CanonicalField::SalaryInfo),
                ingested_at: ctx.ingested_at,
            },
            category: text.remove(&CanonicalField::JobCategory),
            warnings,
        })
    }
}

/// Text form of a scalar cell, or `None` when the cell is effectively empty.
fn scalar_text(value: &Value) -> Option<String> {
    let s = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if s.is_empty() || matches!(s.to_ascii_lowercase().as_str(), "nan" | "null" | "none") {
        None
    } else {
        Some(s)
    }
}
