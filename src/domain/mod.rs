use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One raw record as handed over by a provider: arbitrary column names mapped to scalar values.
pub type RawRecord = Map<String, Value>;

/// Flat mapping handed to the sink; keys are exactly the canonical field set, in `LOAD_COLUMNS` order.
pub type LoadRecord = Map<String, Value>;

/// Canonical job posting row; every source maps into this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub source_id: String,
    pub source_name: String,
    pub job_title: String,
    pub job_description: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub posted_date: Option<NaiveDate>,
    pub job_url: Option<String>,
    /// Canonical skill names only, in taxonomy order. Empty when extraction is disabled.
    pub skills: Vec<String>,
    pub salary_info: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl CanonicalRow {
    /// Serialize into the flat load shape. Dates are `YYYY-MM-DD`, timestamps RFC 3339 (UTC, micros).
    ///
    /// Keys are inserted in `LOAD_COLUMNS` order and the map preserves insertion order, so
    /// identical rows always produce identical bytes.
    pub fn to_load_record(&self) -> LoadRecord {
        let mut out = Map::with_capacity(CanonicalField::LOAD_COLUMNS.len());
        out.insert("source_id".into(), Value::String(self.source_id.clone()));
        out.insert("source_name".into(), Value::String(self.source_name.clone()));
        out.insert("job_title".into(), Value::String(self.job_title.clone()));
        out.insert("job_description".into(), opt_string(&self.job_description));
        out.insert("company_name".into(), opt_string(&self.company_name));
        out.insert("location".into(), opt_string(&self.location));
        out.insert(
            "posted_date".into(),
            self.posted_date
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        );
        out.insert("job_url".into(), opt_string(&self.job_url));
        out.insert(
            "skills".into(),
            Value::Array(self.skills.iter().cloned().map(Value::String).collect()),
        );
        out.insert("salary_info".into(), opt_string(&self.salary_info));
        out.insert(
            "ingested_at".into(),
            Value::String(self.ingested_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        out
    }
}

fn opt_string(v: &Option<String>) -> Value {
    v.as_ref().map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
}

/// Join title and description, skipping blank parts.
pub fn join_text(title: Option<&str>, description: Option<&str>) -> String {
    [title, description]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical fields a raw column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SourceId,
    JobTitle,
    JobDescription,
    CompanyName,
    Location,
    PostedDate,
    JobUrl,
    SalaryInfo,
    /// Coarse provider category (e.g. `job_title_short`); consulted by the domain filter, not emitted.
    JobCategory,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::SourceId,
        CanonicalField::JobTitle,
        CanonicalField::JobDescription,
        CanonicalField::CompanyName,
        CanonicalField::Location,
        CanonicalField::PostedDate,
        CanonicalField::JobUrl,
        CanonicalField::SalaryInfo,
        CanonicalField::JobCategory,
    ];

    /// Column set of the load shape, in serialization order.
    pub const LOAD_COLUMNS: [&'static str; 11] = [
        "source_id",
        "source_name",
        "job_title",
        "job_description",
        "company_name",
        "location",
        "posted_date",
        "job_url",
        "skills",
        "salary_info",
        "ingested_at",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::SourceId => "source_id",
            CanonicalField::JobTitle => "job_title",
            CanonicalField::JobDescription => "job_description",
            CanonicalField::CompanyName => "company_name",
            CanonicalField::Location => "location",
            CanonicalField::PostedDate => "posted_date",
            CanonicalField::JobUrl => "job_url",
            CanonicalField::SalaryInfo => "salary_info",
            CanonicalField::JobCategory => "job_category",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run values shared by every row of one pass.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    /// Assigned to every row's `ingested_at`.
    pub ingested_at: DateTime<Utc>,
    /// Reference date for the recency cutoff.
    pub today: NaiveDate,
}

impl RunContext {
    pub fn new(ingested_at: DateTime<Utc>) -> Self {
        Self {
            ingested_at,
            today: ingested_at.date_naive(),
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Pin the reference date independently of the ingestion timestamp.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_row() -> CanonicalRow {
        CanonicalRow {
            source_id: "42".to_string(),
            source_name: "generic".to_string(),
            job_title: "Data Engineer".to_string(),
            job_description: Some("Python and SQL".to_string()),
            company_name: None,
            location: Some("Berlin".to_string()),
            posted_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            job_url: None,
            skills: vec!["python".to_string(), "sql".to_string()],
            salary_info: None,
            ingested_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn load_record_keys_follow_column_order() {
        let record = sample_row().to_load_record();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, CanonicalField::LOAD_COLUMNS.to_vec());

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.starts_with("{\"source_id\":\"42\",\"source_name\":"), "{line}");
        assert!(line.ends_with("\"ingested_at\":\"2025-01-01T12:00:00.000000Z\"}"), "{line}");
    }

    #[test]
    fn load_record_formats_dates_and_nulls() {
        let record = sample_row().to_load_record();
        assert_eq!(record["posted_date"], Value::String("2024-01-15".into()));
        assert_eq!(record["company_name"], Value::Null);
        assert_eq!(
            record["ingested_at"],
            Value::String("2025-01-01T12:00:00.000000Z".into())
        );
        assert_eq!(record["skills"], serde_json::json!(["python", "sql"]));
    }

    #[test]
    fn empty_skills_serialize_as_empty_list() {
        let mut row = sample_row();
        row.skills.clear();
        assert_eq!(row.to_load_record()["skills"], serde_json::json!([]));
    }

    #[test]
    fn join_text_skips_blank_parts() {
        assert_eq!(join_text(Some(" Data Engineer "), None), "Data Engineer");
        assert_eq!(join_text(None, Some("Python")), "Python");
        assert_eq!(join_text(Some("   "), Some("")), "");
        assert_eq!(join_text(Some("A"), Some("B")), "A B");
    }
}
