use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants;
use crate::pipeline::processing::normalize::NormalizedRecord;

/// What to do when a title matches both the allow list and the exclude list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainConflictPolicy {
    /// Reject: "data entry clerk" is not a data role even though it says "data"
    #[default]
    ExcludeWins,
    AllowWins,
}

/// Policy applied uniformly to every normalized record, whatever its source
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Maximum posting age relative to the run's reference date
    pub recency_cutoff: Duration,
    /// Whether a record without a posting date passes the recency check
    pub accept_unknown_dates: bool,
    /// Phrases, any of which marks a title as in-domain. A leading or trailing
    /// space requires a word boundary on that side (" ai " but not "thai").
    pub domain_allow_list: Vec<String>,
    /// Phrases that disqualify an otherwise in-domain title
    pub domain_exclude_list: Vec<String>,
    /// Provider category values accepted as in-domain on their own
    pub domain_categories: Vec<String>,
    pub conflict_policy: DomainConflictPolicy,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            recency_cutoff: Duration::days(constants::DEFAULT_RECENCY_CUTOFF_DAYS),
            accept_unknown_dates: true,
            domain_allow_list: to_strings(constants::DATA_DOMAIN_KEYWORDS),
            domain_exclude_list: to_strings(constants::DATA_DOMAIN_EXCLUDES),
            domain_categories: to_strings(constants::DATA_DOMAIN_CATEGORIES),
            conflict_policy: DomainConflictPolicy::default(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Accept/reject outcome for a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Posted before the cutoff date
    Stale { posted_date: NaiveDate, cutoff: NaiveDate },
    /// No posting date and the policy does not accept unknown dates
    UnknownDate,
    /// Title matches no allow-listed phrase and the category is not accepted
    OutOfDomain,
    /// Title matches an exclude-listed phrase
    Excluded { phrase: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Stale { posted_date, cutoff } => {
                write!(f, "posted {posted_date}, before cutoff {cutoff}")
            }
            RejectReason::UnknownDate => f.write_str("no posting date"),
            RejectReason::OutOfDomain => f.write_str("title outside the target domain"),
            RejectReason::Excluded { phrase } => write!(f, "title matches excluded phrase '{phrase}'"),
        }
    }
}

/// Recency and domain predicate over normalized records.
///
/// Evaluation depends only on the record, the policy and the reference date,
/// never on other records.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    policy: FilterPolicy,
    allow: Vec<String>,
    exclude: Vec<String>,
    categories: Vec<String>,
}

impl RecordFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        let phrases = |items: &[String]| -> Vec<String> {
            items.iter().filter_map(|s| fold_phrase(s)).collect()
        };
        Self {
            allow: phrases(&policy.domain_allow_list),
            exclude: phrases(&policy.domain_exclude_list),
            categories: policy
                .domain_categories
                .iter()
                .map(|s| normalize_title(s))
                .filter(|s| !s.is_empty())
                .collect(),
            policy,
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Oldest posting date still accepted on `today`
    pub fn cutoff_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        today.checked_sub_signed(self.policy.recency_cutoff)
    }

    pub fn evaluate(&self, record: &NormalizedRecord, today: NaiveDate) -> FilterDecision {
        if let Some(reason) = self.check_recency(record.row.posted_date, today) {
            return FilterDecision::Reject(reason);
        }
        match self.check_domain(&record.row.job_title, record.category.as_deref()) {
            Some(reason) => FilterDecision::Reject(reason),
            None => FilterDecision::Accept,
        }
    }

    fn check_recency(&self, posted_date: Option<NaiveDate>, today: NaiveDate) -> Option<RejectReason> {
        match posted_date {
            None if self.policy.accept_unknown_dates => None,
            None => Some(RejectReason::UnknownDate),
            Some(posted_date) => {
                let cutoff = self.cutoff_date(today)?;
                (posted_date < cutoff).then_some(RejectReason::Stale { posted_date, cutoff })
            }
        }
    }

    fn check_domain(&self, title: &str, category: Option<&str>) -> Option<RejectReason> {
        // Padding lets boundary-marked phrases match at either end of the title.
        let title = format!(" {} ", normalize_title(title));

        let allowed = (self.allow.is_empty() && self.categories.is_empty())
            || self.allow.iter().any(|phrase| title.contains(phrase.as_str()))
            || category
                .map(normalize_title)
                .is_some_and(|c| self.categories.iter().any(|accepted| *accepted == c));
        if !allowed {
            return Some(RejectReason::OutOfDomain);
        }

        let excluded = self
            .exclude
            .iter()
            .find(|phrase| title.contains(phrase.as_str()))?;
        match self.policy.conflict_policy {
            DomainConflictPolicy::ExcludeWins => Some(RejectReason::Excluded {
                phrase: excluded.trim().to_string(),
            }),
            DomainConflictPolicy::AllowWins => None,
        }
    }
}

/// Lower-case, turn separators such as `/`, `-` or `,` into spaces and
/// collapse whitespace, so "AI/ML Engineer" reads as "ai ml engineer"
fn normalize_title(s: &str) -> String {
    s.to_lowercase()
        .replace(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Folded phrase keeping one boundary space on each side that had one
fn fold_phrase(s: &str) -> Option<String> {
    let core = normalize_title(s);
    if core.is_empty() {
        return None;
    }
    let lead = if s.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if s.ends_with(char::is_whitespace) { " " } else { "" };
    Some(format!("{lead}{core}{trail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalRow;
    use chrono::{TimeZone, Utc};

    fn record(title: &str, posted: Option<NaiveDate>, category: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            row: CanonicalRow {
                source_id: "1".into(),
                source_name: "generic".into(),
                job_title: title.into(),
                job_description: None,
                company_name: None,
                location: None,
                posted_date: posted,
                job_url: None,
                skills: vec![],
                salary_info: None,
                ingested_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            },
            category: category.map(str::to_string),
            warnings: vec![],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn accepts_recent_in_domain_title() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let r = record("Senior  DATA Engineer", date(2024, 1, 15), None);
        assert_eq!(filter.evaluate(&r, today()), FilterDecision::Accept);
    }

    #[test]
    fn rejects_postings_older_than_cutoff() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let r = record("Data Engineer", date(2015, 1, 1), None);
        assert!(matches!(
            filter.evaluate(&r, today()),
            FilterDecision::Reject(RejectReason::Stale { .. })
        ));
    }

    #[test]
    fn cutoff_boundary_is_inclusive() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let cutoff = filter.cutoff_date(today()).unwrap();
        let r = record("Data Engineer", Some(cutoff), None);
        assert!(filter.evaluate(&r, today()).is_accept());
        let r = record("Data Engineer", cutoff.pred_opt(), None);
        assert!(!filter.evaluate(&r, today()).is_accept());
    }

    #[test]
    fn unknown_dates_follow_policy() {
        let r = record("Data Engineer", None, None);
        let lenient = RecordFilter::new(FilterPolicy::default());
        assert!(lenient.evaluate(&r, today()).is_accept());

        let strict = RecordFilter::new(FilterPolicy {
            accept_unknown_dates: false,
            ..FilterPolicy::default()
        });
        assert_eq!(
            strict.evaluate(&r, today()),
            FilterDecision::Reject(RejectReason::UnknownDate)
        );
    }

    #[test]
    fn exclude_wins_by_default_and_is_configurable() {
        let policy = FilterPolicy {
            domain_allow_list: vec!["data".into()],
            ..FilterPolicy::default()
        };
        let r = record("Data Entry Clerk", date(2024, 6, 1), None);

        let filter = RecordFilter::new(policy.clone());
        assert_eq!(
            filter.evaluate(&r, today()),
            FilterDecision::Reject(RejectReason::Excluded {
                phrase: "data entry".into()
            })
        );

        let filter = RecordFilter::new(FilterPolicy {
            conflict_policy: DomainConflictPolicy::AllowWins,
            ..policy
        });
        assert!(filter.evaluate(&r, today()).is_accept());
    }

    #[test]
    fn short_acronyms_match_as_whole_words() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let accepted = ["AI Engineer", "BI Developer", "Senior AI Researcher", "AI/ML Platform Lead", "Power BI"];
        for title in accepted {
            let r = record(title, date(2024, 6, 1), None);
            assert!(filter.evaluate(&r, today()).is_accept(), "{title}");
        }
        let rejected = ["Thai Cuisine Chef", "Retail Sales Associate", "Mobile Developer", "Airline Pilot"];
        for title in rejected {
            let r = record(title, date(2024, 6, 1), None);
            assert_eq!(
                filter.evaluate(&r, today()),
                FilterDecision::Reject(RejectReason::OutOfDomain),
                "{title}"
            );
        }
    }

    #[test]
    fn phrases_without_boundary_spaces_match_anywhere() {
        let filter = RecordFilter::new(FilterPolicy {
            domain_allow_list: vec!["ai".into()],
            domain_exclude_list: vec![" intern ".into()],
            domain_categories: vec![],
            ..FilterPolicy::default()
        });
        let r = record("Thai Cuisine Chef", date(2024, 6, 1), None);
        assert!(filter.evaluate(&r, today()).is_accept());
        let r = record("AI Intern", date(2024, 6, 1), None);
        assert_eq!(
            filter.evaluate(&r, today()),
            FilterDecision::Reject(RejectReason::Excluded {
                phrase: "intern".into()
            })
        );
        let r = record("AI International Lead", date(2024, 6, 1), None);
        assert!(filter.evaluate(&r, today()).is_accept());
    }

    #[test]
    fn category_admits_titles_without_keywords() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let r = record("Platform Developer II", date(2024, 6, 1), None);
        assert_eq!(
            filter.evaluate(&r, today()),
            FilterDecision::Reject(RejectReason::OutOfDomain)
        );
        let r = record("Platform Developer II", date(2024, 6, 1), Some("data engineer"));
        assert!(filter.evaluate(&r, today()).is_accept());
    }

    #[test]
    fn empty_lists_disable_the_domain_check() {
        let filter = RecordFilter::new(FilterPolicy {
            domain_allow_list: vec![],
            domain_exclude_list: vec![],
            domain_categories: vec![],
            ..FilterPolicy::default()
        });
        let r = record("Barista", date(2024, 6, 1), None);
        assert!(filter.evaluate(&r, today()).is_accept());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let filter = RecordFilter::new(FilterPolicy::default());
        let r = record("Data Scientist", date(2023, 3, 1), None);
        assert_eq!(filter.evaluate(&r, today()), filter.evaluate(&r, today()));
    }
}
