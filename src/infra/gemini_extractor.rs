use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::app::ports::{AlternativeExtractorPort, JobText};
use crate::error::{IngestError, Result};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_DESCRIPTION_CHARS: usize = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Alternative skill extractor backed by the Gemini `generateContent` API.
///
/// Several jobs go into one prompt; the model is asked for a JSON array of
/// arrays, one per job, in order.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    /// Fails with `AlternativeExtractorUnavailable` when no key is given
    pub fn new(api_key: Option<String>, model: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                IngestError::AlternativeExtractorUnavailable(
                    "no API key; set GOOGLE_API_KEY or GEMINI_API_KEY".to_string(),
                )
            })?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at a different API root, e.g. a local stub server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl AlternativeExtractorPort for GeminiExtractor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn extract_batch(&self, jobs: &[JobText]) -> Result<Vec<Vec<String>>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_batch_prompt(jobs);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        debug!(jobs = jobs.len(), model = %self.model, "requesting batch skill extraction");
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: GenerateResponse = resp.json().await?;

        let text = parsed.text().ok_or_else(|| {
            IngestError::AlternativeExtractorUnavailable("empty model response".to_string())
        })?;
        parse_batch_response(&text, jobs.len())
    }
}

/// Numbered multi-job prompt asking for one JSON array per job
pub fn build_batch_prompt(jobs: &[JobText]) -> String {
    let numbered = jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let title = non_blank(job.title.as_deref()).unwrap_or("(none)");
            let description: String = non_blank(job.description.as_deref())
                .map(|d| d.chars().take(MAX_DESCRIPTION_CHARS).collect())
                .unwrap_or_else(|| "(none)".to_string());
            format!("Job {}.\nTitle: {}\nDescription:\n{}", i + 1, title, description)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "For each job below, extract only the technical skills and tools mentioned.\n\
         Return a JSON array of arrays: one array per job, in order. \
         Example: [[\"Python\",\"SQL\"], [\"AWS\",\"Kafka\"]].\n\
         No other text.\n\n{numbered}"
    )
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse the model's reply into one list per job.
///
/// Tolerates a surrounding markdown code fence. A reply that is not an array or
/// holds fewer entries than jobs is an error for the whole batch; an entry that is
/// not an array counts as an empty list.
pub fn parse_batch_response(raw: &str, expected: usize) -> Result<Vec<Vec<String>>> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(entries) = value else {
        return Err(IngestError::AlternativeExtractorUnavailable(
            "model reply is not a JSON array".to_string(),
        ));
    };
    if entries.len() < expected {
        return Err(IngestError::AlternativeExtractorUnavailable(format!(
            "model returned {} results for {} jobs",
            entries.len(),
            expected
        )));
    }

    Ok(entries
        .into_iter()
        .take(expected)
        .map(|entry| match entry {
            Value::Array(items) => items.iter().filter_map(skill_text).collect(),
            _ => Vec::new(),
        })
        .collect())
}

fn skill_text(item: &Value) -> Option<String> {
    let s = match item {
        Value::String(s) => s.trim().to_string(),
        Value::Null | Value::Bool(false) => return None,
        other => other.to_string(),
    };
    (!s.is_empty()).then_some(s)
}

fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    if !s.starts_with("```") {
        return s;
    }
    // Drop the opening fence line (which may carry a language tag) and a closing fence.
    let after_open = s.find('\n').map(|i| &s[i + 1..]).unwrap_or("");
    after_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(after_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: Option<&str>, description: Option<&str>) -> JobText {
        JobText {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn missing_key_is_unavailable() {
        let err = GeminiExtractor::new(None, None).err().unwrap();
        assert!(matches!(err, IngestError::AlternativeExtractorUnavailable(_)));
        assert!(GeminiExtractor::new(Some("  ".into()), None).is_err());
    }

    #[test]
    fn prompt_numbers_jobs_and_truncates_descriptions() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 50);
        let prompt = build_batch_prompt(&[job(Some("Data Engineer"), Some(&long)), job(None, None)]);
        assert!(prompt.contains("Job 1.\nTitle: Data Engineer"));
        assert!(prompt.contains("Job 2.\nTitle: (none)\nDescription:\n(none)"));
        assert!(prompt.contains(&"x".repeat(MAX_DESCRIPTION_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_DESCRIPTION_CHARS + 1)));
        assert!(prompt.contains("JSON array of arrays"));
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain = r#"[["Python", " SQL "], ["AWS"]]"#;
        assert_eq!(
            parse_batch_response(plain, 2).unwrap(),
            vec![vec!["Python".to_string(), "SQL".to_string()], vec!["AWS".to_string()]]
        );

        let fenced = "```json\n[[\"Kafka\"], []]\n```";
        assert_eq!(
            parse_batch_response(fenced, 2).unwrap(),
            vec![vec!["Kafka".to_string()], vec![]]
        );
    }

    #[test]
    fn non_array_entries_become_empty_lists() {
        let reply = r#"[["Python"], "oops", ["", null]]"#;
        let parsed = parse_batch_response(reply, 3).unwrap();
        assert_eq!(parsed[1], Vec::<String>::new());
        assert_eq!(parsed[2], Vec::<String>::new());
    }

    #[test]
    fn short_or_invalid_replies_fail_the_batch() {
        assert!(parse_batch_response(r#"[["Python"]]"#, 2).is_err());
        assert!(parse_batch_response("I cannot help with that", 1).is_err());
        assert!(parse_batch_response(r#"{"skills": []}"#, 1).is_err());
    }

    #[test]
    fn response_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "[[\"SQL\"]" }, { "text": "]" }] } }]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("[[\"SQL\"]]"));
    }
}
