use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{IngestError, Result};

const BUILTIN_TAXONOMY: &str = include_str!("../../../../config/skills_taxonomy.toml");

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    version: u32,
    #[serde(default, rename = "skill")]
    skills: Vec<SkillEntry>,
}

#[derive(Debug, Deserialize)]
struct SkillEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// One canonical skill with its compiled alias matcher
#[derive(Debug)]
pub struct Skill {
    pub name: String,
    pub aliases: Vec<String>,
    pattern: Regex,
}

impl Skill {
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Read-only mapping from canonical skill names to their aliases.
///
/// Built once per run; every alias regex is compiled at load time and shared
/// by all extraction calls.
#[derive(Debug)]
pub struct SkillTaxonomy {
    version: u32,
    skills: Vec<Skill>,
    /// Lower-cased alias (including the canonical name) -> index into `skills`
    lookup: HashMap<String, usize>,
}

impl SkillTaxonomy {
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TAXONOMY)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::TaxonomyConfig(format!(
                "Failed to read taxonomy '{}': {}",
                path.display(),
                e
            ))
        })?;
        let taxonomy = Self::from_toml_str(&content)?;
        info!(path = %path.display(), skills = taxonomy.len(), "loaded skill taxonomy");
        Ok(taxonomy)
    }

    /// Parse and validate a taxonomy. Overlapping aliases across skills are rejected.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TaxonomyFile = toml::from_str(content)
            .map_err(|e| IngestError::TaxonomyConfig(format!("invalid taxonomy: {e}")))?;

        let mut skills = Vec::with_capacity(file.skills.len());
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for entry in file.skills {
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                return Err(IngestError::TaxonomyConfig(
                    "skill with an empty name".to_string(),
                ));
            }
            let index = skills.len();

            let mut forms: Vec<String> = Vec::with_capacity(entry.aliases.len() + 1);
            for alias in std::iter::once(&name).chain(entry.aliases.iter()) {
                let folded = alias.trim().to_lowercase();
                if folded.is_empty() {
                    return Err(IngestError::TaxonomyConfig(format!(
                        "skill '{name}' has an empty alias"
                    )));
                }
                match lookup.get(&folded) {
                    Some(&owner) if owner == index => continue,
                    Some(&owner) => {
                        let other: &Skill = &skills[owner];
                        return Err(IngestError::TaxonomyConfig(format!(
                            "alias '{}' is claimed by both '{}' and '{}'",
                            folded, other.name, name
                        )));
                    }
                    None => {
                        lookup.insert(folded.clone(), index);
                        forms.push(folded);
                    }
                }
            }

            let pattern = compile_alias_pattern(&forms)?;
            skills.push(Skill {
                name,
                aliases: entry.aliases,
                pattern,
            });
        }

        Ok(Self {
            version: file.version,
            skills,
            lookup,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Skills in canonical iteration order
    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.skills.iter().any(|s| s.name == canonical)
    }

    /// Canonical name for an alias or canonical name, case-insensitively
    pub fn canonicalize(&self, surface: &str) -> Option<&str> {
        let key = surface.trim().to_lowercase();
        self.lookup
            .get(&key)
            .map(|&i| self.skills[i].name.as_str())
    }
}

/// Whole-word, case-insensitive alternation over every surface form.
///
/// Word boundaries are explicit non-word characters rather than `\b`, so forms
/// that start or end in punctuation ("c++", ".net") still match.
fn compile_alias_pattern(forms: &[String]) -> Result<Regex> {
    let mut sorted: Vec<&String> = forms.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = sorted
        .iter()
        .map(|f| regex::escape(f))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)(?:^|[^\w])(?:{alternation})(?:[^\w]|$)"))
        .map_err(|e| IngestError::TaxonomyConfig(format!("invalid alias pattern: {e}")))
}
