use std::sync::Arc;

use super::taxonomy::SkillTaxonomy;
use crate::domain::join_text;

/// Deterministic skill extractor backed by a shared taxonomy.
///
/// Holds no mutable state; clones share the compiled taxonomy and can be used
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct TaxonomySkillExtractor {
    taxonomy: Arc<SkillTaxonomy>,
}

impl TaxonomySkillExtractor {
    pub fn new(taxonomy: Arc<SkillTaxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &SkillTaxonomy {
        &self.taxonomy
    }

    /// Extract from a title and description, either of which may be absent
    pub fn extract(&self, title: Option<&str>, description: Option<&str>) -> Vec<String> {
        self.extract_text(&join_text(title, description))
    }

    /// Canonical skills mentioned in `text`, in taxonomy order, without duplicates
    pub fn extract_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.taxonomy
            .skills()
            .iter()
            .filter(|skill| skill.is_mentioned_in(text))
            .map(|skill| skill.name.clone())
            .collect()
    }
}
