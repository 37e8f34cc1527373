// Skill enrichment: the alias taxonomy and the deterministic extractor over it

pub mod extractor;
pub mod taxonomy;

pub use extractor::TaxonomySkillExtractor;
pub use taxonomy::{Skill, SkillTaxonomy};
