// Pipeline processing: column normalization, record filtering, and skill enrichment

pub mod enrich;
pub mod normalize;
pub mod quality_gate;
