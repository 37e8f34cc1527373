pub mod ports;
pub mod ingest_use_case;
pub mod compare_use_case;
