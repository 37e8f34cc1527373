// Observability: structured logging and stage counters

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init;
