pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

// Structured logging and stage counters
pub mod observability;
