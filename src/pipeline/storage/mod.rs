// Pipeline storage: in-process batch sinks

pub mod in_memory;

pub use in_memory::InMemoryBatchSink;
