//! Stats module — in-memory aggregation of classified records.

pub mod memory;

pub use memory::{MemorySink, Summary, SummaryEntry};
