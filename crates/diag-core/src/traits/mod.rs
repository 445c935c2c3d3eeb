//! Core trait definitions

mod sink;

pub use sink::{DiagnosticSink, MemorySink, TracingSink};
