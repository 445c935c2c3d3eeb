//! Leveled diagnostic output

use std::sync::Mutex;

use crate::types::Level;

/// Destination for human-readable diagnostic messages.
///
/// The probe and the check harness report through this trait instead of a
/// global logger so a run can be captured, rendered, or asserted on.
pub trait DiagnosticSink: Send + Sync {
    /// Record one message
    fn log(&self, level: Level, message: &str);

    /// Record a debug message
    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    /// Record an informational message
    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    /// Record a passed check
    fn success(&self, message: &str) {
        self.log(Level::Success, message);
    }

    /// Record a warning
    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    /// Record an error
    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Sink that forwards every message to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Success => tracing::info!(success = true, "{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
    }
}

/// Sink that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Messages recorded at `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// Whether any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|(_, m)| m.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.debug("one");
        sink.warn("two");
        sink.success("three");

        assert_eq!(
            sink.entries(),
            vec![
                (Level::Debug, "one".to_string()),
                (Level::Warn, "two".to_string()),
                (Level::Success, "three".to_string()),
            ]
        );
        assert_eq!(sink.messages_at(Level::Warn), vec!["two".to_string()]);
        assert!(sink.contains("thr"));
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<Box<dyn DiagnosticSink>> = vec![Box::new(TracingSink), Box::new(MemorySink::new())];
        for sink in &sinks {
            sink.info("hello");
        }
    }
}
