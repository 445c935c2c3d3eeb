//! Labeled check harness
//!
//! Each diagnostic runs as a named check. A failing check is reported with
//! its label and the run moves on to the next one.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::traits::DiagnosticSink;

/// Result of one check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub label: String,
    pub elapsed: Duration,
    /// Rendered error, `None` if the check passed
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs checks in sequence and keeps their outcomes
pub struct CheckHarness {
    sink: Arc<dyn DiagnosticSink>,
    outcomes: Vec<CheckOutcome>,
}

impl CheckHarness {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            outcomes: Vec::new(),
        }
    }

    /// Sink the checks report into
    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    /// Run one labeled check.
    ///
    /// Returns the check's value on success. On failure the error is logged
    /// as a warning and `None` is returned so the caller can carry on.
    pub async fn run<F, Fut, T, E>(&mut self, label: &str, check: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.sink.debug(&format!("{}...", label));
        let started = Instant::now();

        let result = check().await;
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                self.sink.success(&format!("{} ({} ms)", label, elapsed.as_millis()));
                self.outcomes.push(CheckOutcome {
                    label: label.to_string(),
                    elapsed,
                    error: None,
                });
                Some(value)
            }
            Err(e) => {
                let rendered = format!("{:#}", e);
                self.sink
                    .warn(&format!("While doing '{}': {}", label, rendered));
                self.outcomes.push(CheckOutcome {
                    label: label.to_string(),
                    elapsed,
                    error: Some(rendered),
                });
                None
            }
        }
    }

    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    /// Checks that did not pass
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MemorySink;
    use crate::types::Level;

    #[tokio::test]
    async fn test_passing_check_returns_value() {
        let sink = Arc::new(MemorySink::new());
        let mut harness = CheckHarness::new(sink.clone());

        let value = harness
            .run("Counting", || async { Ok::<_, String>(3) })
            .await;

        assert_eq!(value, Some(3));
        assert!(harness.all_passed());
        assert_eq!(sink.messages_at(Level::Debug), vec!["Counting...".to_string()]);
        assert_eq!(sink.messages_at(Level::Success).len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_run_continues() {
        let sink = Arc::new(MemorySink::new());
        let mut harness = CheckHarness::new(sink.clone());

        let first: Option<()> = harness
            .run("Checking butler", || async { Err("butler.exe: not found") })
            .await;
        let second = harness.run("Next", || async { Ok::<_, String>("ok") }).await;

        assert!(first.is_none());
        assert_eq!(second, Some("ok"));
        assert!(!harness.all_passed());
        assert_eq!(
            sink.messages_at(Level::Warn),
            vec!["While doing 'Checking butler': butler.exe: not found".to_string()]
        );

        let failures: Vec<_> = harness.failures().map(|o| o.label.as_str()).collect();
        assert_eq!(failures, vec!["Checking butler"]);
        assert_eq!(harness.outcomes().len(), 2);
    }
}
