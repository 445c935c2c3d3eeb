//! Line relay for daemon output streams
//!
//! A relay reads one output stream of the daemon line by line. Each line is
//! offered to an optional classifier first; anything the classifier does not
//! consume is written to the diagnostic sink at debug level, tagged with the
//! relay's label. Read errors end the relay quietly since the output is only
//! there for visibility.

use std::sync::Arc;

use diag_core::DiagnosticSink;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default longest line inspected; the rest of an overlong line is dropped
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// What a classifier did with a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDisposition {
    /// Handled, not relayed further
    Consumed,
    /// Falls through to the default sink
    Unhandled,
}

/// Classifier invoked on every line before it reaches the sink
pub type Classifier = Box<dyn FnMut(&str) -> LineDisposition + Send>;

pub struct LineRelay<R> {
    reader: BufReader<R>,
    label: String,
    classifier: Option<Classifier>,
    sink: Arc<dyn DiagnosticSink>,
    max_line_length: usize,
}

impl<R> LineRelay<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, label: impl Into<String>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            reader: BufReader::new(reader),
            label: label.into(),
            classifier: None,
            sink,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(1);
        self
    }

    /// Relay lines until the stream ends or `cancel` fires.
    ///
    /// Returns the number of lines read.
    pub async fn run(mut self, cancel: CancellationToken) -> usize {
        let mut count = 0;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    count += 1;
                    self.dispatch(&line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::trace!(label = %self.label, "Relay stopped: {}", e);
                    break;
                }
            }
        }

        tracing::trace!(label = %self.label, lines = count, "Relay finished");
        count
    }

    /// Run the relay on its own task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<usize> {
        tokio::spawn(self.run(cancel))
    }

    fn dispatch(&mut self, line: &str) {
        if let Some(classifier) = self.classifier.as_mut() {
            if classifier(line) == LineDisposition::Consumed {
                return;
            }
        }
        self.sink.debug(&format!("[{}] {}", self.label, line));
    }

    /// Read one line, keeping at most `max_line_length` bytes of it
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let max = self.max_line_length;
        let mut line = Vec::new();
        let mut saw_bytes = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if !saw_bytes {
                    return Ok(None);
                }
                break;
            }
            saw_bytes = true;

            let (chunk_len, used, done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i, i + 1, true),
                None => (available.len(), available.len(), false),
            };

            let room = max.saturating_sub(line.len());
            line.extend_from_slice(&available[..chunk_len.min(room)]);
            self.reader.consume(used);

            if done {
                break;
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_core::{Level, MemorySink};
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;

    fn relay_of(input: &'static [u8], sink: Arc<MemorySink>) -> LineRelay<&'static [u8]> {
        LineRelay::new(input, "stdout", sink)
    }

    #[tokio::test]
    async fn test_unclassified_lines_reach_sink_in_order() {
        let sink = Arc::new(MemorySink::new());
        let count = relay_of(b"first\r\nsecond\nlast", sink.clone())
            .run(CancellationToken::new())
            .await;

        assert_eq!(count, 3);
        assert_eq!(
            sink.messages_at(Level::Debug),
            vec!["[stdout] first", "[stdout] second", "[stdout] last"]
        );
    }

    #[tokio::test]
    async fn test_consumed_lines_are_not_relayed() {
        let sink = Arc::new(MemorySink::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_classifier = seen.clone();

        relay_of(b"keep\nskip\nkeep\n", sink.clone())
            .with_classifier(Box::new(move |line| {
                seen_by_classifier.lock().unwrap().push(line.to_string());
                if line == "skip" {
                    LineDisposition::Consumed
                } else {
                    LineDisposition::Unhandled
                }
            }))
            .run(CancellationToken::new())
            .await;

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(sink.messages_at(Level::Debug), vec!["[stdout] keep", "[stdout] keep"]);
    }

    #[tokio::test]
    async fn test_overlong_line_is_truncated() {
        let sink = Arc::new(MemorySink::new());
        relay_of(b"abcdefghij\nxy\n", sink.clone())
            .with_max_line_length(4)
            .run(CancellationToken::new())
            .await;

        assert_eq!(sink.messages_at(Level::Debug), vec!["[stdout] abcd", "[stdout] xy"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let sink = Arc::new(MemorySink::new());
        relay_of(b"ok \xff\n", sink.clone())
            .run(CancellationToken::new())
            .await;

        assert_eq!(sink.messages_at(Level::Debug), vec!["[stdout] ok \u{fffd}"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_a_blocked_relay() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"one\n").await.unwrap();

        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();
        let handle = LineRelay::new(reader, "stderr", sink.clone()).spawn(cancel.clone());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let count = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("relay should stop on cancel")
            .unwrap();
        assert_eq!(count, 1);
        drop(writer);
    }
}
