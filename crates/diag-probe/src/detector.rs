//! Handshake detection on daemon stdout
//!
//! `butler daemon` announces where it listens with a single JSON line:
//!
//! ```text
//! {"type":"butlerd/listen-notification","secret":"...","tcp":{"address":"127.0.0.1:51234"}}
//! ```
//!
//! The detector and the handshake deadline timer both report into one
//! [`HandshakeSlot`]. Whichever writes first decides the outcome; later
//! writes are dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use diag_core::{DiagnosticSink, Level};
use diag_protocol::{parse_daemon_line, DaemonLine, HandshakeError, HandshakeMessage};
use tokio::sync::oneshot;

use crate::relay::{Classifier, LineDisposition};

/// How the wait for the listen notification ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The daemon announced a usable address
    Listening(HandshakeMessage),
    /// The daemon announced itself with an unusable notification
    Rejected(HandshakeError),
    /// The deadline elapsed first
    TimedOut(Duration),
}

/// Single-slot, first-write-wins channel for the handshake race
#[derive(Clone)]
pub struct HandshakeSlot {
    sender: Arc<Mutex<Option<oneshot::Sender<Discovery>>>>,
}

impl HandshakeSlot {
    pub fn new() -> (Self, oneshot::Receiver<Discovery>) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (slot, rx)
    }

    /// Offer a value. Returns `true` if this write won the slot.
    pub fn fill(&self, discovery: Discovery) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            // A dropped receiver still counts as won: nobody else may write
            Some(tx) => {
                let _ = tx.send(discovery);
                true
            }
            None => false,
        }
    }

    pub fn is_filled(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Classifies stdout lines and signals the first listen notification
pub struct HandshakeDetector {
    slot: HandshakeSlot,
    sink: Arc<dyn DiagnosticSink>,
}

impl HandshakeDetector {
    pub fn new(slot: HandshakeSlot, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { slot, sink }
    }

    /// Look at one line of stdout.
    ///
    /// Listen notifications are always consumed so the secret never reaches
    /// the raw relay output. Only the first one signals.
    pub fn classify(&self, line: &str) -> LineDisposition {
        match parse_daemon_line(line) {
            Ok(Some(DaemonLine::Listen(handshake))) => {
                let summary = format!(
                    "butlerd listening on {} {} (secret {})",
                    handshake.transport,
                    handshake.address,
                    handshake.secret.redacted()
                );
                if self.slot.fill(Discovery::Listening(handshake)) {
                    self.sink.info(&summary);
                } else {
                    self.sink.debug(&format!("Ignoring extra notification: {}", summary));
                }
                LineDisposition::Consumed
            }
            Err(err) => {
                if self.slot.fill(Discovery::Rejected(err.clone())) {
                    self.sink.error(&format!("Unusable listen notification: {}", err));
                } else {
                    self.sink.debug(&format!("Ignoring extra notification: {}", err));
                }
                LineDisposition::Consumed
            }
            Ok(_) => LineDisposition::Unhandled,
        }
    }
}

/// Classifier chain for daemon stdout.
///
/// The handshake detector goes first. Structured `log` lines from
/// `butler --json` are then re-emitted at their own level; everything else
/// falls through to the relay's default sink.
pub fn stdout_classifier(detector: HandshakeDetector) -> Classifier {
    let sink = detector.sink.clone();
    Box::new(move |line: &str| {
        if detector.classify(line) == LineDisposition::Consumed {
            return LineDisposition::Consumed;
        }
        match parse_daemon_line(line) {
            Ok(Some(DaemonLine::Log { level, message })) => {
                sink.log(Level::from_daemon(&level), &format!("[butler] {}", message));
                LineDisposition::Consumed
            }
            _ => LineDisposition::Unhandled,
        }
    })
}

/// Fill `slot` with a timeout once `limit` elapses, unless cancelled first
pub async fn deadline_timer(
    slot: HandshakeSlot,
    limit: Duration,
    cancel: tokio_util::sync::CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(limit) => {
            if slot.fill(Discovery::TimedOut(limit)) {
                tracing::debug!("Handshake deadline of {:?} elapsed", limit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_core::MemorySink;
    use diag_protocol::TransportKind;

    const LISTEN_TCP: &str = r#"{"type":"butlerd/listen-notification","secret":"s3cr3t-value","tcp":{"address":"127.0.0.1:9999"}}"#;
    const LISTEN_HTTP: &str = r#"{"type":"butlerd/listen-notification","secret":"other","http":{"address":"127.0.0.1:8888"}}"#;

    fn detector() -> (HandshakeDetector, oneshot::Receiver<Discovery>, Arc<MemorySink>) {
        let (slot, rx) = HandshakeSlot::new();
        let sink = Arc::new(MemorySink::new());
        (HandshakeDetector::new(slot, sink.clone()), rx, sink)
    }

    #[test]
    fn test_fires_once_on_first_valid_line_among_noise() {
        let lines = [
            "starting up",
            "{not json",
            r#"{"type":"log","level":"info","message":"hello"}"#,
            r#"{"no_type":true}"#,
            LISTEN_TCP,
            "more noise",
            LISTEN_HTTP,
        ];

        let (detector, mut rx, _sink) = detector();
        let dispositions: Vec<_> = lines.iter().map(|l| detector.classify(l)).collect();

        assert_eq!(
            dispositions,
            vec![
                LineDisposition::Unhandled,
                LineDisposition::Unhandled,
                LineDisposition::Unhandled,
                LineDisposition::Unhandled,
                LineDisposition::Consumed,
                LineDisposition::Unhandled,
                LineDisposition::Consumed,
            ]
        );

        match rx.try_recv().unwrap() {
            Discovery::Listening(handshake) => {
                assert_eq!(handshake.transport, TransportKind::Tcp);
                assert_eq!(handshake.address, "127.0.0.1:9999");
                assert_eq!(handshake.secret.expose(), "s3cr3t-value");
            }
            other => panic!("unexpected discovery: {:?}", other),
        }
    }

    #[test]
    fn test_position_does_not_matter() {
        for position in 0..4 {
            let mut lines = vec!["a", "b", "c"];
            lines.insert(position, LISTEN_HTTP);

            let (detector, mut rx, _sink) = detector();
            for line in &lines {
                detector.classify(line);
            }
            assert!(matches!(
                rx.try_recv().unwrap(),
                Discovery::Listening(h) if h.transport == TransportKind::Http
            ));
        }
    }

    #[test]
    fn test_missing_secret_is_rejected_not_ignored() {
        let (detector, mut rx, sink) = detector();
        let disposition = detector.classify(
            r#"{"type":"butlerd/listen-notification","tcp":{"address":"127.0.0.1:1"}}"#,
        );

        assert_eq!(disposition, LineDisposition::Consumed);
        assert_eq!(
            rx.try_recv().unwrap(),
            Discovery::Rejected(HandshakeError::MissingSecret)
        );
        assert_eq!(sink.messages_at(Level::Error).len(), 1);
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let (detector, mut rx, _sink) = detector();
        detector.classify(r#"{"type":"butlerd/listen-notification","secret":"x","tcp":{}}"#);
        assert_eq!(
            rx.try_recv().unwrap(),
            Discovery::Rejected(HandshakeError::MissingAddress)
        );
    }

    #[test]
    fn test_secret_is_never_logged_in_full() {
        let (detector, _rx, sink) = detector();
        detector.classify(LISTEN_TCP);
        detector.classify(LISTEN_TCP);

        assert!(sink.contains("s3****"));
        assert!(!sink.contains("s3cr3t-value"));
    }

    #[test]
    fn test_slot_first_write_wins() {
        let (slot, mut rx) = HandshakeSlot::new();
        let other = slot.clone();

        assert!(!slot.is_filled());
        assert!(other.fill(Discovery::TimedOut(Duration::from_secs(1))));
        assert!(!slot.fill(Discovery::Rejected(HandshakeError::MissingSecret)));
        assert!(slot.is_filled());
        assert_eq!(rx.try_recv().unwrap(), Discovery::TimedOut(Duration::from_secs(1)));
    }

    #[test]
    fn test_stdout_chain_relevels_butler_logs() {
        let (slot, _rx) = HandshakeSlot::new();
        let sink = Arc::new(MemorySink::new());
        let mut classify = stdout_classifier(HandshakeDetector::new(slot, sink.clone()));

        assert_eq!(
            classify(r#"{"type":"log","level":"warning","message":"disk almost full"}"#),
            LineDisposition::Consumed
        );
        assert_eq!(classify("plain text"), LineDisposition::Unhandled);
        assert_eq!(
            sink.messages_at(Level::Warn),
            vec!["[butler] disk almost full".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fills_slot_after_deadline() {
        let (slot, rx) = HandshakeSlot::new();
        let cancel = tokio_util::sync::CancellationToken::new();
        tokio::spawn(deadline_timer(slot, Duration::from_secs(5), cancel));

        assert_eq!(rx.await.unwrap(), Discovery::TimedOut(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_leaves_slot_empty() {
        let (slot, _rx) = HandshakeSlot::new();
        let cancel = tokio_util::sync::CancellationToken::new();
        let timer = tokio::spawn(deadline_timer(slot.clone(), Duration::from_secs(5), cancel.clone()));

        cancel.cancel();
        timer.await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!slot.is_filled());
    }
}
