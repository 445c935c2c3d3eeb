//! End-to-end probe runs against the stub daemon binary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use diag_core::config::ProbeConfig;
use diag_core::process::{is_process_alive, read_pid_file};
use diag_core::{Level, MemorySink};
use diag_probe::{
    butler_version, DaemonCommand, FailureCategory, Probe, ProbeError, ProbePhase,
    ProbeState, TransportError,
};
use diag_protocol::{HandshakeError, TransportKind};

const STUB: &str = env!("CARGO_BIN_EXE_butlerd-stub");

struct Fixture {
    dir: TempDir,
    sink: Arc<MemorySink>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("butler.db"), b"").unwrap();
        Self {
            dir,
            sink: Arc::new(MemorySink::new()),
        }
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("butler.db")
    }

    fn pid_file(&self) -> PathBuf {
        self.dir.path().join("stub.pid")
    }

    fn probe(&self, mode: &str, transport: Option<TransportKind>, config: ProbeConfig) -> Probe {
        let command = DaemonCommand::butlerd(STUB, &self.database(), transport)
            .env("STUB_MODE", mode)
            .env("STUB_SECRET", "stub-secret")
            .env("STUB_PROFILES", "Ada,Grace")
            .env("STUB_PID_FILE", self.pid_file())
            .env("RUST_LOG", "warn");
        Probe::new(command, self.database(), config, self.sink.clone())
    }

    fn assert_stub_gone(&self) {
        let pid = read_pid_file(&self.pid_file())
            .unwrap()
            .expect("stub wrote no pid");
        assert!(!is_process_alive(pid), "stub {} still running", pid);
    }
}

fn config() -> ProbeConfig {
    ProbeConfig {
        handshake_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
        call_timeout: Duration::from_secs(2),
        shutdown_grace: Duration::from_secs(2),
        ..ProbeConfig::default()
    }
}

#[tokio::test]
async fn test_tcp_probe_lists_profiles() {
    let fx = Fixture::new();
    let mut probe = fx.probe("normal", Some(TransportKind::Tcp), config());

    let report = probe.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.transport, TransportKind::Tcp);
    let names: Vec<_> = report.profiles.iter().map(|p| p.label()).collect();
    assert_eq!(names, ["Ada", "Grace"]);
    assert_eq!(probe.state(), ProbeState::Succeeded);
    assert!(fx
        .sink
        .messages_at(Level::Info)
        .iter()
        .any(|m| m == &format!("[butler] using database {}", fx.database().display())));
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_http_probe_lists_profiles() {
    let fx = Fixture::new();
    let mut probe = fx.probe("normal", Some(TransportKind::Http), config());

    let report = probe.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.transport, TransportKind::Http);
    assert_eq!(report.profiles.len(), 2);
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_probe_follows_announced_transport() {
    let fx = Fixture::new();
    let command = DaemonCommand::butlerd(STUB, &fx.database(), None)
        .env("STUB_TRANSPORT", "http")
        .env("STUB_PROFILES", "");
    let mut probe = Probe::new(command, fx.database(), config(), fx.sink.clone());

    let report = probe.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.transport, TransportKind::Http);
    assert!(report.profiles.is_empty());
}

#[tokio::test]
async fn test_silent_daemon_times_out_and_is_killed() {
    let fx = Fixture::new();
    let mut probe = fx.probe(
        "silent",
        None,
        ProbeConfig {
            handshake_timeout: Duration::from_millis(500),
            ..config()
        },
    );

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.phase, ProbePhase::AwaitingHandshake);
    assert!(matches!(failure.error, ProbeError::Timeout(_)));
    assert_eq!(failure.category(), FailureCategory::NeverAnnounced);
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_exiting_daemon_is_reported() {
    let fx = Fixture::new();
    let mut probe = fx.probe("exit", None, config());

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(failure.error, ProbeError::DaemonExited(_)));
    assert!(fx
        .sink
        .entries()
        .iter()
        .any(|(_, m)| m.contains("could not open database")));
}

#[tokio::test]
async fn test_missing_secret_is_a_detection_failure() {
    let fx = Fixture::new();
    let mut probe = fx.probe("no-secret", None, config());

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ProbeError::Detection(HandshakeError::MissingSecret)
    ));
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_application_error_over_tcp() {
    let fx = Fixture::new();
    let mut probe = fx.probe("app-error", Some(TransportKind::Tcp), config());

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.phase, ProbePhase::Verifying);
    match &failure.error {
        ProbeError::Application(e) => assert_eq!(e.message, "database is locked"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(failure.category(), FailureCategory::ApplicationError);
}

#[tokio::test]
async fn test_garbage_over_http_is_an_invalid_reply() {
    let fx = Fixture::new();
    let mut probe = fx.probe("garbage", Some(TransportKind::Http), config());

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.category(), FailureCategory::InvalidReply);
}

#[tokio::test]
async fn test_server_error_over_http() {
    let fx = Fixture::new();
    let mut probe = fx.probe("server-error", Some(TransportKind::Http), config());

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ProbeError::Transport(TransportError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_slow_reply_hits_call_deadline() {
    let fx = Fixture::new();
    let mut probe = fx.probe(
        "slow",
        Some(TransportKind::Tcp),
        ProbeConfig {
            call_timeout: Duration::from_millis(300),
            ..config()
        },
    );

    let failure = probe.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ProbeError::Transport(TransportError::Timeout { .. })
    ));
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_cancel_while_verifying_kills_the_stub() {
    let fx = Fixture::new();
    let mut probe = fx.probe(
        "slow",
        Some(TransportKind::Http),
        ProbeConfig {
            call_timeout: Duration::from_secs(30),
            ..config()
        },
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        trigger.cancel();
    });

    let failure = probe.run(&cancel).await.unwrap_err();

    assert!(matches!(failure.error, ProbeError::Cancelled));
    fx.assert_stub_gone();
}

#[tokio::test]
async fn test_stub_version() {
    let version = butler_version(std::path::Path::new(STUB), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(version.starts_with("v15.21.0-stub"));
}

