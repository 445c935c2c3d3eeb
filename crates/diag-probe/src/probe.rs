//! butlerd verification probe
//!
//! One [`Probe::run`] launches `butler daemon`, waits for it to announce
//! where it listens, connects with the announced transport and checks that
//! `Profile.List` answers with well-formed profiles.
//!
//! ```text
//! Idle -> Launching -> AwaitingHandshake -> Connected -> Verifying -> Succeeded
//!            \                \                 \             \
//!             `----------------`-----------------`-------------`--> Failed
//! ```
//!
//! Any error ends the run. The daemon is shut down on every path.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use diag_core::config::ProbeConfig;
use diag_core::layout::ensure_file;
use diag_core::{DiagnosticSink, ItchLayout, PreconditionError};
use diag_protocol::butlerd::{methods, Profile, ProfileList};
use diag_protocol::{CallId, HandshakeMessage, TransportKind};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::detector::{deadline_timer, stdout_classifier, Discovery, HandshakeDetector, HandshakeSlot};
use crate::error::{ProbeError, ProbeFailure, ProbePhase};
use crate::relay::LineRelay;
use crate::supervisor::{DaemonCommand, DaemonProcess};
use crate::transport::{call_typed, connect_transport, Transport, TransportOptions};

/// How long to keep reading stdout after the daemon exits early, in case the
/// notification is still in the pipe
const EXIT_DRAIN: Duration = Duration::from_millis(200);

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Launching,
    AwaitingHandshake,
    Connected,
    Verifying,
    Succeeded,
    Failed,
}

/// What a successful run found
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub transport: TransportKind,
    pub address: String,
    pub profiles: Vec<Profile>,
    /// Call ids in the order they were issued
    pub issued_ids: Vec<CallId>,
    pub elapsed: Duration,
}

pub struct Probe {
    command: DaemonCommand,
    database: PathBuf,
    config: ProbeConfig,
    sink: Arc<dyn DiagnosticSink>,
    state: ProbeState,
    history: Vec<ProbeState>,
}

impl Probe {
    pub fn new(
        command: DaemonCommand,
        database: impl Into<PathBuf>,
        config: ProbeConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            command,
            database: database.into(),
            config,
            sink,
            state: ProbeState::Idle,
            history: vec![ProbeState::Idle],
        }
    }

    /// Probe the butler install described by `layout`
    pub fn from_layout(
        layout: &ItchLayout,
        config: ProbeConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, PreconditionError> {
        let database = layout.database_path();
        let command =
            DaemonCommand::butlerd(layout.butler_executable()?, &database, config.transport);
        Ok(Self::new(command, database, config, sink))
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Every state the last run went through
    pub fn history(&self) -> &[ProbeState] {
        &self.history
    }

    fn enter(&mut self, state: ProbeState) {
        tracing::debug!(from = ?self.state, to = ?state, "Probe state");
        self.state = state;
        self.history.push(state);
    }

    /// Run the probe once. Cancelling `cancel` abandons the run and kills the
    /// daemon.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ProbeReport, ProbeFailure> {
        let started = Instant::now();
        self.state = ProbeState::Idle;
        self.history = vec![ProbeState::Idle];

        let mut ctx = RunContext::new(self.sink.clone());
        let result = self.drive(&mut ctx, cancel).await;

        match result {
            Ok((handshake, profiles)) => {
                self.enter(ProbeState::Succeeded);
                Ok(ProbeReport {
                    transport: handshake.transport,
                    address: handshake.address,
                    profiles,
                    issued_ids: ctx.issued_ids().to_vec(),
                    elapsed: started.elapsed(),
                })
            }
            Err(failure) => {
                self.enter(ProbeState::Failed);
                tracing::debug!(category = %failure.category(), "Probe failed: {}", failure);
                Err(failure)
            }
        }
    }

    async fn drive(
        &mut self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<(HandshakeMessage, Vec<Profile>), ProbeFailure> {
        ensure_file(&self.database)
            .map_err(|e| ProbeFailure::new(ProbePhase::Precondition, e))?;

        self.enter(ProbeState::Launching);
        self.sink.debug(&format!("Launching {}", self.command));

        let scope = cancel.child_token();
        let mut daemon = self
            .command
            .start(&scope)
            .map_err(|e| ProbeFailure::new(ProbePhase::Launching, e))?;

        let (slot, discovery) = HandshakeSlot::new();
        let relays = self.spawn_relays(&mut daemon, slot.clone(), &scope);

        let outcome = self.converse(ctx, &daemon, slot, discovery, &scope).await;

        // Killing the daemon closes its pipes, which lets the relays drain
        daemon.shutdown(self.config.shutdown_grace).await;
        for relay in relays {
            if tokio::time::timeout(self.config.shutdown_grace, relay).await.is_err() {
                tracing::debug!("Relay still reading after shutdown");
            }
        }
        scope.cancel();

        outcome
    }

    fn spawn_relays(
        &self,
        daemon: &mut DaemonProcess,
        slot: HandshakeSlot,
        scope: &CancellationToken,
    ) -> Vec<JoinHandle<usize>> {
        let mut relays = Vec::new();

        if let Some(stdout) = daemon.take_stdout() {
            let detector = HandshakeDetector::new(slot, self.sink.clone());
            relays.push(
                LineRelay::new(stdout, "stdout", self.sink.clone())
                    .with_classifier(stdout_classifier(detector))
                    .with_max_line_length(self.config.max_line_length)
                    .spawn(scope.child_token()),
            );
        }
        if let Some(stderr) = daemon.take_stderr() {
            relays.push(
                LineRelay::new(stderr, "stderr", self.sink.clone())
                    .with_max_line_length(self.config.max_line_length)
                    .spawn(scope.child_token()),
            );
        }

        relays
    }

    async fn converse(
        &mut self,
        ctx: &mut RunContext,
        daemon: &DaemonProcess,
        slot: HandshakeSlot,
        discovery: oneshot::Receiver<Discovery>,
        cancel: &CancellationToken,
    ) -> Result<(HandshakeMessage, Vec<Profile>), ProbeFailure> {
        self.enter(ProbeState::AwaitingHandshake);
        let handshake = self
            .await_handshake(daemon, slot, discovery, cancel)
            .await
            .map_err(|e| ProbeFailure::new(ProbePhase::AwaitingHandshake, e))?;

        self.enter(ProbeState::Connected);
        let options = TransportOptions::from(&self.config);
        let mut transport = until_cancelled(cancel, connect_transport(&handshake, &options))
            .await
            .and_then(|r| r.map_err(ProbeError::from))
            .map_err(|e| ProbeFailure::new(ProbePhase::Connecting, e))?;

        self.enter(ProbeState::Verifying);
        let verified = self.verify(transport.as_mut(), ctx, cancel).await;
        transport.close().await;

        let profiles = verified.map_err(|e| ProbeFailure::new(ProbePhase::Verifying, e))?;
        Ok((handshake, profiles))
    }

    /// Race the detector against the deadline timer, the daemon exiting and
    /// the caller cancelling
    async fn await_handshake(
        &self,
        daemon: &DaemonProcess,
        slot: HandshakeSlot,
        mut discovery: oneshot::Receiver<Discovery>,
        cancel: &CancellationToken,
    ) -> Result<HandshakeMessage, ProbeError> {
        let limit = self.config.handshake_timeout;
        let timer_token = cancel.child_token();
        let timer = tokio::spawn(deadline_timer(slot, limit, timer_token.clone()));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            found = &mut discovery => discovered(found, limit),
            exit = daemon.wait_exit() => {
                match tokio::time::timeout(EXIT_DRAIN, &mut discovery).await {
                    Ok(found @ Ok(Discovery::Listening(_)))
                    | Ok(found @ Ok(Discovery::Rejected(_))) => discovered(found, limit),
                    _ => Err(ProbeError::DaemonExited(exit.to_string())),
                }
            }
        };

        // The losing timer must not linger
        timer_token.cancel();
        if let Err(e) = timer.await {
            tracing::warn!("Handshake timer task failed: {}", e);
        }

        if let Ok(handshake) = &outcome {
            self.sink.debug(&format!(
                "Handshake received: {} at {}",
                handshake.transport, handshake.address
            ));
        }
        outcome
    }

    async fn verify(
        &self,
        transport: &mut dyn Transport,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<Profile>, ProbeError> {
        until_cancelled(cancel, transport.authenticate(ctx)).await??;

        let list: ProfileList = until_cancelled(
            cancel,
            call_typed(transport, ctx, methods::PROFILE_LIST, None),
        )
        .await??;

        self.sink
            .info(&format!("Found {} profiles", list.profiles.len()));
        for profile in &list.profiles {
            self.sink.info(&format!("- {}", profile.label()));
        }

        Ok(list.profiles)
    }
}

fn discovered(
    found: Result<Discovery, oneshot::error::RecvError>,
    limit: Duration,
) -> Result<HandshakeMessage, ProbeError> {
    match found {
        Ok(Discovery::Listening(handshake)) => Ok(handshake),
        Ok(Discovery::Rejected(err)) => Err(ProbeError::Detection(err)),
        Ok(Discovery::TimedOut(after)) => Err(ProbeError::Timeout(after)),
        // Both writers gone without writing
        Err(_) => Err(ProbeError::Timeout(limit)),
    }
}

/// Await `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ProbeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        output = fut => Ok(output),
    }
}
