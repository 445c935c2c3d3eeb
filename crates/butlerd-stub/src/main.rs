//! butlerd-stub
//!
//! Accepts the same command line the probe gives butler:
//!
//! ```text
//! butlerd-stub --json --dbpath <db> daemon [--transport tcp|http]
//! butlerd-stub -V
//! ```
//!
//! Behaviour is picked through `STUB_*` environment variables so tests can
//! drive it without changing the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use butlerd_stub::announce::{emit, listen_line, log_line};
use butlerd_stub::http::serve_http;
use butlerd_stub::tcp::serve_tcp;
use butlerd_stub::{Mode, StubDaemon};
use diag_core::process::write_pid_file;
use diag_protocol::{Secret, TransportKind};

/// Version string printed by `-V`, on stderr like butler
const STUB_VERSION: &str = "v15.21.0-stub, built on Oct 16 2026 @ 12:00:00";

#[derive(Parser)]
#[command(name = "butlerd-stub")]
#[command(about = "Stand-in for `butler daemon` used by itch-diag tests")]
#[command(disable_version_flag = true)]
struct Args {
    /// Print version and exit
    #[arg(short = 'V')]
    print_version: bool,

    /// Structured output (always on; accepted for compatibility)
    #[arg(long)]
    json: bool,

    /// Database the daemon would open
    #[arg(long, value_name = "PATH")]
    dbpath: Option<PathBuf>,

    /// How to behave
    #[arg(long, env = "STUB_MODE", default_value = "normal")]
    mode: Mode,

    /// Secret to announce (random when unset)
    #[arg(long, env = "STUB_SECRET")]
    secret: Option<String>,

    /// Comma-separated display names of the profiles to report
    #[arg(long, env = "STUB_PROFILES", value_delimiter = ',')]
    profiles: Vec<String>,

    /// Write the stub's PID here on startup
    #[arg(long, env = "STUB_PID_FILE", value_name = "PATH")]
    pid_file: Option<PathBuf>,

    /// Transport used when `daemon` is given no `--transport`
    #[arg(long, env = "STUB_TRANSPORT", default_value = "tcp")]
    default_transport: TransportKind,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a daemon
    Daemon {
        /// Transport to listen on
        #[arg(long)]
        transport: Option<TransportKind>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.print_version {
        eprintln!("{}", STUB_VERSION);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = &args.pid_file {
        write_pid_file(path, std::process::id())
            .with_context(|| format!("Failed to write pid file {:?}", path))?;
    }

    let Some(Command::Daemon { transport }) = args.command else {
        eprintln!("butlerd-stub: nothing to do (expected `daemon` or -V)");
        return Ok(ExitCode::from(2));
    };
    let transport = transport.unwrap_or(args.default_transport);

    let Some(dbpath) = args.dbpath else {
        emit(&log_line("error", "--dbpath must be given"))?;
        return Ok(ExitCode::from(1));
    };

    let secret = Secret::new(args.secret.unwrap_or_else(random_secret));
    let daemon = Arc::new(StubDaemon::new(args.mode, secret, &args.profiles));
    tracing::info!(mode = %daemon.mode(), %transport, "butlerd-stub starting");

    match daemon.mode() {
        Mode::Exit => {
            emit(&log_line(
                "error",
                &format!("could not open database {}", dbpath.display()),
            ))?;
            return Ok(ExitCode::from(1));
        }
        Mode::Silent => {
            emit(&log_line("info", "warming up"))?;
            std::future::pending::<()>().await;
        }
        _ => {}
    }

    emit(&log_line(
        "info",
        &format!("using database {}", dbpath.display()),
    ))?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();

    let announced_secret = match daemon.mode() {
        Mode::NoSecret => None,
        _ => Some(daemon.secret()),
    };
    emit(&listen_line(transport, &address, announced_secret))?;

    match transport {
        TransportKind::Tcp => serve_tcp(listener, daemon).await?,
        TransportKind::Http => serve_http(listener, daemon).await?,
    }

    Ok(ExitCode::SUCCESS)
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
