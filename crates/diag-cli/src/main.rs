//! itch-diag CLI
//!
//! Single binary for checking an itch install:
//! - `run` (default): inspect the butler install, ask butler for its
//!   version, then launch butlerd and verify it answers
//! - `probe`: only the butlerd handshake and `Profile.List` verification
//! - `version`, `paths`, `config`: smaller helpers

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diag_core::config::{self, DiagConfig};
use diag_protocol::TransportKind;
use itch_diag::commands::{self, Overrides};
use itch_diag::output::{print_warning, set_quiet};

#[derive(Parser)]
#[command(name = "itch-diag")]
#[command(author, version, about = "Diagnose the butler install used by the itch app")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Default)]
struct PathArgs {
    /// itch app data folder (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    app_data: Option<PathBuf>,

    /// butler executable to use instead of the chosen broth version
    #[arg(long, global = true, value_name = "PATH")]
    butler: Option<PathBuf>,

    /// butler database to open (overrides config)
    #[arg(long = "db", global = true, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check (default)
    Run,

    /// Launch butlerd and verify it answers Profile.List
    Probe {
        /// Seconds to wait for the listen notification
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Transport to request from butlerd (tcp or http)
        #[arg(long)]
        transport: Option<TransportKind>,
    },

    /// Print the butler version
    Version,

    /// Print the paths the checks use
    Paths,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value
    Get {
        /// Config key (e.g., "probe.handshake_timeout")
        key: String,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    set_quiet(cli.quiet);

    let command = cli.command.unwrap_or(Commands::Run);
    let config_path = cli.config.as_deref();

    let passed = match command {
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(config_path)?;
                true
            }
            ConfigAction::Get { key } => commands::config_get(config_path, &key)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            ConfigAction::Path => {
                commands::config_path(config_path);
                true
            }
        },

        Commands::Run => {
            let config = load_config(config_path, cli.paths.into_overrides())?;
            let cancel = shutdown_token();
            commands::run_command(&config, &cancel).await?
        }

        Commands::Probe { timeout, transport } => {
            let overrides = Overrides {
                handshake_timeout: timeout.map(Duration::from_secs),
                transport,
                ..cli.paths.into_overrides()
            };
            let config = load_config(config_path, overrides)?;
            let cancel = shutdown_token();
            commands::probe_command(&config, &cancel).await?
        }

        Commands::Version => {
            let config = load_config(config_path, cli.paths.into_overrides())?;
            commands::version_command(&config).await?
        }

        Commands::Paths => {
            let config = load_config(config_path, cli.paths.into_overrides())?;
            commands::paths_command(&config)?;
            true
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

impl PathArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            app_data_dir: self.app_data,
            butler: self.butler,
            database: self.database,
            ..Default::default()
        }
    }
}

fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<DiagConfig> {
    let mut config = config::load_or_default(path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Token cancelled on Ctrl+C or SIGTERM, so a running probe kills butlerd
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::debug!("SIGTERM handler unavailable: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                print_warning("Received Ctrl+C, stopping...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping...");
            }
        }

        token.cancel();
    });

    cancel
}
