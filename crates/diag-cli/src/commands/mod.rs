//! CLI command implementations

mod config;
mod paths;
mod probe;
mod run;
mod version;

use std::path::PathBuf;
use std::time::Duration;

use diag_core::config::DiagConfig;
use diag_core::{ItchLayout, PreconditionError};
use diag_protocol::TransportKind;

pub use config::{config_get, config_init, config_path, config_show};
pub use paths::paths_command;
pub use probe::probe_command;
pub use run::run_command;
pub use version::version_command;

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub app_data_dir: Option<PathBuf>,
    pub butler: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub handshake_timeout: Option<Duration>,
    pub transport: Option<TransportKind>,
}

impl Overrides {
    /// Fold the overrides into `config`
    pub fn apply(&self, config: &mut DiagConfig) {
        if let Some(dir) = &self.app_data_dir {
            config.paths.app_data_dir = Some(dir.clone());
        }
        if let Some(butler) = &self.butler {
            config.paths.butler_executable = Some(butler.clone());
        }
        if let Some(db) = &self.database {
            config.paths.database = Some(db.clone());
        }
        if let Some(timeout) = self.handshake_timeout {
            config.probe.handshake_timeout = timeout;
        }
        if self.transport.is_some() {
            config.probe.transport = self.transport;
        }
    }
}

fn layout_for(config: &DiagConfig) -> Result<ItchLayout, PreconditionError> {
    ItchLayout::from_config(&config.paths)
}
