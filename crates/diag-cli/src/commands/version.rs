//! Version command implementation

use anyhow::Result;

use crate::output::{print_error, print_success};
use diag_core::config::DiagConfig;
use diag_probe::butler_version;

use super::layout_for;

/// Print the version of the butler executable the probe would launch
pub async fn version_command(config: &DiagConfig) -> Result<bool> {
    let executable = layout_for(config)?.butler_executable()?;

    match butler_version(&executable, config.probe.version_timeout).await {
        Ok(version) => {
            print_success(&format!("{}: {}", executable.display(), version));
            Ok(true)
        }
        Err(e) => {
            print_error(&format!("{}: {}", executable.display(), e));
            Ok(false)
        }
    }
}
