//! `butler -V`

use std::path::Path;
use std::time::Duration;

use crate::error::CommandError;
use crate::supervisor::{capture_output, DaemonCommand};

/// Ask butler for its version string.
///
/// butler prints its version on stderr, so both streams are read, stdout
/// first, and the combined text is trimmed.
pub async fn butler_version(executable: &Path, limit: Duration) -> Result<String, CommandError> {
    let version = version_of(DaemonCommand::new(executable), limit).await?;
    tracing::debug!(executable = %executable.display(), %version, "butler version");
    Ok(version)
}

/// Run `command -V` and return its combined, trimmed output
pub async fn version_of(command: DaemonCommand, limit: Duration) -> Result<String, CommandError> {
    let output = capture_output(&command.arg("-V"), limit).await?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim().to_string();

    if !output.status.success() {
        return Err(CommandError::Failed {
            status: output.status.to_string(),
            output: combined,
        });
    }

    Ok(combined)
}
