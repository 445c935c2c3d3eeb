//! Install layout overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides for paths that are normally derived from the itch app-data folder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// itch application data folder (defaults to `<config dir>/itch`)
    pub app_data_dir: Option<PathBuf>,

    /// butler executable (defaults to the chosen broth version)
    pub butler_executable: Option<PathBuf>,

    /// butler database (defaults to `<app data>/db/butler.db`)
    pub database: Option<PathBuf>,
}
