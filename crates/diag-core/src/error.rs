//! Core error types for itch-diag

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Filesystem state that must hold before a check can run
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Nothing exists at the path
    #[error("{0}: not found")]
    NotFound(PathBuf),

    /// Expected a regular file
    #[error("{0}: should be a file")]
    NotAFile(PathBuf),

    /// Expected a folder
    #[error("{0}: should be a folder")]
    NotAFolder(PathBuf),

    /// The path exists but could not be read
    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform has no configuration directory to look in
    #[error("Could not determine the itch application data folder")]
    NoAppDataDir,

    /// The chosen-version marker exists but is empty
    #[error("No butler version chosen in {0}")]
    NoChosenVersion(PathBuf),
}

impl PreconditionError {
    /// Map an I/O error on `path` to the matching precondition failure
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PreconditionError::NotFound(path)
        } else {
            PreconditionError::Unreadable { path, source }
        }
    }
}
