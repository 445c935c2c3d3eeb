//! itch / butler install layout
//!
//! itch keeps its helpers under `<app data>/broth/<package>`. For butler:
//!
//! ```text
//! <app data>/
//!   db/butler.db
//!   broth/butler/.chosen-version           "15.21.0"
//!   broth/butler/versions/15.21.0/.installed
//!   broth/butler/versions/15.21.0/butler[.exe]
//! ```
//!
//! The app data folder is `<config dir>/itch`: `$XDG_CONFIG_HOME/itch` (or
//! `~/.config/itch`) on Linux, `%APPDATA%\itch` on Windows and
//! `~/Library/Application Support/itch` on macOS.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::error::PreconditionError;

/// Folder name under the platform config directory
pub const APP_NAME: &str = "itch";

/// Default itch app data folder for this platform
pub fn default_app_data_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// File name of the butler executable on this platform
pub fn butler_executable_name() -> String {
    format!("butler{}", std::env::consts::EXE_SUFFIX)
}

/// Resolved locations of everything the diagnostics look at
#[derive(Debug, Clone)]
pub struct ItchLayout {
    app_data_dir: PathBuf,
    butler_override: Option<PathBuf>,
    database_override: Option<PathBuf>,
}

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

impl fmt::Display for FolderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dir {
            write!(f, "{}/", self.name)
        } else {
            write!(f, "{} ({})", self.name, format_bytes(self.size))
        }
    }
}

/// Everything learned by walking the butler install
#[derive(Debug, Clone)]
pub struct LayoutReport {
    pub app_data_dir: PathBuf,
    pub broth_packages: Vec<FolderEntry>,
    pub butler_versions: Vec<FolderEntry>,
    pub chosen_version: String,
    pub install_marker: String,
    pub installed_files: Vec<FolderEntry>,
    pub butler_executable: PathBuf,
}

impl ItchLayout {
    /// Layout rooted at an explicit app data folder
    pub fn new(app_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_data_dir: app_data_dir.into(),
            butler_override: None,
            database_override: None,
        }
    }

    /// Layout from configuration overrides, falling back to the platform default
    pub fn from_config(paths: &PathsConfig) -> Result<Self, PreconditionError> {
        let app_data_dir = match &paths.app_data_dir {
            Some(dir) => dir.clone(),
            None => default_app_data_dir().ok_or(PreconditionError::NoAppDataDir)?,
        };

        Ok(Self {
            app_data_dir,
            butler_override: paths.butler_executable.clone(),
            database_override: paths.database.clone(),
        })
    }

    /// Use this butler executable instead of the chosen broth version
    pub fn with_butler_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.butler_override = Some(path.into());
        self
    }

    /// Use this database instead of `<app data>/db/butler.db`
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_override = Some(path.into());
        self
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    pub fn broth_dir(&self) -> PathBuf {
        self.app_data_dir.join("broth")
    }

    pub fn butler_dir(&self) -> PathBuf {
        self.broth_dir().join("butler")
    }

    pub fn butler_versions_dir(&self) -> PathBuf {
        self.butler_dir().join("versions")
    }

    pub fn chosen_version_file(&self) -> PathBuf {
        self.butler_dir().join(".chosen-version")
    }

    /// Path of butler's database
    pub fn database_path(&self) -> PathBuf {
        self.database_override
            .clone()
            .unwrap_or_else(|| self.app_data_dir.join("db").join("butler.db"))
    }

    /// butler version itch selected, from `.chosen-version`
    pub fn chosen_version(&self) -> Result<String, PreconditionError> {
        let path = self.chosen_version_file();
        let contents =
            fs::read_to_string(&path).map_err(|e| PreconditionError::from_io(&path, e))?;
        let version = contents.trim();
        if version.is_empty() {
            return Err(PreconditionError::NoChosenVersion(path));
        }
        Ok(version.to_string())
    }

    /// Folder holding the chosen butler version
    pub fn chosen_version_dir(&self) -> Result<PathBuf, PreconditionError> {
        Ok(self.butler_versions_dir().join(self.chosen_version()?))
    }

    /// butler executable to run: the override, or the chosen broth version
    pub fn butler_executable(&self) -> Result<PathBuf, PreconditionError> {
        match &self.butler_override {
            Some(path) => Ok(path.clone()),
            None => Ok(self.chosen_version_dir()?.join(butler_executable_name())),
        }
    }

    /// Walk the butler install, failing at the first missing piece
    pub fn inspect(&self) -> Result<LayoutReport, PreconditionError> {
        ensure_folder(&self.app_data_dir)?;

        let broth = self.broth_dir();
        ensure_folder(&broth)?;
        let broth_packages = list_folder(&broth)?;

        ensure_folder(&self.butler_dir())?;
        let butler_versions = list_folder(&self.butler_versions_dir())?;

        let chosen_version = self.chosen_version()?;
        let chosen_dir = self.butler_versions_dir().join(&chosen_version);

        let marker = chosen_dir.join(".installed");
        let install_marker = fs::read_to_string(&marker)
            .map_err(|e| PreconditionError::from_io(&marker, e))?
            .trim()
            .to_string();

        let installed_files = list_folder(&chosen_dir)?;

        Ok(LayoutReport {
            app_data_dir: self.app_data_dir.clone(),
            broth_packages,
            butler_versions,
            chosen_version,
            install_marker,
            installed_files,
            butler_executable: self.butler_executable()?,
        })
    }
}

/// Require `path` to be an existing folder
pub fn ensure_folder(path: &Path) -> Result<(), PreconditionError> {
    let metadata = fs::metadata(path).map_err(|e| PreconditionError::from_io(path, e))?;
    if !metadata.is_dir() {
        return Err(PreconditionError::NotAFolder(path.to_path_buf()));
    }
    Ok(())
}

/// Require `path` to be an existing file
pub fn ensure_file(path: &Path) -> Result<(), PreconditionError> {
    let metadata = fs::metadata(path).map_err(|e| PreconditionError::from_io(path, e))?;
    if metadata.is_dir() {
        return Err(PreconditionError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// List a folder's entries sorted by name
pub fn list_folder(path: &Path) -> Result<Vec<FolderEntry>, PreconditionError> {
    let read_dir = fs::read_dir(path).map_err(|e| PreconditionError::from_io(path, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| PreconditionError::from_io(path, e))?;
        let metadata = entry
            .metadata()
            .map_err(|e| PreconditionError::from_io(entry.path(), e))?;
        entries.push(FolderEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Join folder entries the way reports print them
pub fn format_entries(entries: &[FolderEntry]) -> String {
    if entries.is_empty() {
        return "(empty)".to_string();
    }
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable size with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
