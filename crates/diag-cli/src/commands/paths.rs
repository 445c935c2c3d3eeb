//! Paths command implementation

use anyhow::Result;

use diag_core::config::DiagConfig;

use super::layout_for;

/// Print every location the checks use, without touching the filesystem
pub fn paths_command(config: &DiagConfig) -> Result<()> {
    let layout = layout_for(config)?;

    println!("App data:        {}", layout.app_data_dir().display());
    println!("broth:           {}", layout.broth_dir().display());
    println!("butler versions: {}", layout.butler_versions_dir().display());
    println!("Chosen version:  {}", layout.chosen_version_file().display());
    println!("Database:        {}", layout.database_path().display());

    match layout.butler_executable() {
        Ok(path) => println!("butler:          {}", path.display()),
        Err(e) => println!("butler:          (unresolved: {})", e),
    }

    Ok(())
}
