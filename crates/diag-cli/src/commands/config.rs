//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use diag_core::config::{self, DiagConfig};

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Get a config value by dotted key, e.g. `probe.handshake_timeout`.
///
/// Keys missing from the file fall back to the built-in defaults.
pub fn config_get(config_path: Option<&Path>, key: &str) -> Result<bool> {
    let path = resolve(config_path);

    let table: toml::Table = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut table: toml::Table =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        merge_defaults(&mut table)?;
        table
    } else {
        defaults_table()?
    };

    let mut current = &toml::Value::Table(table);
    for part in key.split('.') {
        match current.as_table().and_then(|t| t.get(part)) {
            Some(v) => current = v,
            None => {
                print_error(&format!("Key not found: {}", key));
                return Ok(false);
            }
        }
    }

    match current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(current)?),
        other => println!("{}", other),
    }

    Ok(true)
}

fn defaults_table() -> Result<toml::Table> {
    let text = toml::to_string(&DiagConfig::default())?;
    Ok(toml::from_str(&text)?)
}

fn merge_defaults(table: &mut toml::Table) -> Result<()> {
    for (section, defaults) in defaults_table()? {
        let entry = table
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let (Some(target), toml::Value::Table(defaults)) = (entry.as_table_mut(), defaults) {
            for (key, value) in defaults {
                target.entry(key).or_insert(value);
            }
        }
    }
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'itch-diag config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    println!("{}", content);

    Ok(())
}

/// Print where the configuration file is looked up
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", resolve(config_path).display());
}

/// Initialize default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<bool> {
    let config_file = resolve(config_path);

    if config_file.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_file));
        print_info("Use --force to overwrite");
        return Ok(false);
    }

    let content = generate_default_config()?;

    if let Some(dir) = config_file.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    std::fs::write(&config_file, content)
        .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

    print_success(&format!("Created configuration file: {:?}", config_file));
    Ok(true)
}

fn generate_default_config() -> Result<String> {
    let body = toml::to_string_pretty(&DiagConfig::default())?;
    Ok(format!(
        r#"# itch-diag configuration
#
# [paths] accepts app_data_dir, butler_executable and database to point the
# checks at a non-standard install.
# [probe] transport may be "tcp" or "http"; leave it unset to let butler pick.

{}"#,
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let text = generate_default_config().unwrap();
        let parsed: DiagConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.probe.handshake_timeout.as_secs(), 5);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(config_init(Some(&path), false).unwrap());
        assert!(!config_init(Some(&path), false).unwrap());
        assert!(config_init(Some(&path), true).unwrap());
    }

    #[test]
    fn test_merge_defaults_keeps_file_values() {
        let mut table: toml::Table = toml::from_str("[probe]\ncall_timeout = 42\n").unwrap();
        merge_defaults(&mut table).unwrap();

        let probe = table["probe"].as_table().unwrap();
        assert_eq!(probe["call_timeout"].as_integer(), Some(42));
        assert!(probe.contains_key("handshake_timeout"));
        assert!(table.contains_key("paths"));
    }
}
