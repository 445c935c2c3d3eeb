//! Output formatting utilities for the CLI
//!
//! Tables for profiles, install listings and check outcomes, plus the colored
//! status-line helpers every command prints through.

use std::sync::atomic::{AtomicBool, Ordering};

use diag_core::harness::CheckOutcome;
use diag_core::layout::{format_bytes, FolderEntry, LayoutReport};
use diag_core::{DiagnosticSink, Level};
use diag_protocol::butlerd::Profile;
use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

/// Format profiles returned by `Profile.List` as an ASCII table
pub fn format_profiles(profiles: &[Profile]) -> String {
    if profiles.is_empty() {
        return "No profiles".to_string();
    }

    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "USERNAME")]
        username: String,
        #[tabled(rename = "LAST CONNECTED")]
        last_connected: String,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .map(|p| ProfileRow {
            id: p.id,
            name: p.label().to_string(),
            username: dash_if_empty(&p.user.username),
            last_connected: dash_if_empty(&p.last_connected),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format folder entries with their sizes
pub fn format_entries(entries: &[FolderEntry]) -> String {
    if entries.is_empty() {
        return "(empty)".to_string();
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "SIZE")]
        size: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            name: if e.is_dir {
                format!("{}/", e.name)
            } else {
                e.name.clone()
            },
            size: if e.is_dir {
                "-".to_string()
            } else {
                format_bytes(e.size)
            },
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Summarise a walk of the butler install
pub fn format_layout(report: &LayoutReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("App data: {}\n", report.app_data_dir.display()));
    output.push_str(&format!(
        "broth packages: {}\n",
        diag_core::layout::format_entries(&report.broth_packages)
    ));
    output.push_str(&format!(
        "butler versions: {}\n",
        diag_core::layout::format_entries(&report.butler_versions)
    ));
    output.push_str(&format!("Chosen version: {}\n", report.chosen_version));
    output.push_str(&format!("Install marker: {}\n", report.install_marker));
    output.push_str(&format!(
        "Executable: {}\n",
        report.butler_executable.display()
    ));
    output.push_str(&format_entries(&report.installed_files));

    output
}

/// Format harness outcomes as a summary table
pub fn format_outcomes(outcomes: &[CheckOutcome]) -> String {
    #[derive(Tabled)]
    struct OutcomeRow {
        #[tabled(rename = "CHECK")]
        label: String,
        #[tabled(rename = "RESULT")]
        result: String,
        #[tabled(rename = "TIME")]
        elapsed: String,
    }

    let rows: Vec<OutcomeRow> = outcomes
        .iter()
        .map(|o| OutcomeRow {
            label: o.label.clone(),
            result: match &o.error {
                None => "ok".to_string(),
                Some(e) => truncate(e, 60),
            },
            elapsed: format!("{} ms", o.elapsed.as_millis()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn dash_if_empty(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence everything but errors
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    if quiet() {
        return;
    }
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr; shown even in quiet mode.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    if quiet() {
        return;
    }
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    if quiet() {
        return;
    }
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Diagnostic sink that prints to the terminal.
///
/// Debug messages only go to `tracing` (visible with `-vv`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => print_info(message),
            Level::Success => print_success(message),
            Level::Warn => print_warning(message),
            Level::Error => print_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_protocol::butlerd::User;
    use std::time::Duration;

    #[test]
    fn test_profile_table() {
        let profiles = vec![Profile {
            id: 7,
            user: User {
                display_name: "Ada".into(),
                username: "ada".into(),
            },
            last_connected: String::new(),
        }];

        let table = format_profiles(&profiles);
        assert!(table.contains("Ada"));
        assert!(table.contains("LAST CONNECTED"));
        assert_eq!(format_profiles(&[]), "No profiles");
    }

    #[test]
    fn test_outcome_table_truncates_errors() {
        let outcomes = vec![CheckOutcome {
            label: "Checking butler".into(),
            elapsed: Duration::from_millis(12),
            error: Some("x".repeat(100)),
        }];

        let table = format_outcomes(&outcomes);
        assert!(table.contains("12 ms"));
        assert!(table.contains("..."));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
