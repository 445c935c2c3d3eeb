//! Full diagnostic run: install layout, butler version, daemon probe

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::output::{format_layout, format_outcomes, print_error, print_info, ConsoleSink};
use diag_core::config::DiagConfig;
use diag_core::{CheckHarness, DiagnosticSink};
use diag_probe::{butler_version, Probe};

use super::layout_for;
use super::probe::print_report;

/// Run every check in order. Returns whether all of them passed.
///
/// A failed check is reported and the run carries on with the next one;
/// only checks that need the previous result are skipped.
pub async fn run_command(config: &DiagConfig, cancel: &CancellationToken) -> Result<bool> {
    let sink: Arc<dyn DiagnosticSink> = Arc::new(ConsoleSink);
    let mut harness = CheckHarness::new(sink.clone());

    let layout = match layout_for(config) {
        Ok(layout) => layout,
        Err(e) => {
            print_error(&format!("Cannot locate the itch app data folder: {}", e));
            return Ok(false);
        }
    };

    if let Some(report) = harness
        .run("Inspecting butler install", || async { layout.inspect() })
        .await
    {
        print_info(&format_layout(&report));
    }

    let executable = harness
        .run("Locating butler", || async { layout.butler_executable() })
        .await;

    if let Some(executable) = &executable {
        if let Some(version) = harness
            .run("Checking butler version", || {
                butler_version(executable, config.probe.version_timeout)
            })
            .await
        {
            print_info(&format!("butler {}", version));
        }

        let mut probe = Probe::from_layout(&layout, config.probe.clone(), sink)?;
        if let Some(report) = harness
            .run("Probing butlerd", || probe.run(cancel))
            .await
        {
            print_report(&report);
        }
    }

    println!();
    println!("{}", format_outcomes(harness.outcomes()));

    let passed = harness.all_passed();
    if !passed {
        let failed = harness.failures().count();
        print_error(&format!("{} check(s) failed", failed));
    }
    Ok(passed)
}
