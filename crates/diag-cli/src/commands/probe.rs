//! Probe command implementation

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::output::{format_profiles, print_error, print_info, print_success, ConsoleSink};
use diag_core::config::DiagConfig;
use diag_core::DiagnosticSink;
use diag_probe::{Probe, ProbeReport};

use super::layout_for;

/// Launch butlerd once and verify it answers `Profile.List`
pub async fn probe_command(config: &DiagConfig, cancel: &CancellationToken) -> Result<bool> {
    let layout = layout_for(config)?;
    let sink: Arc<dyn DiagnosticSink> = Arc::new(ConsoleSink);

    let mut probe = match Probe::from_layout(&layout, config.probe.clone(), sink) {
        Ok(probe) => probe,
        Err(e) => {
            print_error(&format!("Cannot locate butler: {}", e));
            return Ok(false);
        }
    };

    match probe.run(cancel).await {
        Ok(report) => {
            print_report(&report);
            Ok(true)
        }
        Err(failure) => {
            print_error(&failure.to_string());
            print_info(&format!("Diagnosis: {}", failure.category()));
            Ok(false)
        }
    }
}

pub(crate) fn print_report(report: &ProbeReport) {
    print_success(&format!(
        "butlerd answered over {} at {} in {} ms",
        report.transport,
        report.address,
        report.elapsed.as_millis()
    ));
    println!("{}", format_profiles(&report.profiles));
}
