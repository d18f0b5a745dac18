//! Scan subcommand implementation.
//!
//! Handles `tagwatch scan`: one acquisition, then exit.

use super::{build_scan_loop, CliScanLoop, OutputFormat, SourceArgs};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::{self, EventPrinter};
use crate::scan_loop::{ScanMode, ScanState};
use clap::Parser;
use std::time::Duration;
use tracing::{debug, info};

/// Wait for a single tag and print its identity.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format for events
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Seconds to wait for a tag (defaults to the configured poll timeout)
    #[arg(short = 't', long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl ScanCommand {
    /// Execute the scan command. Returns the number of events printed.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<usize> {
        let format = OutputFormat::resolve(self.output, settings);
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| settings.poll_timeout());

        let scan = build_scan_loop(&self.source, settings, ScanMode::single_scan(), timeout)?;
        let mut printer = EventPrinter::stdout(format);

        if !quiet && format == OutputFormat::Plain {
            output::print_info("Waiting for a tag...");
        }

        let printed = run_once(&scan, &mut printer).await;
        scan.close().await;
        let printed = printed?;

        if printed == 0 && !quiet && format == OutputFormat::Plain {
            output::print_warning("No identity detected");
        }
        Ok(printed)
    }
}

/// Run one acquisition and print whatever it published.
async fn run_once<W: std::io::Write>(
    scan: &CliScanLoop,
    printer: &mut EventPrinter<W>,
) -> CliResult<usize> {
    let mut events = scan.subscribe_identities()?;
    let mut state = scan.watch_state();
    scan.start().await?;

    tokio::select! {
        _ = state.wait_for(|s| matches!(s, ScanState::Idle | ScanState::Stopped)) => {
            debug!("single scan finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            scan.stop().await;
        }
    }

    // Events are published before the worker settles, so they are already queued.
    let mut printed = 0;
    while let Ok(event) = events.try_recv() {
        printer.event(&event)?;
        printed += 1;
    }
    Ok(printed)
}
