//! Watch subcommand implementation.
//!
//! Handles `tagwatch watch`: repeat polling until interrupted.

use super::{build_scan_loop, CliScanLoop, OutputFormat, SourceArgs};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::{self, EventPrinter};
use crate::scan_loop::ScanMode;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Poll continuously and stream identities.
#[derive(Parser, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Pause between acquisitions in milliseconds (defaults to the configured idle time)
    #[arg(long, value_name = "MS")]
    pub idle_ms: Option<u64>,

    /// Output format for events
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Exit after this many identity or error events
    #[arg(short = 'n', long, value_name = "N")]
    pub max_events: Option<usize>,
}

impl WatchCommand {
    /// Execute the watch command. Returns the number of events printed.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<usize> {
        let format = OutputFormat::resolve(self.output, settings);
        let idle = self
            .idle_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| settings.idle_duration());

        let scan = build_scan_loop(
            &self.source,
            settings,
            ScanMode::repeat_polling(idle),
            settings.poll_timeout(),
        )?;

        if !quiet && format == OutputFormat::Plain {
            output::print_info("Watching for tags (Ctrl-C to stop)...");
        }

        let mut printer = EventPrinter::stdout(format);
        let printed = stream_events(&scan, &mut printer, self.max_events).await;
        scan.close().await;
        printed
    }
}

/// Print events until the limit, an interrupt, or the bus closes.
async fn stream_events<W: Write>(
    scan: &CliScanLoop,
    printer: &mut EventPrinter<W>,
    max_events: Option<usize>,
) -> CliResult<usize> {
    let mut identities = scan.subscribe_identities()?;
    let mut idle = scan.subscribe_idle()?;
    scan.start().await?;

    let mut printed = 0;
    while max_events.map_or(true, |max| printed < max) {
        tokio::select! {
            event = identities.recv() => match event {
                Ok(event) => {
                    printer.event(&event)?;
                    printed += 1;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind, events dropped"),
                Err(RecvError::Closed) => break,
            },
            transition = idle.recv() => match transition {
                Ok(idle) => printer.idle(idle)?,
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    scan.stop().await;
    Ok(printed)
}
