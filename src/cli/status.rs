//! Status subcommand implementation.

use super::{build_scan_loop, SourceArgs};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use clap::Parser;

/// Report whether the tag hardware is available.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl StatusCommand {
    /// Execute the status command. Returns whether the hardware is available.
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<bool> {
        let scan = build_scan_loop(
            &self.source,
            settings,
            settings.scan_mode(),
            settings.poll_timeout(),
        )?;
        let available = scan.is_available().await;
        output::print_status(available);
        Ok(available)
    }
}
