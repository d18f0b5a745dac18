//! CLI subcommand definitions and handlers.
//!
//! Implements a subcommand architecture:
//! - `tagwatch status` - Report whether the tag hardware is usable
//! - `tagwatch scan` - Wait for one tag and print its identity
//! - `tagwatch watch` - Poll continuously and stream identities
//! - `tagwatch settings show|init` - Inspect or create the settings file

mod scan;
mod settings;
mod status;
mod watch;

pub use scan::ScanCommand;
pub use settings::SettingsCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::pipeline::{DetectionPipeline, EnvelopeEncrypter, UidDetector};
use crate::scan_loop::{ScanLoop, ScanMode};
use crate::transport::ScriptedTransport;
use crate::types::TagType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// tagwatch - contactless tag identity scanner.
///
/// Polls a tag transport, detects identities on acquired tags and emits
/// them in encrypted form. Without attached hardware, transports are
/// replayed from JSON scripts.
#[derive(Parser, Debug)]
#[command(name = "tagwatch")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contactless tag identity scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report whether the tag hardware is available
    Status(StatusCommand),

    /// Wait for a single tag and print its identity
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Poll continuously and stream identities
    #[command(alias = "w")]
    Watch(WatchCommand),

    /// Inspect or create the settings file
    Settings(SettingsCommand),
}

/// Where tags come from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// JSON script to replay in place of tag hardware
    #[arg(long, value_name = "FILE", env = "TAGWATCH_REPLAY")]
    pub replay: PathBuf,

    /// Only report tags of these technologies (e.g. "nfc-a,felica")
    #[arg(long = "type", value_name = "TYPE", value_delimiter = ',')]
    pub types: Vec<TagType>,
}

/// Output format for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    Plain,
    /// One JSON object per line
    Json,
    /// CSV format for data analysis
    Csv,
}

impl OutputFormat {
    /// Resolve an explicit choice against the configured default.
    pub fn resolve(explicit: Option<Self>, settings: &AppSettings) -> Self {
        explicit
            .or_else(|| settings.default_output_format.parse().ok())
            .unwrap_or_default()
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Plain
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// The scan loop the CLI drives.
pub type CliScanLoop = ScanLoop<UidDetector, EnvelopeEncrypter>;

/// Build a scan loop over a replayed transport.
pub fn build_scan_loop(
    source: &SourceArgs,
    settings: &AppSettings,
    mode: ScanMode,
    poll_timeout: Duration,
) -> CliResult<CliScanLoop> {
    let transport = Arc::new(ScriptedTransport::from_file(&source.replay)?);
    Ok(ScanLoop::builder(
        transport,
        DetectionPipeline::new(
            UidDetector::only(source.types.iter().copied()),
            EnvelopeEncrypter,
        ),
        mode,
    )
    .poll_timeout(poll_timeout)
    .channel_capacity(settings.channel_capacity)
    .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_watch() {
        let cli = Cli::try_parse_from([
            "tagwatch",
            "watch",
            "--replay",
            "script.json",
            "--idle-ms",
            "500",
            "-o",
            "json",
            "--type",
            "nfc-a,felica",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch(cmd) => {
                assert_eq!(cmd.idle_ms, Some(500));
                assert_eq!(cmd.source.types, vec![TagType::Iso14443A, TagType::Felica]);
                assert_eq!(cmd.output, Some(OutputFormat::Json));
                assert_eq!(cmd.source.replay, PathBuf::from("script.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_type() {
        let parsed = Cli::try_parse_from([
            "tagwatch",
            "scan",
            "--replay",
            "script.json",
            "--type",
            "barcode",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_output_format_resolution() {
        let mut settings = AppSettings::default();
        assert_eq!(OutputFormat::resolve(None, &settings), OutputFormat::Plain);

        settings.default_output_format = "csv".into();
        assert_eq!(OutputFormat::resolve(None, &settings), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::resolve(Some(OutputFormat::Json), &settings),
            OutputFormat::Json
        );

        settings.default_output_format = "yaml".into();
        assert_eq!(OutputFormat::resolve(None, &settings), OutputFormat::Plain);
    }

    #[test]
    fn test_build_scan_loop_from_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"{ "steps": [{ "outcome": "timeout" }] }"#).unwrap();

        let source = SourceArgs {
            replay: path,
            types: Vec::new(),
        };
        let scan = build_scan_loop(
            &source,
            &AppSettings::default(),
            ScanMode::single_scan(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(scan.mode(), ScanMode::SingleScan);
    }
}
