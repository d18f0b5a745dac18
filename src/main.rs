//! tagwatch - contactless tag identity scanner.

use clap::Parser;
use tagwatch::cli::{Cli, Commands};
use tagwatch::config::AppSettings;
use tagwatch::error::CliResult;
use tagwatch::{logging, output};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet)?;

    match run(cli).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(2),
        Err(e) => {
            output::print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Dispatch the subcommand. `Ok(false)` means the hardware was unavailable.
async fn run(cli: Cli) -> CliResult<bool> {
    if let Commands::Settings(cmd) = &cli.command {
        cmd.execute(cli.config.as_deref(), cli.quiet)?;
        return Ok(true);
    }

    let settings = match &cli.config {
        Some(path) => AppSettings::load_from(path)?,
        None => AppSettings::load()?,
    };

    match &cli.command {
        Commands::Status(cmd) => cmd.execute(&settings).await,
        Commands::Scan(cmd) => cmd.execute(&settings, cli.quiet).await.map(|_| true),
        Commands::Watch(cmd) => cmd.execute(&settings, cli.quiet).await.map(|_| true),
        Commands::Settings(_) => Ok(true),
    }
}
