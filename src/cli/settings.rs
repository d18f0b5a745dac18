//! Settings subcommand implementation.

use crate::config::{AppSettings, Paths};
use crate::error::{CliError, CliResult};
use crate::output;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Inspect or create the settings file.
#[derive(Parser, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings actions.
#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl SettingsCommand {
    /// Execute the settings command. `config` is the `--config` override.
    pub fn execute(&self, config: Option<&Path>, quiet: bool) -> CliResult<()> {
        match &self.action {
            SettingsAction::Show => {
                let settings = match config {
                    Some(path) => AppSettings::load_from(path)?,
                    None => AppSettings::load()?,
                };
                let json = serde_json::to_string_pretty(&settings)
                    .map_err(|e| CliError::Other(e.to_string()))?;
                println!("{}", json);
            }
            SettingsAction::Init { force } => {
                let path = init(config, *force)?;
                if !quiet {
                    output::print_success(&format!("Wrote {}", path.display()));
                }
            }
        }
        Ok(())
    }
}

fn init(config: Option<&Path>, force: bool) -> CliResult<PathBuf> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => Paths::new()?.settings_file(),
    };
    if path.exists() && !force {
        return Err(CliError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    AppSettings::default().save_to(&path)?;
    Ok(path)
}
