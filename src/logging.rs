//! Logging initialization.
//!
//! Diagnostics go to stderr so event output on stdout stays parseable.
//! `RUST_LOG` wins, then `TAGWATCH_LOG`, then the level implied by
//! `--verbose` / `--quiet`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when no environment filter is set.
pub fn default_level(verbose: bool, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "warn",
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or a subscriber is
/// already installed.
pub fn init(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let fallback = std::env::var("TAGWATCH_LOG")
        .unwrap_or_else(|_| default_level(verbose, quiet).to_string());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&fallback))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .try_init()?;

    Ok(())
}
