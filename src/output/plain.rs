//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::EventRecord;
use console::style;
use std::io::{self, Write};

/// Write one event as a human-readable line.
pub fn write_record<W: Write>(out: &mut W, record: &EventRecord) -> io::Result<()> {
    let time = record.received_at.format("%H:%M:%S");
    match record.error.as_deref() {
        Some(error) => writeln!(
            out,
            "  {} {} {}",
            style(time).dim(),
            style("error").red().bold(),
            error
        )?,
        None => writeln!(
            out,
            "  {} {} {} {}",
            style(time).dim(),
            style("identity").green().bold(),
            style(format!("[{}]", record.scheme.as_deref().unwrap_or("-"))).dim(),
            truncate_string(record.payload.as_deref().unwrap_or(""), 96)
        )?,
    }
    out.flush()
}

/// Write an idle transition.
pub fn write_idle<W: Write>(out: &mut W, idle: bool) -> io::Result<()> {
    if idle {
        writeln!(out, "  {} idle", style("…").dim())?;
    } else {
        writeln!(out, "  {} polling", style("•").cyan())?;
    }
    out.flush()
}

/// Print whether the tag hardware is usable.
pub fn print_status(available: bool) {
    if available {
        print_success("Tag hardware is available");
    } else {
        print_warning("Tag hardware is not available");
    }
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
