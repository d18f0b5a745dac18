//! JSON output formatting.
//!
//! One JSON object per line, so output can be piped while the loop runs.

use super::EventRecord;
use std::io::{self, Write};

/// Write one event as a single JSON line.
pub fn write_record<W: Write>(out: &mut W, record: &EventRecord) -> io::Result<()> {
    let json = serde_json::to_string(record).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(out, "{}", json)?;
    out.flush()
}
