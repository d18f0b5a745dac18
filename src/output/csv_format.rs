//! CSV output formatting.

use super::EventRecord;
use std::io::{self, Write};

const HEADER: [&str; 5] = ["kind", "received_at", "scheme", "payload", "error"];

/// Write the column header.
pub fn write_header<W: Write>(wtr: &mut csv::Writer<W>) -> io::Result<()> {
    wtr.write_record(HEADER)?;
    Ok(())
}

/// Write one event row and flush it.
pub fn write_record<W: Write>(wtr: &mut csv::Writer<W>, record: &EventRecord) -> io::Result<()> {
    let received_at = record.received_at.to_rfc3339();
    wtr.write_record([
        record.kind,
        received_at.as_str(),
        record.scheme.as_deref().unwrap_or(""),
        record.payload.as_deref().unwrap_or(""),
        record.error.as_deref().unwrap_or(""),
    ])?;
    wtr.flush()
}
