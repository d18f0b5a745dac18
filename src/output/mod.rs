//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of identity
//! events as they arrive.

mod csv_format;
mod json_format;
mod plain;

pub use plain::{print_error, print_info, print_status, print_success, print_warning};

use crate::bus::IdentityEvent;
use crate::cli::OutputFormat;
use crate::pipeline::IdentityEnvelope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// One identity-stream event, flattened for output.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// `identity` or `error`.
    pub kind: &'static str,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventRecord {
    pub fn from_event(event: &IdentityEvent<IdentityEnvelope>) -> Self {
        let received_at = Utc::now();
        match event {
            IdentityEvent::Identity(envelope) => Self {
                kind: "identity",
                received_at,
                scheme: Some(envelope.scheme.clone()),
                payload: Some(envelope.payload.clone()),
                error: None,
            },
            IdentityEvent::Error(e) => Self {
                kind: "error",
                received_at,
                scheme: None,
                payload: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Writes events in the selected format as they arrive.
pub struct EventPrinter<W: Write> {
    format: OutputFormat,
    out: Sink<W>,
}

enum Sink<W: Write> {
    Raw(W),
    /// CSV writer and whether the header row has been written.
    Csv(csv::Writer<W>, bool),
}

impl EventPrinter<io::Stdout> {
    /// Print to standard output.
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> EventPrinter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        let out = match format {
            OutputFormat::Csv => Sink::Csv(csv::Writer::from_writer(writer), false),
            OutputFormat::Plain | OutputFormat::Json => Sink::Raw(writer),
        };
        Self { format, out }
    }

    /// Write one identity-stream event.
    pub fn event(&mut self, event: &IdentityEvent<IdentityEnvelope>) -> io::Result<()> {
        let record = EventRecord::from_event(event);
        match (&mut self.out, self.format) {
            (Sink::Csv(wtr, header_written), _) => {
                if !*header_written {
                    csv_format::write_header(wtr)?;
                    *header_written = true;
                }
                csv_format::write_record(wtr, &record)
            }
            (Sink::Raw(w), OutputFormat::Json) => json_format::write_record(w, &record),
            (Sink::Raw(w), _) => plain::write_record(w, &record),
        }
    }

    /// Write an idle transition. Only plain output shows these.
    pub fn idle(&mut self, idle: bool) -> io::Result<()> {
        match &mut self.out {
            Sink::Raw(w) if self.format == OutputFormat::Plain => plain::write_idle(w, idle),
            _ => Ok(()),
        }
    }

    /// Consume the printer, returning the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        match self.out {
            Sink::Raw(w) => Ok(w),
            Sink::Csv(wtr, _) => wtr
                .into_inner()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }
}
