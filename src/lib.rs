//! # tagwatch - Contactless Tag Identity Scanner
//!
//! tagwatch drives a contactless tag transport in a background loop,
//! runs a detection pipeline on every acquired tag and publishes the
//! encrypted identities to any number of subscribers.
//!
//! ## Features
//!
//! - **Single-shot or repeat polling**: one acquisition per start, or a
//!   continuous loop with an idle pause between acquisitions
//! - **Pluggable pipeline**: any [`Detector`] paired with any [`Encrypter`]
//! - **Broadcast events**: identity results, errors and idle transitions
//! - **Scripted transports**: replay tag sessions from JSON fixtures
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tagwatch::pipeline::{DetectionPipeline, EnvelopeEncrypter, UidDetector};
//! use tagwatch::transport::ScriptedTransport;
//! use tagwatch::{ScanLoop, ScanMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(ScriptedTransport::from_file("session.json".as_ref())?);
//!     let scan = ScanLoop::new(
//!         transport,
//!         DetectionPipeline::new(UidDetector::default(), EnvelopeEncrypter),
//!         ScanMode::repeat_polling(Duration::from_secs(2)),
//!     );
//!
//!     let mut events = scan.subscribe_identities()?;
//!     scan.start().await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event.into_result());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Tag records, handles and hex helpers
//! - [`transport`] - The `TagTransport` trait and a scripted implementation
//! - [`adapter`] - Normalizes raw tag records into uniform tag objects
//! - [`pipeline`] - Detection followed by encryption
//! - [`bus`] - Broadcast channels for identity and idle events
//! - [`scan_loop`] - The background acquisition loop
//! - [`config`] - Settings file handling
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod adapter;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod scan_loop;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use adapter::NormalizedTag;
pub use bus::{EventBus, IdentityEvent};
pub use error::{CliError, PipelineError, ScanError, TransportError};
pub use pipeline::{DetectionPipeline, Detector, Encrypter};
pub use scan_loop::{ScanLoop, ScanMode, ScanState};
pub use transport::TagTransport;
pub use types::{RawTag, TagHandle, TagType};
