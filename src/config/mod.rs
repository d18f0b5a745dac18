//! Configuration management for tagwatch.
//!
//! Provides XDG-compliant settings storage for scan loop defaults.

mod settings;

pub use settings::{AppSettings, ModeSetting, Paths};
