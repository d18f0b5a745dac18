//! Opaque per-tag handles.
//!
//! Every tag acquired from the hardware gets a fresh `TagHandle`. Detectors
//! may use it to correlate exchanges, but its contents carry no meaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An opaque, process-unique identifier minted for one acquired tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagHandle(String);

impl TagHandle {
    /// Wrap an existing handle string.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get a short representation (first 8 characters).
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for TagHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of fresh tag handles.
pub trait HandleFactory: Send + Sync {
    /// Mint a handle that has not been returned before.
    fn next_handle(&self) -> TagHandle;
}

/// Default handle factory backed by random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidHandleFactory;

impl HandleFactory for UuidHandleFactory {
    fn next_handle(&self) -> TagHandle {
        TagHandle(Uuid::new_v4().to_string())
    }
}
