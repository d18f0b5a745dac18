//! Tag transport abstraction.
//!
//! The hardware driver is an external collaborator. The scan loop reaches it
//! only through the [`TagTransport`] trait, which is injected at construction
//! so tests and demos can substitute a [`ScriptedTransport`].

mod scripted;

pub use scripted::{PollStep, Script, ScriptedTransport};

use crate::error::TransportResult;
use crate::types::RawTag;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Trait for contactless tag hardware drivers.
///
/// A transport holds at most one tag session at a time. `poll` opens it,
/// `transceive` talks through it and `finish` releases it.
#[async_trait]
pub trait TagTransport: Send + Sync {
    /// Whether the hardware is present and enabled. Must not fail; drivers
    /// that cannot answer report `false`.
    async fn is_available(&self) -> bool;

    /// Wait up to `timeout` for a tag to enter the field.
    ///
    /// Returns [`TransportError::Timeout`](crate::error::TransportError::Timeout)
    /// once the timeout elapses. Releasing the session with [`finish`](Self::finish)
    /// while this is pending makes it return promptly.
    async fn poll(&self, timeout: Duration) -> TransportResult<RawTag>;

    /// Exchange raw bytes with the currently acquired tag.
    async fn transceive(&self, command: &[u8]) -> TransportResult<Vec<u8>>;

    /// Release the current tag session.
    async fn finish(&self) -> TransportResult<()>;
}

/// Release the transport's session, ignoring failure.
///
/// Releasing is cleanup: callers proceed the same way whether or not it
/// succeeded, so the result is deliberately discarded here.
pub async fn release_quietly(transport: &dyn TagTransport) {
    if let Err(e) = transport.finish().await {
        debug!(error = %e, "tag session release failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_release_quietly_swallows_failure() {
        let transport = ScriptedTransport::new(Vec::new());
        transport.fail_release(true);

        release_quietly(&transport).await;
        assert_eq!(transport.finishes(), 1);
    }
}
