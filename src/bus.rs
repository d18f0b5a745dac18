//! Event broadcasting.
//!
//! Two independent multi-subscriber channels: identity events (encrypted
//! identities or out-of-band errors) and idle-state transitions. Built on
//! `tokio::sync::broadcast`, so publishing never waits on subscribers and a
//! subscriber that falls behind skips the events it missed.

use crate::error::{ScanError, ScanResult};
use futures::stream::{self, Stream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// Default per-channel buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// An event on the identity channel.
#[derive(Debug, Clone)]
pub enum IdentityEvent<T> {
    /// An encrypted identity from a successful detection.
    Identity(T),
    /// A cycle failed. Delivered as a notification, not a value.
    Error(Arc<ScanError>),
}

impl<T> IdentityEvent<T> {
    /// Whether this event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<T, Arc<ScanError>> {
        match self {
            Self::Identity(identity) => Ok(identity),
            Self::Error(e) => Err(e),
        }
    }
}

struct Channels<T> {
    identities: broadcast::Sender<IdentityEvent<T>>,
    idle: broadcast::Sender<bool>,
}

/// Broadcast hub for identity and idle events.
///
/// Closing drops both senders: existing subscribers see the end of their
/// stream and any later subscription fails with [`ScanError::Closed`].
pub struct EventBus<T> {
    channels: Mutex<Option<Channels<T>>>,
}

impl<T> EventBus<T>
where
    T: Clone + Send + 'static,
{
    /// Create a bus whose channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (identities, _) = broadcast::channel(capacity);
        let (idle, _) = broadcast::channel(capacity);
        Self {
            channels: Mutex::new(Some(Channels { identities, idle })),
        }
    }

    /// Publish an encrypted identity. Returns the number of subscribers
    /// that will receive it.
    pub fn publish_identity(&self, identity: T) -> usize {
        self.send_identity_event(IdentityEvent::Identity(identity))
    }

    /// Publish a cycle failure.
    pub fn publish_error(&self, error: ScanError) -> usize {
        self.send_identity_event(IdentityEvent::Error(Arc::new(error)))
    }

    /// Publish an idle-state transition.
    pub fn publish_idle(&self, idle: bool) -> usize {
        self.lock()
            .as_ref()
            .and_then(|c| c.idle.send(idle).ok())
            .unwrap_or(0)
    }

    /// Subscribe to identity events published from now on.
    pub fn subscribe_identities(&self) -> ScanResult<broadcast::Receiver<IdentityEvent<T>>> {
        self.lock()
            .as_ref()
            .map(|c| c.identities.subscribe())
            .ok_or(ScanError::Closed)
    }

    /// Subscribe to idle-state transitions published from now on.
    pub fn subscribe_idle(&self) -> ScanResult<broadcast::Receiver<bool>> {
        self.lock()
            .as_ref()
            .map(|c| c.idle.subscribe())
            .ok_or(ScanError::Closed)
    }

    /// Identity events as a stream that ends when the bus closes.
    pub fn identity_stream(&self) -> ScanResult<impl Stream<Item = IdentityEvent<T>>> {
        self.subscribe_identities().map(receiver_stream)
    }

    /// Idle transitions as a stream that ends when the bus closes.
    pub fn idle_stream(&self) -> ScanResult<impl Stream<Item = bool>> {
        self.subscribe_idle().map(receiver_stream)
    }

    /// Close both channels. Irreversible.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            debug!("event bus closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn send_identity_event(&self, event: IdentityEvent<T>) -> usize {
        self.lock()
            .as_ref()
            .and_then(|c| c.identities.send(event).ok())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Channels<T>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Adapt a broadcast receiver into a stream, skipping over lag.
fn receiver_stream<V>(rx: broadcast::Receiver<V>) -> impl Stream<Item = V>
where
    V: Clone + Send + 'static,
{
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(value) => return Some((value, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
