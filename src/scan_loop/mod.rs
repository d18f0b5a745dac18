//! The tag-acquisition loop.
//!
//! [`ScanLoop`] is a restartable polling state machine. It owns a run flag
//! and the handle of its single worker task; `start`, `stop` and `restart`
//! coordinate through that handle so at most one acquisition cycle is ever
//! in flight. Results leave through two broadcast channels, one for
//! encrypted identities (and errors), one for idle transitions.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tagwatch::pipeline::{DetectionPipeline, EnvelopeEncrypter, UidDetector};
//! use tagwatch::scan_loop::{ScanLoop, ScanMode};
//!
//! let scan = ScanLoop::new(
//!     transport,
//!     DetectionPipeline::new(UidDetector::default(), EnvelopeEncrypter),
//!     ScanMode::repeat_polling(Duration::from_secs(2)),
//! );
//! let mut events = scan.subscribe_identities()?;
//! scan.start().await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod state;
mod worker;

pub use state::{ScanMode, ScanState, DEFAULT_POLL_TIMEOUT};

use crate::bus::{EventBus, IdentityEvent, DEFAULT_CHANNEL_CAPACITY};
use crate::error::{ScanError, ScanResult};
use crate::pipeline::{DetectionPipeline, Detector, Encrypted, Encrypter};
use crate::transport::{release_quietly, TagTransport};
use crate::types::{HandleFactory, UuidHandleFactory};
use futures::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use worker::Shared;

/// Restartable, cancellable tag-acquisition loop.
pub struct ScanLoop<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    shared: Arc<Shared<D, E>>,
    /// The in-flight worker. Holding the lock serializes start/stop.
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<D, E> ScanLoop<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    /// Create a loop with default handle factory, poll timeout and channel
    /// capacity.
    pub fn new(
        transport: Arc<dyn TagTransport>,
        pipeline: DetectionPipeline<D, E>,
        mode: ScanMode,
    ) -> Self {
        Self::builder(transport, pipeline, mode).build()
    }

    /// Start configuring a loop.
    pub fn builder(
        transport: Arc<dyn TagTransport>,
        pipeline: DetectionPipeline<D, E>,
        mode: ScanMode,
    ) -> ScanLoopBuilder<D, E> {
        ScanLoopBuilder {
            transport,
            pipeline,
            mode,
            handles: Arc::new(UuidHandleFactory),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Whether the tag hardware is usable. Never fails.
    pub async fn is_available(&self) -> bool {
        self.shared.transport.is_available().await
    }

    /// Start polling.
    ///
    /// Returns once a cycle is scheduled, not when it completes. Calling
    /// this while a cycle is already in flight does nothing; calling it
    /// after a single-scan cycle finished schedules another one.
    ///
    /// # Errors
    ///
    /// [`ScanError::Unavailable`] if the hardware is unavailable,
    /// [`ScanError::Closed`] after [`close`](Self::close).
    pub async fn start(&self) -> ScanResult<()> {
        if self.is_closed() {
            return Err(ScanError::Closed);
        }
        if !self.is_available().await {
            return Err(ScanError::Unavailable);
        }

        let mut worker = self.worker.lock().await;
        // close() may have finished while availability was being checked.
        if self.is_closed() {
            return Err(ScanError::Closed);
        }
        let was_running = self.shared.running.send_replace(true);
        if was_running && worker.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("scan loop already running");
            return Ok(());
        }

        if let Some(previous) = worker.take() {
            self.reap(previous).await;
        }

        self.shared.set_state(ScanState::Acquiring);
        *worker = Some(tokio::spawn(Arc::clone(&self.shared).run()));
        info!(mode = %self.shared.mode, "scan loop started");
        Ok(())
    }

    /// Stop polling and wait for the in-flight cycle to unwind.
    ///
    /// Releases the hardware session first so a pending poll returns
    /// promptly. Calling it when not running is a no-op.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let was_running = self.shared.running.send_replace(false);
        if was_running {
            release_quietly(self.shared.transport.as_ref()).await;
        }

        let had_worker = worker.is_some();
        if let Some(handle) = worker.take() {
            self.reap(handle).await;
        }

        if was_running || had_worker {
            self.shared.set_state(ScanState::Stopped);
            info!("scan loop stopped");
        }
    }

    /// Stop, then start again.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn restart(&self) -> ScanResult<()> {
        self.stop().await;
        self.start().await
    }

    /// Stop and permanently close both event channels.
    pub async fn close(&self) {
        self.stop().await;
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.bus.close();
            info!("scan loop closed");
        }
    }

    /// Wait for a worker to finish. A panicked worker is reported on the
    /// identity channel as [`ScanError::Worker`].
    async fn reap(&self, handle: JoinHandle<()>) {
        if let Err(e) = handle.await {
            warn!(error = %e, "scan worker ended abnormally");
            self.shared.bus.publish_error(ScanError::Worker(e.to_string()));
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether the loop is between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Current state of the loop.
    pub fn state(&self) -> ScanState {
        *self.shared.state.borrow()
    }

    /// Follow state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ScanState> {
        self.shared.state.subscribe()
    }

    pub fn mode(&self) -> ScanMode {
        self.shared.mode
    }

    /// Subscribe to encrypted identities and cycle errors.
    ///
    /// # Errors
    ///
    /// [`ScanError::Closed`] after [`close`](Self::close).
    pub fn subscribe_identities(
        &self,
    ) -> ScanResult<broadcast::Receiver<IdentityEvent<Encrypted<D, E>>>> {
        self.shared.bus.subscribe_identities()
    }

    /// Subscribe to idle transitions (continuous mode only emits them).
    ///
    /// # Errors
    ///
    /// [`ScanError::Closed`] after [`close`](Self::close).
    pub fn subscribe_idle(&self) -> ScanResult<broadcast::Receiver<bool>> {
        self.shared.bus.subscribe_idle()
    }

    /// Identity events as a stream ending at [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// [`ScanError::Closed`] after [`close`](Self::close).
    pub fn identity_stream(
        &self,
    ) -> ScanResult<impl Stream<Item = IdentityEvent<Encrypted<D, E>>>> {
        self.shared.bus.identity_stream()
    }

    /// Idle transitions as a stream ending at [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// [`ScanError::Closed`] after [`close`](Self::close).
    pub fn idle_stream(&self) -> ScanResult<impl Stream<Item = bool>> {
        self.shared.bus.idle_stream()
    }
}

impl<D, E> Drop for ScanLoop<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    fn drop(&mut self) {
        // Lets a detached worker wind down at its next checkpoint.
        self.shared.running.send_replace(false);
    }
}

/// Builder for [`ScanLoop`] options beyond transport, pipeline and mode.
pub struct ScanLoopBuilder<D, E> {
    transport: Arc<dyn TagTransport>,
    pipeline: DetectionPipeline<D, E>,
    mode: ScanMode,
    handles: Arc<dyn HandleFactory>,
    poll_timeout: Duration,
    channel_capacity: usize,
}

impl<D, E> ScanLoopBuilder<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    /// Use a custom handle generator.
    pub fn handle_factory(mut self, handles: Arc<dyn HandleFactory>) -> Self {
        self.handles = handles;
        self
    }

    /// Set how long one poll waits for a tag.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the per-channel event buffer.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn build(self) -> ScanLoop<D, E> {
        let shared = Shared::new(
            self.transport,
            self.pipeline,
            self.handles,
            EventBus::new(self.channel_capacity),
            self.mode,
            self.poll_timeout,
        );
        ScanLoop {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests;
