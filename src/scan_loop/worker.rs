//! The acquisition cycle.
//!
//! One worker task runs cycles back to back: poll, normalize, detect,
//! encrypt, publish, then (in continuous mode) pace and go again. The task
//! only ever holds the hardware session inside a cycle, and every exit from
//! a cycle releases it.

use super::state::{ScanMode, ScanState};
use crate::adapter;
use crate::bus::EventBus;
use crate::error::ScanResult;
use crate::pipeline::{DetectionPipeline, Detector, Encrypted, Encrypter};
use crate::transport::{release_quietly, TagTransport};
use crate::types::HandleFactory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, debug_span, warn, Instrument};

/// How a cycle ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Published,
    /// A tag was present but the detector did not recognise it.
    Unrecognized,
    /// `stop()` arrived while waiting for a tag.
    Cancelled,
}

/// State shared between the [`ScanLoop`](super::ScanLoop) handle and its
/// worker task.
pub(super) struct Shared<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    pub(super) transport: Arc<dyn TagTransport>,
    pub(super) pipeline: DetectionPipeline<D, E>,
    pub(super) handles: Arc<dyn HandleFactory>,
    pub(super) bus: EventBus<Encrypted<D, E>>,
    pub(super) mode: ScanMode,
    pub(super) poll_timeout: Duration,
    /// Run flag. Written only by start/stop; the worker reads it.
    pub(super) running: watch::Sender<bool>,
    pub(super) state: watch::Sender<ScanState>,
    cycles: AtomicU64,
}

impl<D, E> Shared<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    pub(super) fn new(
        transport: Arc<dyn TagTransport>,
        pipeline: DetectionPipeline<D, E>,
        handles: Arc<dyn HandleFactory>,
        bus: EventBus<Encrypted<D, E>>,
        mode: ScanMode,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            pipeline,
            handles,
            bus,
            mode,
            poll_timeout,
            running: watch::Sender::new(false),
            state: watch::Sender::new(ScanState::Idle),
            cycles: AtomicU64::new(0),
        }
    }

    pub(super) fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub(super) fn set_state(&self, state: ScanState) {
        self.state.send_replace(state);
    }

    /// Worker body: cycles until single-shot completion or `stop()`.
    pub(super) async fn run(self: Arc<Self>) {
        loop {
            let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
            self.cycle()
                .instrument(debug_span!("scan_cycle", cycle))
                .await;

            let Some(idle) = self.mode.idle_duration() else {
                break;
            };
            if !self.is_running() {
                break;
            }
            self.pace(idle).await;
            if !self.is_running() {
                break;
            }
        }

        let state = if self.is_running() {
            ScanState::Idle
        } else {
            ScanState::Stopped
        };
        self.set_state(state);
        debug!(%state, "scan worker finished");
    }

    /// Run one cycle and route its result.
    async fn cycle(&self) {
        match self.acquire_and_process().await {
            Ok(CycleOutcome::Published) => debug!("identity published"),
            Ok(CycleOutcome::Unrecognized) => debug!("tag not recognised"),
            Ok(CycleOutcome::Cancelled) => debug!("tag poll cancelled"),
            Err(e) if e.is_timeout() => {
                // The transport closes its own session on timeout.
                debug!("tag poll timed out");
            }
            Err(e) => {
                release_quietly(self.transport.as_ref()).await;
                warn!(error = %e, "scan cycle failed");
                self.bus.publish_error(e);
            }
        }
    }

    async fn acquire_and_process(&self) -> ScanResult<CycleOutcome> {
        self.set_state(ScanState::Acquiring);
        let raw = tokio::select! {
            biased;
            () = self.stopped() => {
                release_quietly(self.transport.as_ref()).await;
                return Ok(CycleOutcome::Cancelled);
            }
            polled = self.transport.poll(self.poll_timeout) => match polled {
                Ok(raw) => raw,
                // stop() released the session out from under the wait.
                Err(e) if !self.is_running() => {
                    debug!(error = %e, "tag poll ended by stop");
                    return Ok(CycleOutcome::Cancelled);
                }
                Err(e) => return Err(e.into()),
            },
        };

        self.set_state(ScanState::Processing);
        let tag = adapter::normalize(raw, self.handles.next_handle(), Arc::clone(&self.transport));
        debug!(handle = %tag.handle(), tag_type = %tag.tag_type(), "tag acquired");

        let Some(identity) = self.pipeline.detect(&tag).await? else {
            release_quietly(self.transport.as_ref()).await;
            return Ok(CycleOutcome::Unrecognized);
        };
        drop(tag);

        // The session is no longer needed once detection is done; release it
        // while the identity is being encrypted.
        let transport = Arc::clone(&self.transport);
        let release = tokio::spawn(async move { release_quietly(transport.as_ref()).await });

        let published = self.pipeline.encrypt(identity).await.map(|encrypted| {
            let subscribers = self.bus.publish_identity(encrypted);
            debug!(subscribers, "encrypted identity sent");
            CycleOutcome::Published
        });

        if let Err(e) = release.await {
            debug!(error = %e, "session release task failed");
        }
        Ok(published?)
    }

    /// Continuous-mode pause between cycles, bracketed by idle signals.
    async fn pace(&self, idle: Duration) {
        self.set_state(ScanState::Pacing);
        self.bus.publish_idle(true);
        tokio::select! {
            () = tokio::time::sleep(idle) => {}
            () = self.stopped() => debug!("pacing cut short by stop"),
        }
        self.bus.publish_idle(false);
    }

    /// Resolves once the run flag is cleared.
    async fn stopped(&self) {
        let mut running = self.running.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = running.wait_for(|running| !*running).await;
    }
}
