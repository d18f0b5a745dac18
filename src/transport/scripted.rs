//! Scripted in-process transport.
//!
//! Plays back a fixed sequence of poll outcomes. Once the script runs out,
//! `poll` behaves like an empty reader field: it waits until the session is
//! released or the timeout elapses. Scripts can be loaded from JSON fixtures:
//!
//! ```json
//! {
//!   "available": true,
//!   "steps": [
//!     { "outcome": "tag", "type": "iso_dep", "id": "04A1B2C3", "historical_bytes": "80:73" },
//!     { "outcome": "timeout" },
//!     { "outcome": "fail", "message": "field error" }
//!   ],
//!   "responses": ["9000"]
//! }
//! ```

use super::TagTransport;
use crate::error::{TransportError, TransportResult};
use crate::types::hex::decode_hex_id;
use crate::types::RawTag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// One scripted poll outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollStep {
    /// A tag enters the field.
    Tag(RawTag),
    /// The poll times out immediately.
    Timeout,
    /// The poll fails with a driver error.
    Fail { message: String },
    /// Nothing happens until the session is released or the timeout elapses.
    Wait,
}

/// A complete fixture for [`ScriptedTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub steps: Vec<PollStep>,
    /// Hex-encoded replies returned by successive `transceive` calls.
    #[serde(default)]
    pub responses: Vec<String>,
}

fn default_available() -> bool {
    true
}

/// A transport that replays a script instead of talking to hardware.
#[derive(Debug)]
pub struct ScriptedTransport {
    available: AtomicBool,
    fail_release: AtomicBool,
    steps: Mutex<VecDeque<PollStep>>,
    responses: Mutex<VecDeque<Vec<u8>>>,
    exchanges: Mutex<Vec<Vec<u8>>>,
    session_open: AtomicBool,
    /// Bumped on every release so pending waits can tell they were cut off.
    releases: watch::Sender<u64>,
    polls: AtomicUsize,
    finishes: AtomicUsize,
}

impl ScriptedTransport {
    /// Create an available transport that plays back `steps`.
    pub fn new(steps: impl IntoIterator<Item = PollStep>) -> Self {
        let (releases, _) = watch::channel(0);
        Self {
            available: AtomicBool::new(true),
            fail_release: AtomicBool::new(false),
            steps: Mutex::new(steps.into_iter().collect()),
            responses: Mutex::new(VecDeque::new()),
            exchanges: Mutex::new(Vec::new()),
            session_open: AtomicBool::new(false),
            releases,
            polls: AtomicUsize::new(0),
            finishes: AtomicUsize::new(0),
        }
    }

    /// Build a transport from a parsed script.
    pub fn from_script(script: Script) -> TransportResult<Self> {
        let responses = script
            .responses
            .iter()
            .map(|r| {
                decode_hex_id(r)
                    .ok_or_else(|| TransportError::Other(format!("invalid hex response: {}", r)))
            })
            .collect::<TransportResult<Vec<_>>>()?;

        let transport = Self::new(script.steps);
        transport.set_available(script.available);
        for response in responses {
            transport.push_response(response);
        }
        Ok(transport)
    }

    /// Load a JSON script from disk.
    pub fn from_file(path: &Path) -> TransportResult<Self> {
        let content = fs::read_to_string(path)?;
        let script: Script = serde_json::from_str(&content)
            .map_err(|e| TransportError::Other(format!("invalid script {}: {}", path.display(), e)))?;
        Self::from_script(script)
    }

    /// Set what `is_available` reports.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make subsequent `finish` calls fail (after counting them).
    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Append a poll outcome to the script.
    pub fn push_step(&self, step: PollStep) {
        lock(&self.steps).push_back(step);
    }

    /// Queue a reply for the next `transceive`.
    pub fn push_response(&self, response: Vec<u8>) {
        lock(&self.responses).push_back(response);
    }

    /// Number of `poll` calls so far.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Number of `finish` calls so far.
    pub fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    /// Commands sent through `transceive`, in order.
    pub fn exchanges(&self) -> Vec<Vec<u8>> {
        lock(&self.exchanges).clone()
    }

    /// Whether a tag session is currently held.
    pub fn session_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    async fn wait_for_release(&self, timeout: Duration) -> TransportResult<RawTag> {
        let mut released = self.releases.subscribe();
        self.session_open.store(true, Ordering::SeqCst);
        tokio::select! {
            _ = released.changed() => Err(TransportError::SessionClosed),
            () = tokio::time::sleep(timeout) => {
                self.session_open.store(false, Ordering::SeqCst);
                Err(TransportError::Timeout)
            }
        }
    }
}

#[async_trait]
impl TagTransport for ScriptedTransport {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn poll(&self, timeout: Duration) -> TransportResult<RawTag> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable);
        }

        let step = lock(&self.steps).pop_front().unwrap_or(PollStep::Wait);
        match step {
            PollStep::Tag(tag) => {
                self.session_open.store(true, Ordering::SeqCst);
                Ok(tag)
            }
            PollStep::Timeout => Err(TransportError::Timeout),
            PollStep::Fail { message } => Err(TransportError::Other(message)),
            PollStep::Wait => self.wait_for_release(timeout).await,
        }
    }

    async fn transceive(&self, command: &[u8]) -> TransportResult<Vec<u8>> {
        if !self.session_open() {
            return Err(TransportError::SessionClosed);
        }
        lock(&self.exchanges).push(command.to_vec());
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| TransportError::TagLost("no response from tag".to_string()))
    }

    async fn finish(&self) -> TransportResult<()> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        self.session_open.store(false, Ordering::SeqCst);
        self.releases.send_modify(|n| *n += 1);

        if self.fail_release.load(Ordering::SeqCst) {
            return Err(TransportError::Other("release rejected".to_string()));
        }
        Ok(())
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
