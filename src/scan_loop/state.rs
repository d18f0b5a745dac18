//! Scan modes and loop states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How long a poll waits for a tag before giving up. Long enough to mean
/// "until stopped".
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Operating mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Run one cycle per `start()`.
    SingleScan,
    /// Keep polling, pausing for `idle` between cycles.
    RepeatPolling { idle: Duration },
}

impl ScanMode {
    pub const fn single_scan() -> Self {
        Self::SingleScan
    }

    pub const fn repeat_polling(idle: Duration) -> Self {
        Self::RepeatPolling { idle }
    }

    /// Whether the loop reschedules itself after each cycle.
    pub const fn is_continuous(self) -> bool {
        matches!(self, Self::RepeatPolling { .. })
    }

    /// Pause between cycles, `None` in single-scan mode.
    pub const fn idle_duration(self) -> Option<Duration> {
        match self {
            Self::SingleScan => None,
            Self::RepeatPolling { idle } => Some(idle),
        }
    }
}

impl Default for ScanMode {
    fn default() -> Self {
        Self::SingleScan
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleScan => write!(f, "single scan"),
            Self::RepeatPolling { idle } => {
                write!(f, "repeat polling (idle {}ms)", idle.as_millis())
            }
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// Not running and no cycle in flight.
    Idle,
    /// Waiting on the hardware poll.
    Acquiring,
    /// Detecting and encrypting an acquired tag.
    Processing,
    /// Pausing between continuous-mode cycles.
    Pacing,
    /// Halted by `stop()`; `start()` runs it again.
    Stopped,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::Processing => write!(f, "processing"),
            Self::Pacing => write!(f, "pacing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
