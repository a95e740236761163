//! Stream task state machine
//!
//! ```text
//! created ──deploy──► running ──pause──► paused
//!    ▲                   ▲  │              │
//!    │                   │  └──resume◄─────┘
//!    │                   └──────stop───────┴──► stopped
//!    │
//!    └──acknowledge── error ◄── engine failure (from created, running, paused)
//! ```
//!
//! Transitions are checked before any engine call is made. Deploying a task
//! that is already running is a no-op, not a conflict.

use serde::{Deserialize, Serialize};
use signalhouse_metadata::StreamStatus;
use std::fmt;

/// An operator request against a stream task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamAction {
    Deploy,
    Pause,
    Resume,
    Stop,
    Acknowledge,
    Delete,
}

impl StreamAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamAction::Deploy => "deploy",
            StreamAction::Pause => "pause",
            StreamAction::Resume => "resume",
            StreamAction::Stop => "stop",
            StreamAction::Acknowledge => "acknowledge",
            StreamAction::Delete => "delete",
        }
    }

    /// State reached when the action succeeds from `from`, or `None` when the
    /// action is not valid there. `Delete` has no successor state; a valid
    /// delete reports the current state.
    pub fn next_status(&self, from: StreamStatus) -> Option<StreamStatus> {
        use StreamStatus::*;
        match (self, from) {
            (StreamAction::Deploy, Created) => Some(Running),
            (StreamAction::Deploy, Running) => Some(Running),
            (StreamAction::Pause, Running) => Some(Paused),
            (StreamAction::Resume, Paused) => Some(Running),
            (StreamAction::Stop, Running | Paused) => Some(Stopped),
            (StreamAction::Acknowledge, Error) => Some(Created),
            (StreamAction::Delete, Created | Stopped | Error) => Some(from),
            _ => None,
        }
    }

    /// Whether a failure of this action's engine call moves the task to
    /// `error`.
    pub fn fails_into_error(&self) -> bool {
        matches!(
            self,
            StreamAction::Deploy | StreamAction::Pause | StreamAction::Resume | StreamAction::Stop
        )
    }
}

impl fmt::Display for StreamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
