//! # svcwrap-state
//!
//! The service lifecycle state enum.
//!
//! The state machine itself is driven by the `Service` controller; this
//! crate only defines the states and the predicates other crates key off
//! (most importantly the tail loop's reschedule gate).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Constructed with a valid command, not currently running.
    Ready,
    /// Child process running and past its warm-up wait.
    Started,
    /// Explicitly halted or exited on its own.
    Stopped,
    /// Transient state between teardown and re-spawn.
    Restarting,
    /// Constructed without a command; permanently inert.
    Undefined,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Ready => write!(f, "ready"),
            ServiceState::Started => write!(f, "started"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Restarting => write!(f, "restarting"),
            ServiceState::Undefined => write!(f, "undefined"),
        }
    }
}

impl ServiceState {
    /// Check if the service accepts lifecycle operations at all.
    ///
    /// `Undefined` is terminal: every lifecycle method is a silent no-op
    /// for the whole lifetime of the instance.
    pub fn accepts_control(&self) -> bool {
        !matches!(self, ServiceState::Undefined)
    }

    /// Check if the tail loop may reschedule its next poll cycle.
    ///
    /// A tailer must not keep polling a process that has stopped or is
    /// restarting, and must not resurrect itself without an explicit
    /// re-enable.
    pub fn allows_tailing(&self) -> bool {
        matches!(self, ServiceState::Ready | ServiceState::Started)
    }

    /// Check if a child process may be attached to this state.
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Started | ServiceState::Restarting)
    }
}
