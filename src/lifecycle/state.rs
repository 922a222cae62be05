//! Server state machine.
//!
//! ```text
//! Idle → Starting → Listening → Stopping → Stopped
//!            └──────── bind failure ───────────┘
//! Idle → Stopped (stop before start)
//! ```
//!
//! `Stopped` is terminal.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Idle = 0,
    Starting = 1,
    Listening = 2,
    Stopping = 3,
    Stopped = 4,
}

impl From<u8> for ServerState {
    fn from(val: u8) -> Self {
        match val {
            0 => ServerState::Idle,
            1 => ServerState::Starting,
            2 => ServerState::Listening,
            3 => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Idle => "idle",
            ServerState::Starting => "starting",
            ServerState::Listening => "listening",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl ServerState {
    fn allows(self, to: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (self, to),
            (Idle, Starting)
                | (Idle, Stopped)
                | (Starting, Listening)
                | (Starting, Stopped)
                | (Listening, Stopping)
                | (Stopping, Stopped)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ServerState,
    pub to: ServerState,
}

/// Atomic holder for a [`ServerState`].
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServerState::Idle as u8),
        }
    }

    pub fn current(&self) -> ServerState {
        ServerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`, failing if the current state is not `from`
    /// or the edge is not part of the machine.
    pub fn transition(&self, from: ServerState, to: ServerState) -> Result<(), InvalidTransition> {
        if !from.allows(to) {
            return Err(InvalidTransition { from, to });
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| InvalidTransition {
                from: ServerState::from(actual),
                to,
            })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
