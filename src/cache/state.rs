//! Cache Lifecycle
//!
//! Open/Closed state machine shared by the cache core and its sweeper.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{CacheError, Result};

/// Lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    Closed,
}

impl State {
    fn from_u8(raw: u8) -> Self {
        if raw == State::Open as u8 {
            State::Open
        } else {
            State::Closed
        }
    }
}

// == Lifecycle ==
/// Atomic cell holding the current [`State`].
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Starts in `Open`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Open as u8),
        }
    }

    pub fn current(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.current() == State::Closed
    }

    /// Guard for every public entry point.
    pub fn ensure_open(&self) -> Result<()> {
        match self.current() {
            State::Open => Ok(()),
            State::Closed => Err(CacheError::Closed),
        }
    }

    /// Moves to `Closed`. Returns true only for the call that made the transition.
    pub fn close(&self) -> bool {
        self.state
            .compare_exchange(
                State::Open as u8,
                State::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
