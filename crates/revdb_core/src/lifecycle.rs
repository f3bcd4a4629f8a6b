//! Host lifecycle state.
//!
//! The host drives the plugin through a fixed sequence of signals:
//!
//! ```text
//! not-ready --ready--> ready --enter--> foreground <--out/enter--> background
//!                                           |
//!                                        detach (stays foreground, detached)
//!
//! any state --exit--> exited (terminal)
//! ```
//!
//! Database access is allowed in every state from `ready` until `exit`.
//! Only the data-changed notification cares about foreground.

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;

/// Lifecycle state of the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Loaded, waiting for the ready signal.
    NotReady,
    /// Ready but not yet shown.
    Ready,
    /// Visible to the user.
    Foreground,
    /// Hidden but still running.
    Background,
    /// Shut down; nothing works any more.
    Exited,
}

impl LifecycleState {
    /// Whether database operations are allowed.
    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, Self::Ready | Self::Foreground | Self::Background)
    }
}

/// Signals the host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// One-time initialization finished.
    Ready,
    /// The plugin was opened.
    Enter,
    /// The plugin was hidden.
    Out,
    /// The plugin moved to its own window.
    Detach,
    /// The plugin is shutting down.
    Exit,
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    detached: bool,
}

/// Thread-safe lifecycle tracker.
#[derive(Debug)]
pub struct Lifecycle {
    inner: RwLock<Inner>,
}

impl Lifecycle {
    /// Creates a tracker in the `NotReady` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: LifecycleState::NotReady,
                detached: false,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.inner.read().state
    }

    /// Whether the plugin runs in its own window.
    pub fn is_detached(&self) -> bool {
        self.inner.read().detached
    }

    /// Whether the data-changed notification should be delivered.
    pub fn is_foreground(&self) -> bool {
        self.state() == LifecycleState::Foreground
    }

    /// Fails unless database operations are allowed.
    ///
    /// # Errors
    ///
    /// `NotReady` before the ready signal, `Exited` after exit.
    pub fn ensure_operational(&self) -> CoreResult<()> {
        match self.state() {
            LifecycleState::NotReady => Err(CoreError::NotReady),
            LifecycleState::Exited => Err(CoreError::Exited),
            _ => Ok(()),
        }
    }

    /// Applies a signal. Returns the new state.
    ///
    /// Signals that make no sense in the current state (a second `ready`,
    /// `enter` before `ready`, anything after `exit`) are ignored with a
    /// warning and leave the state unchanged.
    pub fn apply(&self, signal: HostSignal) -> LifecycleState {
        let mut inner = self.inner.write();
        let from = inner.state;

        let next = match (signal, from) {
            (_, LifecycleState::Exited) => None,
            (HostSignal::Exit, _) => Some(LifecycleState::Exited),
            (HostSignal::Ready, LifecycleState::NotReady) => Some(LifecycleState::Ready),
            (HostSignal::Ready, _) | (_, LifecycleState::NotReady) => None,
            (HostSignal::Enter, _) => Some(LifecycleState::Foreground),
            (HostSignal::Out, _) => Some(LifecycleState::Background),
            (HostSignal::Detach, LifecycleState::Foreground) => {
                inner.detached = true;
                Some(LifecycleState::Foreground)
            }
            (HostSignal::Detach, _) => None,
        };

        match next {
            Some(state) => {
                if signal == HostSignal::Out {
                    inner.detached = false;
                }
                inner.state = state;
                tracing::debug!(?signal, ?from, to = ?state, "lifecycle transition");
                state
            }
            None => {
                tracing::warn!(?signal, state = ?from, "ignoring lifecycle signal");
                from
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
