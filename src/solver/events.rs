//! Event channel from solver sessions to an observer.
//!
//! Uses a std::sync::mpsc channel. The session only sends; it never waits on
//! the observer, and a missing or disconnected observer is not an error.

use std::sync::mpsc::{channel, Receiver, Sender};

use super::detect::CellReading;
use super::sequence::{Grid, KeyRequest};
use super::session::SessionState;

/// Progress notifications published by a session.
#[derive(Debug, Clone)]
pub enum SolverEvent {
    /// The session entered a new state
    StateChanged { state: SessionState, message: String },
    /// Detection produced a grid
    GridDetected {
        grid: Grid,
        readings: Vec<CellReading>,
    },
    /// A key was injected
    KeyPressed { request: KeyRequest },
    /// Injecting a key failed; the sequence continued
    KeyFailed { request: KeyRequest, error: String },
    /// The status display cooldown elapsed; clear the grid display
    Reset,
}

/// Creates a new event channel.
///
/// The sender goes to the session, the receiver to the observer. The channel
/// is unbounded, so a slow observer never stalls key timing.
pub fn create_event_channel() -> (Sender<SolverEvent>, Receiver<SolverEvent>) {
    channel()
}

/// Sending half held by a session. Sends are fire-and-forget.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    sender: Option<Sender<SolverEvent>>,
}

impl EventSink {
    pub fn new(sender: Sender<SolverEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink without observer.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SolverEvent) {
        if let Some(sender) = &self.sender {
            // The observer may have gone away; the session carries on regardless
            let _ = sender.send(event);
        }
    }
}

impl From<Option<Sender<SolverEvent>>> for EventSink {
    fn from(sender: Option<Sender<SolverEvent>>) -> Self {
        Self { sender }
    }
}
