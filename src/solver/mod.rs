//! Solving pipeline from frame to key presses.
//!
//! This module provides:
//! - Configuration loading and the global config snapshot
//! - Parallel per-cell detection
//! - Key sequence execution with jittered timing and cancellation
//! - The session state machine and its background runner

pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod executor;
pub mod input;
pub mod runner;
pub mod sequence;
pub mod session;

pub use config::{get_config, init_config, update_config, SolverConfig};
pub use events::{create_event_channel, SolverEvent};
pub use input::{KeyInjector, LogInjector};
#[cfg(windows)]
pub use input::SendInputInjector;
pub use runner::{is_session_running, last_status, request_stop, start_session, SessionRequest};
pub use session::SessionState;
