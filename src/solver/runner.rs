//! Session runner - entry point for triggered solves.
//!
//! Spawns the session thread, drives the state machine, and holds the
//! status on display for the cooldown before resetting to idle. Only one
//! session runs at a time.

use anyhow::{anyhow, Result};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::config::{get_config, SolverConfig};
use super::events::{EventSink, SolverEvent};
use super::executor::CancelFlag;
use super::input::KeyInjector;
use super::session::{SessionState, SolverSession};
use crate::capture::FrameSource;
use crate::glyph::LetterClassifier;
use crate::grid::DisplayGeometry;

/// Global flag indicating a session (or its status cooldown) is active.
static SESSION_RUNNING: AtomicBool = AtomicBool::new(false);

/// Cancel flag of the active session.
static ACTIVE_CANCEL: Mutex<Option<CancelFlag>> = Mutex::new(None);

/// Status text of the active or most recent session.
static LAST_STATUS: Mutex<String> = Mutex::new(String::new());

/// Everything a session needs besides configuration.
pub struct SessionRequest {
    pub source: Box<dyn FrameSource>,
    pub injector: Box<dyn KeyInjector>,
    pub display: DisplayGeometry,
    pub classifier: Arc<dyn LetterClassifier>,
    /// Observer channel; `None` runs without one
    pub events: Option<Sender<SolverEvent>>,
}

/// Checks if a session is currently running.
pub fn is_session_running() -> bool {
    SESSION_RUNNING.load(Ordering::SeqCst)
}

/// Asks the active session to stop. Keys already pressed stay pressed.
pub fn request_stop() {
    match ACTIVE_CANCEL.lock() {
        Ok(active) => {
            if let Some(cancel) = active.as_ref() {
                crate::log("Stop requested");
                cancel.cancel();
            }
        }
        Err(e) => crate::log(&format!("Failed to request stop: {}", e)),
    }
}

/// Gets the current status text (for an observer display).
pub fn last_status() -> String {
    LAST_STATUS
        .lock()
        .map(|s| s.clone())
        .unwrap_or_else(|_| "Unknown".to_string())
}

fn set_status(status: &str) {
    if let Ok(mut s) = LAST_STATUS.lock() {
        *s = status.to_string();
    }
}

fn set_active_cancel(cancel: Option<CancelFlag>) {
    if let Ok(mut active) = ACTIVE_CANCEL.lock() {
        *active = cancel;
    }
}

/// Claim on the single session slot.
///
/// Dropping it frees the slot, including when the session thread unwinds
/// or never starts.
struct SessionSlot;

impl Drop for SessionSlot {
    fn drop(&mut self) {
        if thread::panicking() {
            crate::log("Session thread panicked");
            set_status(&SessionState::Error("session thread panicked".to_string()).description());
        }
        crate::set_session_log(None);
        set_active_cancel(None);
        SESSION_RUNNING.store(false, Ordering::SeqCst);
    }
}

/// Starts a session with the current global configuration.
///
/// Returns immediately after spawning the session thread. The thread ends
/// after the status cooldown, when `is_session_running()` turns false.
///
/// # Errors
/// Returns an error if a session is already running.
pub fn start_session(request: SessionRequest) -> Result<JoinHandle<SessionState>> {
    start_session_with(get_config(), request)
}

/// Starts a session with an explicit configuration snapshot.
pub fn start_session_with(
    config: Arc<SolverConfig>,
    request: SessionRequest,
) -> Result<JoinHandle<SessionState>> {
    if SESSION_RUNNING.swap(true, Ordering::SeqCst) {
        return Err(anyhow!("A session is already running"));
    }
    let slot = SessionSlot;

    let cancel = CancelFlag::new();
    set_active_cancel(Some(cancel.clone()));
    set_status(&SessionState::Idle.description());

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let session_log = crate::paths::get_session_logs_dir().join(format!("{}.log", timestamp));
    crate::set_session_log(Some(session_log));

    let spawned = thread::Builder::new()
        .name("solver-session".to_string())
        .spawn(move || {
            let _slot = slot;
            let state = run_session(config, cancel, request);
            crate::log("Session thread finished");
            state
        });

    // A failed spawn drops the closure, and the slot with it
    spawned.map_err(|e| anyhow!("Failed to spawn session thread: {}", e))
}

/// Runs one session (called from the session thread).
fn run_session(config: Arc<SolverConfig>, cancel: CancelFlag, request: SessionRequest) -> SessionState {
    let events = EventSink::from(request.events);
    let cooldown = Duration::from_millis(config.status_cooldown_ms);

    let mut session = SolverSession::new(
        config,
        cancel,
        request.display,
        request.classifier,
        request.source,
        request.injector,
        events.clone(),
    );

    loop {
        set_status(&session.status_message());
        match session.step() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                session.fail_with(e.to_string());
                break;
            }
        }
    }

    let final_state = session.state.clone();
    let status = session.status_message();
    set_status(&status);
    match &final_state {
        SessionState::Complete => crate::log(&format!("Session completed: {}", status)),
        SessionState::Stopped => crate::log(&format!("Session stopped: {}", status)),
        SessionState::Error(msg) => crate::log(&format!("Session failed: {}", msg)),
        _ => {}
    }

    // Keep the result on display; a new trigger is refused meanwhile
    thread::sleep(cooldown);

    events.emit(SolverEvent::Reset);
    set_status(&SessionState::Idle.description());
    events.emit(SolverEvent::StateChanged {
        state: SessionState::Idle,
        message: SessionState::Idle.description(),
    });

    final_state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, StaticFrameSource};
    use crate::glyph::heuristic::HeuristicClassifier;
    use crate::solver::detect::test_frames::{self, Shape};
    use crate::solver::events::create_event_channel;
    use crate::solver::input::LogInjector;
    use std::sync::mpsc::{channel, Receiver};

    /// The runner is process-global; its tests must not overlap.
    static RUNNER_LOCK: Mutex<()> = Mutex::new(());

    /// Frame source that waits for a go signal before returning its frame.
    struct GatedSource {
        frame: Frame,
        gate: Receiver<()>,
    }

    impl FrameSource for GatedSource {
        fn capture(&mut self) -> Result<Frame> {
            self.gate
                .recv()
                .map_err(|_| anyhow!("gate closed"))?;
            Ok(self.frame.clone())
        }
    }

    /// Frame source whose capture panics.
    struct PanickingSource;

    impl FrameSource for PanickingSource {
        fn capture(&mut self) -> Result<Frame> {
            panic!("capture device vanished");
        }
    }

    fn request(source: Box<dyn FrameSource>, events: Option<Sender<SolverEvent>>) -> SessionRequest {
        SessionRequest {
            source,
            injector: Box::new(LogInjector::new()),
            display: DisplayGeometry::new(172, 172),
            classifier: Arc::new(HeuristicClassifier::new(30)),
            events,
        }
    }

    #[test]
    fn test_session_runs_and_resets() {
        let _guard = RUNNER_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let frame = test_frames::puzzle_frame([Shape::Block; 9]);
        let (sender, receiver) = create_event_channel();

        let handle = start_session_with(
            Arc::new(test_frames::config()),
            request(Box::new(StaticFrameSource::new(frame)), Some(sender)),
        )
        .unwrap();
        assert_eq!(handle.join().unwrap(), SessionState::Complete);
        assert!(!is_session_running());
        assert_eq!(last_status(), "Ready");

        let events: Vec<SolverEvent> = receiver.iter().collect();
        let keys = events
            .iter()
            .filter(|e| matches!(e, SolverEvent::KeyPressed { .. }))
            .count();
        assert_eq!(keys, 9);
        assert!(matches!(events[events.len() - 2], SolverEvent::Reset));
        assert!(matches!(
            events.last(),
            Some(SolverEvent::StateChanged { state: SessionState::Idle, .. })
        ));
    }

    #[test]
    fn test_second_trigger_is_refused_while_busy() {
        let _guard = RUNNER_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let (go, gate) = channel();
        let source = GatedSource {
            frame: test_frames::puzzle_frame([Shape::Block; 9]),
            gate,
        };

        let handle =
            start_session_with(Arc::new(test_frames::config()), request(Box::new(source), None))
                .unwrap();
        assert!(is_session_running());

        let second = start_session_with(
            Arc::new(test_frames::config()),
            request(Box::new(StaticFrameSource::new(test_frames::puzzle_frame([Shape::Block; 9]))), None),
        );
        assert!(second.is_err());

        go.send(()).unwrap();
        assert_eq!(handle.join().unwrap(), SessionState::Complete);
        assert!(!is_session_running());
    }

    #[test]
    fn test_request_stop_cancels_active_session() {
        let _guard = RUNNER_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let (go, gate) = channel();
        let source = GatedSource {
            frame: test_frames::puzzle_frame([Shape::Block; 9]),
            gate,
        };

        let handle =
            start_session_with(Arc::new(test_frames::config()), request(Box::new(source), None))
                .unwrap();
        request_stop();
        go.send(()).unwrap();

        assert_eq!(handle.join().unwrap(), SessionState::Stopped);
    }

    #[test]
    fn test_panicking_session_frees_the_slot() {
        let _guard = RUNNER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let handle =
            start_session_with(Arc::new(test_frames::config()), request(Box::new(PanickingSource), None))
                .unwrap();
        assert!(handle.join().is_err());
        assert!(!is_session_running());
        assert!(last_status().starts_with("Failed"));

        // The next trigger is accepted
        let frame = test_frames::puzzle_frame([Shape::Block; 9]);
        let handle = start_session_with(
            Arc::new(test_frames::config()),
            request(Box::new(StaticFrameSource::new(frame)), None),
        )
        .unwrap();
        assert_eq!(handle.join().unwrap(), SessionState::Complete);
        assert!(!is_session_running());
    }
}
