//! Solver session state machine.
//!
//! One session covers one trigger-to-completion cycle:
//! Idle → Detecting → Executing → Complete, with Error and Stopped as the
//! other terminal states. Cancellation is checked before each step.

use anyhow::{anyhow, Result};
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::config::SolverConfig;
use super::detect::{Detection, Detector};
use super::diagnostics::save_detection_artifacts;
use super::error::SolveError;
use super::events::{EventSink, SolverEvent};
use super::executor::{CancelFlag, ExecutionReport, ExecutionState, SequenceExecutor};
use super::input::KeyInjector;
use crate::capture::FrameSource;
use crate::glyph::LetterClassifier;
use crate::grid::DisplayGeometry;

/// Session states.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Created, not started
    Idle,
    /// Capturing a frame and reading the grid
    Detecting,
    /// Pressing the keys
    Executing,
    /// All keys went out
    Complete,
    /// Detection or execution failed
    Error(String),
    /// Cancelled by the user
    Stopped,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Error(_) | SessionState::Stopped
        )
    }

    /// Status text for an observer.
    pub fn description(&self) -> String {
        match self {
            SessionState::Idle => "Ready".to_string(),
            SessionState::Detecting => "Reading grid...".to_string(),
            SessionState::Executing => "Entering keys...".to_string(),
            SessionState::Complete => "Solved".to_string(),
            SessionState::Error(msg) => format!("Failed: {}", msg),
            SessionState::Stopped => "Stopped by user".to_string(),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Detecting => write!(f, "Detecting"),
            SessionState::Executing => write!(f, "Executing"),
            SessionState::Complete => write!(f, "Complete"),
            SessionState::Error(msg) => write!(f, "Error: {}", msg),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One solving attempt with its own configuration snapshot.
pub struct SolverSession {
    /// Current state
    pub state: SessionState,
    config: Arc<SolverConfig>,
    cancel: CancelFlag,
    display: DisplayGeometry,
    detector: Detector,
    executor: SequenceExecutor,
    source: Box<dyn FrameSource>,
    injector: Box<dyn KeyInjector>,
    events: EventSink,
    /// Last successful detection
    pub detection: Option<Detection>,
    /// Typed cause of an Error state
    pub last_error: Option<SolveError>,
    pub execution: Option<ExecutionReport>,
    start_time: Instant,
}

impl SolverSession {
    /// Creates a session. The configuration is not re-read afterwards.
    pub fn new(
        config: Arc<SolverConfig>,
        cancel: CancelFlag,
        display: DisplayGeometry,
        classifier: Arc<dyn LetterClassifier>,
        source: Box<dyn FrameSource>,
        injector: Box<dyn KeyInjector>,
        events: EventSink,
    ) -> Self {
        let detector = Detector::new(Arc::clone(&config), classifier);
        let executor = SequenceExecutor::new(config.timing, cancel.clone());
        Self {
            state: SessionState::Idle,
            config,
            cancel,
            display,
            detector,
            executor,
            source,
            injector,
            events,
            detection: None,
            last_error: None,
            execution: None,
            start_time: Instant::now(),
        }
    }

    /// Advances the session by one step.
    ///
    /// Returns `Ok(true)` while there is more to do, `Ok(false)` once a
    /// terminal state is reached.
    pub fn step(&mut self) -> Result<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }

        if self.cancel.is_cancelled() {
            crate::log(&format!("Stop requested while {}", self.state));
            self.transition(SessionState::Stopped);
            return Ok(false);
        }

        match &self.state {
            SessionState::Idle => {
                crate::log(&format!(
                    "Starting session: {}x{} display, {} classifier, {} corrections",
                    self.display.width,
                    self.display.height,
                    self.detector.classifier_name(),
                    self.detector.correction_count()
                ));
                self.start_time = Instant::now();
                self.transition(SessionState::Detecting);
                Ok(true)
            }

            SessionState::Detecting => {
                let detection = match self.detect() {
                    Ok(detection) => detection,
                    Err(e) => {
                        self.fail(e);
                        return Ok(false);
                    }
                };

                let unknown = detection.grid.unknown_count();
                crate::log(&format!(
                    "Grid detected at {} in {}ms ({} unknown):\n{}",
                    detection.rect, detection.elapsed_ms, unknown, detection.grid
                ));
                for reading in &detection.readings {
                    crate::log(&format!(
                        "  cell ({}, {}): raw {} -> {} | px={} aspect={:.2} L={:.2} B={:.2} hole={} | {}us",
                        reading.row,
                        reading.col,
                        reading.raw,
                        reading.corrected,
                        reading.signature.cyan_pixel_count,
                        reading.signature.aspect_ratio,
                        reading.signature.left_heavy,
                        reading.signature.bottom_heavy,
                        reading.signature.center_hole,
                        reading.elapsed_us
                    ));
                }
                self.events.emit(SolverEvent::GridDetected {
                    grid: detection.grid,
                    readings: detection.readings.clone(),
                });

                if self.config.save_debug_images {
                    self.save_artifacts(&detection);
                }

                let too_many = unknown > self.config.max_unknown_cells;
                self.detection = Some(detection);
                if too_many {
                    self.fail(SolveError::DetectionFailure { unknown });
                    return Ok(false);
                }

                self.transition(SessionState::Executing);
                Ok(true)
            }

            SessionState::Executing => {
                let sequence = self
                    .detection
                    .as_ref()
                    .map(|d| d.grid.key_sequence())
                    .ok_or_else(|| anyhow!("Executing without a detected grid"))?;

                crate::log(&format!(
                    "Pressing {} keys: {}",
                    sequence.len(),
                    sequence.keys()
                ));
                let report = self
                    .executor
                    .run(&sequence, self.injector.as_mut(), &self.events);
                self.execution = Some(report);

                let next = match report.state {
                    ExecutionState::Cancelled => SessionState::Stopped,
                    ExecutionState::Failed => {
                        SessionState::Error(format!("all {} key presses failed", report.failed))
                    }
                    _ => SessionState::Complete,
                };
                self.transition(next);
                Ok(false)
            }

            SessionState::Complete | SessionState::Error(_) | SessionState::Stopped => Ok(false),
        }
    }

    /// Steps until a terminal state and returns it.
    pub fn run_to_completion(&mut self) -> Result<SessionState> {
        while self.step()? {}
        Ok(self.state.clone())
    }

    /// Human-readable status for the current state.
    pub fn status_message(&self) -> String {
        match &self.state {
            SessionState::Complete => {
                let pressed = self.execution.map(|r| r.pressed).unwrap_or(0);
                let keys = self
                    .detection
                    .as_ref()
                    .map(|d| d.grid.key_sequence().keys())
                    .unwrap_or_default();
                format!(
                    "Solved: {} keys ({}) in {}ms",
                    pressed,
                    keys,
                    self.start_time.elapsed().as_millis()
                )
            }
            SessionState::Stopped => match self.execution {
                Some(report) => format!("Stopped after {} keys", report.pressed),
                None => "Stopped before any key was pressed".to_string(),
            },
            other => other.description(),
        }
    }

    fn detect(&mut self) -> Result<Detection, SolveError> {
        let frame = self.source.capture().map_err(SolveError::Capture)?;
        self.detector.detect(&frame, self.display)
    }

    fn fail(&mut self, error: SolveError) {
        if error.is_fatal() {
            crate::log(&format!("Session failed (check grid config): {}", error));
        } else {
            crate::log(&format!("Session failed: {}", error));
        }
        let message = error.to_string();
        self.last_error = Some(error);
        self.transition(SessionState::Error(message));
    }

    /// Ends the session in Error for a failure outside the typed detection errors.
    pub(crate) fn fail_with(&mut self, message: String) {
        crate::log(&format!("Session failed: {}", message));
        self.transition(SessionState::Error(message));
    }

    fn transition(&mut self, state: SessionState) {
        self.state = state;
        let message = self.status_message();
        crate::log(&format!("Session state: {} ({})", self.state, message));
        self.events.emit(SolverEvent::StateChanged {
            state: self.state.clone(),
            message,
        });
    }

    fn save_artifacts(&self, detection: &Detection) {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S%.3f").to_string();
        let dir = crate::paths::get_debug_dir().join(timestamp);
        match save_detection_artifacts(&dir, detection) {
            Ok(path) => crate::log(&format!("Debug artifacts saved to {}", path.display())),
            Err(e) => crate::log(&format!("Failed to save debug artifacts: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, ImageFileSource, StaticFrameSource};
    use crate::glyph::heuristic::HeuristicClassifier;
    use crate::glyph::template::TemplateClassifier;
    use crate::glyph::Symbol;
    use crate::solver::detect::test_frames::{self, Shape};
    use crate::solver::events::create_event_channel;
    use crate::solver::input::LogInjector;
    use crate::solver::sequence::KeyRequest;
    use image::RgbaImage;
    use std::sync::mpsc::Receiver;
    use std::sync::Mutex;

    /// Injector whose presses can be inspected after the session took ownership.
    #[derive(Clone, Default)]
    struct SharedInjector {
        pressed: Arc<Mutex<Vec<KeyRequest>>>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl KeyInjector for SharedInjector {
        fn press(&mut self, request: &KeyRequest) -> Result<()> {
            let mut pressed = self.pressed.lock().unwrap();
            pressed.push(*request);
            if let Some((n, cancel)) = &self.cancel_after {
                if pressed.len() == *n {
                    cancel.cancel();
                }
            }
            Ok(())
        }
    }

    fn session_with(
        frame: Frame,
        injector: Box<dyn KeyInjector>,
        cancel: CancelFlag,
    ) -> (SolverSession, Receiver<SolverEvent>) {
        let config = test_frames::config();
        let classifier = Arc::new(HeuristicClassifier::new(config.min_foreground_pixels));
        session_using(config, classifier, frame, injector, cancel)
    }

    fn session_using(
        config: SolverConfig,
        classifier: Arc<dyn LetterClassifier>,
        frame: Frame,
        injector: Box<dyn KeyInjector>,
        cancel: CancelFlag,
    ) -> (SolverSession, Receiver<SolverEvent>) {
        let display = DisplayGeometry::new(frame.width(), frame.height());
        let (sender, receiver) = create_event_channel();
        let session = SolverSession::new(
            Arc::new(config),
            cancel,
            display,
            classifier,
            Box::new(StaticFrameSource::new(frame)),
            injector,
            EventSink::new(sender),
        );
        (session, receiver)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "Idle");
        assert_eq!(SessionState::Error("x".into()).to_string(), "Error: x");
        assert!(SessionState::Stopped.is_terminal());
        assert!(!SessionState::Executing.is_terminal());
    }

    #[test]
    fn test_full_solve_presses_row_major() {
        use Shape::*;
        let frame = test_frames::puzzle_frame([
            Block, Ring, Wide,
            Empty, Block, Empty,
            Wide, Wide, Ring,
        ]);
        let injector = SharedInjector::default();
        let pressed = Arc::clone(&injector.pressed);
        let (mut session, receiver) = session_with(frame, Box::new(injector), CancelFlag::new());

        assert!(session.step().unwrap(), "Idle -> Detecting");
        assert_eq!(session.state, SessionState::Detecting);
        assert!(session.step().unwrap(), "Detecting -> Executing");
        assert_eq!(session.state, SessionState::Executing);
        assert!(!session.step().unwrap());
        assert_eq!(session.state, SessionState::Complete);
        assert!(!session.step().unwrap(), "terminal states stay put");

        let keys: String = pressed.lock().unwrap().iter().map(|r| r.symbol.key()).collect();
        assert_eq!(keys, "SRWSWWR");
        assert!(session.status_message().starts_with("Solved: 7 keys (SRWSWWR)"));

        let states: Vec<SessionState> = receiver
            .try_iter()
            .filter_map(|e| match e {
                SolverEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                SessionState::Detecting,
                SessionState::Executing,
                SessionState::Complete
            ]
        );
    }

    #[test]
    fn test_template_strategy_solves_without_corrections() {
        use Shape::*;
        let frame = test_frames::puzzle_frame([
            Block, Ring, Wide,
            Empty, Block, Empty,
            Wide, Wide, Ring,
        ]);
        let config = test_frames::template_config();
        let classifier = Arc::new(TemplateClassifier::new(
            test_frames::template_set(&config),
            config.foreground,
            config.min_foreground_pixels,
            config.min_template_score,
        ));
        let injector = SharedInjector::default();
        let pressed = Arc::clone(&injector.pressed);
        let (mut session, _rx) =
            session_using(config, classifier, frame, Box::new(injector), CancelFlag::new());

        assert_eq!(session.run_to_completion().unwrap(), SessionState::Complete);
        let keys: String = pressed.lock().unwrap().iter().map(|r| r.symbol.key()).collect();
        assert_eq!(keys, "SQWSWWQ");
        let indices: Vec<usize> = pressed.lock().unwrap().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4, 6, 7, 8]);
    }

    #[test]
    fn test_executing_without_grid_errors_and_fails_with_event() {
        let frame = test_frames::puzzle_frame([Shape::Block; 9]);
        let (mut session, receiver) =
            session_with(frame, Box::new(LogInjector::new()), CancelFlag::new());
        session.state = SessionState::Executing;

        let error = session.step().unwrap_err();
        assert!(!session.state.is_terminal());

        session.fail_with(error.to_string());
        assert_eq!(
            session.state,
            SessionState::Error("Executing without a detected grid".to_string())
        );
        assert!(receiver.try_iter().any(|e| matches!(
            e,
            SolverEvent::StateChanged { state: SessionState::Error(_), .. }
        )));
        assert!(!session.step().unwrap());
    }

    #[test]
    fn test_too_many_unknowns_fails_before_keys() {
        use Shape::*;
        let frame = test_frames::puzzle_frame([
            Block, Empty, Empty,
            Empty, Block, Empty,
            Empty, Empty, Block,
        ]);
        let injector = SharedInjector::default();
        let pressed = Arc::clone(&injector.pressed);
        let (mut session, receiver) = session_with(frame, Box::new(injector), CancelFlag::new());

        let state = session.run_to_completion().unwrap();

        assert!(matches!(state, SessionState::Error(_)));
        assert!(matches!(
            session.last_error,
            Some(SolveError::DetectionFailure { unknown: 6 })
        ));
        assert!(pressed.lock().unwrap().is_empty());
        assert!(session.detection.is_some(), "detection kept for diagnosis");
        assert!(!receiver
            .try_iter()
            .any(|e| matches!(e, SolverEvent::KeyPressed { .. })));
    }

    #[test]
    fn test_unknowns_at_ceiling_still_execute() {
        use Shape::*;
        let frame = test_frames::puzzle_frame([
            Block, Block, Empty,
            Empty, Block, Empty,
            Block, Empty, Empty,
        ]);
        let (mut session, _rx) = session_with(frame, Box::new(LogInjector::new()), CancelFlag::new());

        assert_eq!(session.run_to_completion().unwrap(), SessionState::Complete);
        assert_eq!(session.execution.map(|r| r.pressed), Some(4));
    }

    #[test]
    fn test_blank_screen_is_not_present() {
        let frame = Frame::from_image(RgbaImage::from_pixel(172, 172, test_frames::DARK));
        let (mut session, _rx) = session_with(frame, Box::new(LogInjector::new()), CancelFlag::new());

        session.run_to_completion().unwrap();
        assert!(matches!(session.last_error, Some(SolveError::NotPresent { .. })));
        assert!(session.execution.is_none());
    }

    #[test]
    fn test_capture_failure_is_error() {
        let config = test_frames::config();
        let classifier = Arc::new(HeuristicClassifier::new(config.min_foreground_pixels));
        let mut session = SolverSession::new(
            Arc::new(config),
            CancelFlag::new(),
            DisplayGeometry::new(172, 172),
            classifier,
            Box::new(ImageFileSource::new("does/not/exist.png")),
            Box::new(LogInjector::new()),
            EventSink::disconnected(),
        );

        session.run_to_completion().unwrap();
        assert!(matches!(session.last_error, Some(SolveError::Capture(_))));
    }

    #[test]
    fn test_cancel_before_start_stops() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let frame = test_frames::puzzle_frame([Shape::Block; 9]);
        let (mut session, _rx) = session_with(frame, Box::new(LogInjector::new()), cancel);

        assert_eq!(session.run_to_completion().unwrap(), SessionState::Stopped);
        assert!(session.detection.is_none());
        assert_eq!(session.status_message(), "Stopped before any key was pressed");
    }

    #[test]
    fn test_cancel_during_execution_stops() {
        let cancel = CancelFlag::new();
        let injector = SharedInjector {
            cancel_after: Some((3, cancel.clone())),
            ..Default::default()
        };
        let pressed = Arc::clone(&injector.pressed);
        let frame = test_frames::puzzle_frame([Shape::Block; 9]);
        let (mut session, _rx) = session_with(frame, Box::new(injector), cancel);

        assert_eq!(session.run_to_completion().unwrap(), SessionState::Stopped);
        assert_eq!(pressed.lock().unwrap().len(), 3);
        assert_eq!(session.status_message(), "Stopped after 3 keys");
        assert!(pressed.lock().unwrap().iter().all(|r| r.symbol == Symbol::S));
    }
}
