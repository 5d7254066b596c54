//! Sequential key-press execution with jittered timing.
//!
//! Keys are pressed strictly in sequence order. Between two presses the
//! executor sleeps for a random delay around the configured base. The
//! cancellation flag is checked before every press; once it is seen, no
//! further keys go out. Keys already pressed are not undone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::config::KeyTiming;
use super::events::{EventSink, SolverEvent};
use super::input::KeyInjector;
use super::sequence::KeySequence;

/// Hard floor for the gap between two key presses.
pub const MIN_KEY_DELAY: Duration = Duration::from_millis(10);

/// Shared stop flag. Set from any thread, read by the session between steps.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExecutionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// Every attempted key failed to inject
    Failed,
}

/// Outcome of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub state: ExecutionState,
    pub pressed: usize,
    pub failed: usize,
}

pub struct SequenceExecutor {
    timing: KeyTiming,
    cancel: CancelFlag,
    rng: StdRng,
    state: ExecutionState,
}

impl SequenceExecutor {
    pub fn new(timing: KeyTiming, cancel: CancelFlag) -> Self {
        Self::with_rng(timing, cancel, StdRng::from_entropy())
    }

    /// Executor with a fixed jitter seed.
    pub fn with_seed(timing: KeyTiming, cancel: CancelFlag, seed: u64) -> Self {
        Self::with_rng(timing, cancel, StdRng::seed_from_u64(seed))
    }

    fn with_rng(timing: KeyTiming, cancel: CancelFlag, rng: StdRng) -> Self {
        Self {
            timing,
            cancel,
            rng,
            state: ExecutionState::Idle,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Draws the next inter-key delay: uniform in base ± variance, then floored.
    pub fn next_delay(&mut self) -> Duration {
        let low = self
            .timing
            .base_delay_ms
            .saturating_sub(self.timing.delay_variance_ms);
        let high = self
            .timing
            .base_delay_ms
            .saturating_add(self.timing.delay_variance_ms);
        let drawn = self.rng.gen_range(low..=high);

        let floor = self.timing.min_key_delay_ms.max(MIN_KEY_DELAY.as_millis() as u64);
        Duration::from_millis(drawn.max(floor))
    }

    /// Presses every key of the sequence in order.
    ///
    /// Injection failures are logged and reported as events; the sequence
    /// continues with the next key.
    pub fn run(
        &mut self,
        sequence: &KeySequence,
        injector: &mut dyn KeyInjector,
        events: &EventSink,
    ) -> ExecutionReport {
        self.state = ExecutionState::Running;
        let mut pressed = 0;
        let mut failed = 0;

        for (i, request) in sequence.requests().iter().enumerate() {
            if i > 0 {
                std::thread::sleep(self.next_delay());
            }

            if self.cancel.is_cancelled() {
                crate::log(&format!(
                    "Execution cancelled after {} of {} keys",
                    pressed,
                    sequence.len()
                ));
                self.state = ExecutionState::Cancelled;
                return ExecutionReport {
                    state: self.state,
                    pressed,
                    failed,
                };
            }

            match injector.press(request) {
                Ok(()) => {
                    pressed += 1;
                    events.emit(SolverEvent::KeyPressed { request: *request });
                }
                Err(e) => {
                    failed += 1;
                    crate::log(&format!(
                        "Key {} (cell {}) failed: {}",
                        request.symbol.key(),
                        request.index,
                        e
                    ));
                    events.emit(SolverEvent::KeyFailed {
                        request: *request,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.state = if pressed == 0 && failed > 0 {
            ExecutionState::Failed
        } else {
            ExecutionState::Completed
        };

        ExecutionReport {
            state: self.state,
            pressed,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Symbol;
    use crate::solver::events::create_event_channel;
    use crate::solver::sequence::{Grid, KeyRequest};
    use anyhow::anyhow;
    use Symbol::*;

    fn fast_timing() -> KeyTiming {
        KeyTiming {
            base_delay_ms: 0,
            delay_variance_ms: 0,
            min_key_delay_ms: 0,
        }
    }

    /// Records presses, cancels after `cancel_after` keys, fails listed cells.
    struct ScriptedInjector {
        pressed: Vec<KeyRequest>,
        cancel: CancelFlag,
        cancel_after: Option<usize>,
        fail_cells: Vec<usize>,
    }

    impl ScriptedInjector {
        fn new(cancel: CancelFlag) -> Self {
            Self {
                pressed: Vec::new(),
                cancel,
                cancel_after: None,
                fail_cells: Vec::new(),
            }
        }
    }

    impl KeyInjector for ScriptedInjector {
        fn press(&mut self, request: &KeyRequest) -> anyhow::Result<()> {
            if self.fail_cells.contains(&request.index) {
                return Err(anyhow!("injection refused"));
            }
            self.pressed.push(*request);
            if Some(self.pressed.len()) == self.cancel_after {
                self.cancel.cancel();
            }
            Ok(())
        }
    }

    fn full_grid() -> Grid {
        Grid::from_symbols([
            Some(Q), Some(W), Some(E),
            Some(R), None, Some(A),
            Some(S), Some(D), Some(Q),
        ])
    }

    #[test]
    fn test_keys_pressed_in_row_major_order() {
        let cancel = CancelFlag::new();
        let mut injector = ScriptedInjector::new(cancel.clone());
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);
        assert_eq!(executor.state(), ExecutionState::Idle);

        let report = executor.run(&full_grid().key_sequence(), &mut injector, &EventSink::disconnected());

        assert_eq!(report.state, ExecutionState::Completed);
        assert_eq!(report.pressed, 8);
        let indices: Vec<usize> = injector.pressed.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn test_cancel_after_three_keys() {
        let cancel = CancelFlag::new();
        let mut injector = ScriptedInjector::new(cancel.clone());
        injector.cancel_after = Some(3);
        let (sender, receiver) = create_event_channel();
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);

        let report = executor.run(&full_grid().key_sequence(), &mut injector, &EventSink::new(sender));

        assert_eq!(report.state, ExecutionState::Cancelled);
        assert_eq!(report.pressed, 3);
        let key_events = receiver
            .try_iter()
            .filter(|e| matches!(e, SolverEvent::KeyPressed { .. }))
            .count();
        assert_eq!(key_events, 3);
    }

    #[test]
    fn test_cancelled_before_start_presses_nothing() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut injector = ScriptedInjector::new(cancel.clone());
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);

        let report = executor.run(&full_grid().key_sequence(), &mut injector, &EventSink::disconnected());
        assert_eq!(report.state, ExecutionState::Cancelled);
        assert!(injector.pressed.is_empty());
    }

    #[test]
    fn test_injection_failure_continues() {
        let cancel = CancelFlag::new();
        let mut injector = ScriptedInjector::new(cancel.clone());
        injector.fail_cells = vec![1, 6];
        let (sender, receiver) = create_event_channel();
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);

        let report = executor.run(&full_grid().key_sequence(), &mut injector, &EventSink::new(sender));

        assert_eq!(report.state, ExecutionState::Completed);
        assert_eq!((report.pressed, report.failed), (6, 2));
        let failures = receiver
            .try_iter()
            .filter(|e| matches!(e, SolverEvent::KeyFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_all_keys_failing_is_failed() {
        let cancel = CancelFlag::new();
        let mut injector = ScriptedInjector::new(cancel.clone());
        injector.fail_cells = (0..9).collect();
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);

        let report = executor.run(&full_grid().key_sequence(), &mut injector, &EventSink::disconnected());
        assert_eq!(report.state, ExecutionState::Failed);
    }

    #[test]
    fn test_empty_sequence_completes() {
        let cancel = CancelFlag::new();
        let mut injector = ScriptedInjector::new(cancel.clone());
        let mut executor = SequenceExecutor::with_seed(fast_timing(), cancel, 7);

        let report = executor.run(&KeySequence::default(), &mut injector, &EventSink::disconnected());
        assert_eq!(report.state, ExecutionState::Completed);
        assert_eq!(report.pressed, 0);
    }

    #[test]
    fn test_delay_stays_within_jitter_band() {
        let timing = KeyTiming {
            base_delay_ms: 120,
            delay_variance_ms: 40,
            min_key_delay_ms: 40,
        };
        let mut executor = SequenceExecutor::with_seed(timing, CancelFlag::new(), 42);
        for _ in 0..200 {
            let ms = executor.next_delay().as_millis();
            assert!((80..=160).contains(&ms), "delay {}ms out of band", ms);
        }
    }

    #[test]
    fn test_delay_is_floored() {
        let timing = KeyTiming {
            base_delay_ms: 20,
            delay_variance_ms: 20,
            min_key_delay_ms: 35,
        };
        let mut executor = SequenceExecutor::with_seed(timing, CancelFlag::new(), 1);
        for _ in 0..100 {
            assert!(executor.next_delay() >= Duration::from_millis(35));
        }

        let mut unfloored = SequenceExecutor::with_seed(fast_timing(), CancelFlag::new(), 1);
        assert_eq!(unfloored.next_delay(), MIN_KEY_DELAY);
    }

    #[test]
    fn test_same_seed_gives_same_delays() {
        let timing = KeyTiming::default();
        let mut a = SequenceExecutor::with_seed(timing, CancelFlag::new(), 99);
        let mut b = SequenceExecutor::with_seed(timing, CancelFlag::new(), 99);
        for _ in 0..20 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }
}
