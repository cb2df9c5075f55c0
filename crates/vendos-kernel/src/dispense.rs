//! [`DispenseBank`] – per-motor dispense-cycle state machine.
//!
//! Each registered motor is either `Idle` or `Running`:
//!
//! - `Idle → Running` on a `start` directive for that motor, or on a stable
//!   [`SwitchEdge::Pressed`] while idle (the manual/local-override path that
//!   keeps a machine operable with no network).  A directive received while
//!   already running is ignored, which deduplicates redelivered directives.
//! - `Running → Idle` only on a stable [`SwitchEdge::Released`].  The
//!   transition is reported as exactly one [`CycleEvent::Completed`], from
//!   which the runtime de-energises the motor and sends exactly one
//!   acknowledgment.
//!
//! An optional maximum-run duration forces the same completion when no
//! release is ever observed, so a broken switch cannot stall a slot
//! indefinitely.
//!
//! The bank performs no I/O and receives all timestamps from the caller.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::debounce::SwitchEdge;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// A state transition committed by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// The motor entered `Running`; the runtime must energise it.
    Started { motor_id: u32 },
    /// The motor returned to `Idle`; the runtime must de-energise it and
    /// emit one success acknowledgment.
    Completed { motor_id: u32 },
}

/// Controller-local state for one motor.  Never shared across units.
struct MotorState {
    running: bool,
    started_at: Option<Instant>,
}

// ────────────────────────────────────────────────────────────────────────────
// DispenseBank
// ────────────────────────────────────────────────────────────────────────────

/// Idle/Running state machine over an indexed collection of motors.
pub struct DispenseBank {
    motors: HashMap<u32, MotorState>,
    max_run: Option<Duration>,
}

impl DispenseBank {
    /// Create a bank with an optional maximum-run fallback duration.
    pub fn new(max_run: Option<Duration>) -> Self {
        Self {
            motors: HashMap::new(),
            max_run,
        }
    }

    /// Register a motor in the `Idle` state.  Re-registering resets it.
    pub fn register(&mut self, motor_id: u32) {
        self.motors.insert(
            motor_id,
            MotorState {
                running: false,
                started_at: None,
            },
        );
    }

    /// `true` while the motor is in a dispense cycle.
    pub fn is_running(&self, motor_id: u32) -> bool {
        self.motors.get(&motor_id).is_some_and(|m| m.running)
    }

    /// Apply a `start` directive for `motor_id`.
    ///
    /// Returns [`CycleEvent::Started`] when the motor was idle.  A directive
    /// for a motor that is already running is a redelivery and is dropped;
    /// a directive for an unregistered motor is logged and dropped.
    pub fn handle_directive(&mut self, motor_id: u32, now: Instant) -> Option<CycleEvent> {
        let Some(motor) = self.motors.get_mut(&motor_id) else {
            warn!(motor_id, "directive for unregistered motor; dropping");
            return None;
        };
        if motor.running {
            debug!(motor_id, "directive redelivered while running; ignoring");
            return None;
        }
        motor.running = true;
        motor.started_at = Some(now);
        info!(motor_id, "dispense cycle started by directive");
        Some(CycleEvent::Started { motor_id })
    }

    /// Apply a stable switch edge for `motor_id`.
    ///
    /// A press while idle starts a manual cycle; a release while running
    /// completes the cycle.  All other combinations are no-ops.
    pub fn handle_edge(
        &mut self,
        motor_id: u32,
        edge: SwitchEdge,
        now: Instant,
    ) -> Option<CycleEvent> {
        let motor = self.motors.get_mut(&motor_id)?;
        match (edge, motor.running) {
            (SwitchEdge::Pressed, false) => {
                motor.running = true;
                motor.started_at = Some(now);
                info!(motor_id, "dispense cycle started by manual press");
                Some(CycleEvent::Started { motor_id })
            }
            (SwitchEdge::Released, true) => {
                motor.running = false;
                motor.started_at = None;
                info!(motor_id, "dispense cycle completed on switch release");
                Some(CycleEvent::Completed { motor_id })
            }
            _ => None,
        }
    }

    /// Force-complete any motor that has been running longer than the
    /// maximum-run duration.  No-op when no fallback is configured.
    ///
    /// Each overrun motor yields the same [`CycleEvent::Completed`] a switch
    /// release would have produced, so downstream handling is identical.
    pub fn check_max_run(&mut self, now: Instant) -> Vec<CycleEvent> {
        let Some(max_run) = self.max_run else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for (&motor_id, motor) in &mut self.motors {
            if !motor.running {
                continue;
            }
            let overrun = motor
                .started_at
                .is_some_and(|t| now.duration_since(t) >= max_run);
            if overrun {
                motor.running = false;
                motor.started_at = None;
                warn!(
                    motor_id,
                    max_run_ms = max_run.as_millis() as u64,
                    "no switch release observed; forcing cycle completion"
                );
                events.push(CycleEvent::Completed { motor_id });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with(motors: &[u32], max_run: Option<Duration>) -> DispenseBank {
        let mut bank = DispenseBank::new(max_run);
        for &id in motors {
            bank.register(id);
        }
        bank
    }

    #[test]
    fn directive_starts_idle_motor() {
        let mut bank = bank_with(&[1], None);
        let now = Instant::now();
        assert_eq!(
            bank.handle_directive(1, now),
            Some(CycleEvent::Started { motor_id: 1 })
        );
        assert!(bank.is_running(1));
    }

    #[test]
    fn redelivered_directive_is_ignored() {
        let mut bank = bank_with(&[1], None);
        let now = Instant::now();
        bank.handle_directive(1, now);
        // At-least-once delivery: the same directive arrives again.
        assert_eq!(bank.handle_directive(1, now), None);
        assert!(bank.is_running(1));
    }

    #[test]
    fn directive_for_unregistered_motor_is_dropped() {
        let mut bank = bank_with(&[1], None);
        assert_eq!(bank.handle_directive(9, Instant::now()), None);
        assert!(!bank.is_running(9));
    }

    #[test]
    fn manual_press_starts_idle_motor() {
        let mut bank = bank_with(&[2], None);
        let now = Instant::now();
        assert_eq!(
            bank.handle_edge(2, SwitchEdge::Pressed, now),
            Some(CycleEvent::Started { motor_id: 2 })
        );
        assert!(bank.is_running(2));
    }

    #[test]
    fn press_while_running_is_ignored() {
        let mut bank = bank_with(&[1], None);
        let now = Instant::now();
        bank.handle_directive(1, now);
        assert_eq!(bank.handle_edge(1, SwitchEdge::Pressed, now), None);
    }

    #[test]
    fn release_completes_running_motor_exactly_once() {
        let mut bank = bank_with(&[1], None);
        let now = Instant::now();
        bank.handle_directive(1, now);

        assert_eq!(
            bank.handle_edge(1, SwitchEdge::Released, now),
            Some(CycleEvent::Completed { motor_id: 1 })
        );
        assert!(!bank.is_running(1));
        // A duplicate release produces no second completion.
        assert_eq!(bank.handle_edge(1, SwitchEdge::Released, now), None);
    }

    #[test]
    fn release_while_idle_is_ignored() {
        let mut bank = bank_with(&[1], None);
        assert_eq!(
            bank.handle_edge(1, SwitchEdge::Released, Instant::now()),
            None
        );
    }

    #[test]
    fn max_run_forces_completion() {
        let mut bank = bank_with(&[1, 2], Some(Duration::from_secs(3)));
        let t0 = Instant::now();
        bank.handle_directive(1, t0);

        // Under the limit: nothing happens.
        assert!(bank.check_max_run(t0 + Duration::from_secs(2)).is_empty());
        assert!(bank.is_running(1));

        // Past the limit: exactly one forced completion, only for motor 1.
        let events = bank.check_max_run(t0 + Duration::from_secs(3));
        assert_eq!(events, vec![CycleEvent::Completed { motor_id: 1 }]);
        assert!(!bank.is_running(1));

        // The forced completion is not repeated.
        assert!(bank.check_max_run(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn no_max_run_means_no_forced_completion() {
        let mut bank = bank_with(&[1], None);
        let t0 = Instant::now();
        bank.handle_directive(1, t0);
        assert!(
            bank.check_max_run(t0 + Duration::from_secs(3600))
                .is_empty()
        );
        assert!(bank.is_running(1));
    }

    #[test]
    fn motors_run_independently() {
        let mut bank = bank_with(&[1, 2], None);
        let now = Instant::now();
        bank.handle_directive(1, now);
        assert!(bank.is_running(1));
        assert!(!bank.is_running(2));

        bank.handle_edge(1, SwitchEdge::Released, now);
        assert!(!bank.is_running(1));
    }

    #[test]
    fn full_cycle_after_manual_start() {
        let mut bank = bank_with(&[5], None);
        let now = Instant::now();
        bank.handle_edge(5, SwitchEdge::Pressed, now);
        assert_eq!(
            bank.handle_edge(5, SwitchEdge::Released, now),
            Some(CycleEvent::Completed { motor_id: 5 })
        );
    }
}
