//! Per-role workflow state machines.
//!
//! Each operation walks `Idle -> Validating -> InFlight -> Succeeded|Failed
//! -> Idle`. Validation failures jump straight from `Validating` to
//! `Failed` and never touch the network. Operations take `&mut self`, so a
//! role instance can only run one at a time. A caller that drops an
//! operation mid-flight gets the role back in `Idle` with a failure status.

pub mod receiver;
pub mod sender;

#[cfg(test)]
pub(crate) mod fakes;

pub use receiver::{ReceiverForm, ReceiverWorkflow};
pub use sender::{SenderForm, SenderWorkflow};

use std::fmt;

use crate::status::{Status, StatusReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    InFlight,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, InFlight)
                | (Validating, Failed)
                | (InFlight, Succeeded)
                | (InFlight, Failed)
                | (Succeeded, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Validating => "validating",
            Phase::InFlight => "in-flight",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current phase of one role, plus the phases visited by its latest operation.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    role: &'static str,
    current: Phase,
    trace: Vec<Phase>,
}

impl PhaseTracker {
    pub(crate) fn new(role: &'static str) -> Self {
        Self {
            role,
            current: Phase::Idle,
            trace: Vec::new(),
        }
    }

    pub(crate) fn current(&self) -> Phase {
        self.current
    }

    pub(crate) fn trace(&self) -> &[Phase] {
        &self.trace
    }

    /// Start a new operation.
    pub(crate) fn begin(&mut self) {
        if self.current != Phase::Idle {
            // A dropped Flight already lands in Idle; this is a fallback.
            tracing::warn!(
                "{}: previous operation abandoned while {}; resetting",
                self.role,
                self.current
            );
            self.current = Phase::Idle;
        }
        self.trace.clear();
        self.trace.push(Phase::Idle);
        self.enter(Phase::Validating);
    }

    pub(crate) fn enter(&mut self, next: Phase) {
        debug_assert!(
            self.current.can_enter(next),
            "{}: illegal transition {} -> {}",
            self.role,
            self.current,
            next
        );
        tracing::debug!("{}: {} -> {}", self.role, self.current, next);
        self.current = next;
        self.trace.push(next);
    }
}

/// Holds a role in `InFlight` for as long as a request is outstanding.
///
/// Call [`Flight::land`] once the request resolves. If the guard is dropped
/// first, the operation was abandoned: the role moves through `Failed` back to
/// `Idle` and `failed_text` is reported.
pub(crate) struct Flight<'a> {
    phase: &'a mut PhaseTracker,
    status: &'a StatusReporter,
    failed_text: &'static str,
    landed: bool,
}

impl<'a> Flight<'a> {
    pub(crate) fn take_off(
        phase: &'a mut PhaseTracker,
        status: &'a StatusReporter,
        in_progress: &str,
        failed_text: &'static str,
    ) -> Self {
        phase.enter(Phase::InFlight);
        status.report(Status::in_progress(in_progress));
        Self {
            phase,
            status,
            failed_text,
            landed: false,
        }
    }

    pub(crate) fn land(mut self) {
        self.landed = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        tracing::warn!("{}: operation abandoned while in flight", self.phase.role);
        self.phase.enter(Phase::Failed);
        self.status.report(Status::failure(self.failed_text));
        self.phase.enter(Phase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Phase::Idle.can_enter(Phase::Validating));
        assert!(Phase::Validating.can_enter(Phase::Failed));
        assert!(Phase::InFlight.can_enter(Phase::Succeeded));
        assert!(Phase::Failed.can_enter(Phase::Idle));

        assert!(!Phase::Idle.can_enter(Phase::InFlight));
        assert!(!Phase::Validating.can_enter(Phase::Succeeded));
        assert!(!Phase::Succeeded.can_enter(Phase::InFlight));
        assert!(!Phase::InFlight.can_enter(Phase::Idle));
    }

    #[test]
    fn test_tracker_records_operation() {
        let mut tracker = PhaseTracker::new("test");
        tracker.begin();
        tracker.enter(Phase::InFlight);
        tracker.enter(Phase::Succeeded);
        tracker.enter(Phase::Idle);

        assert_eq!(tracker.current(), Phase::Idle);
        assert_eq!(
            tracker.trace(),
            &[Phase::Idle, Phase::Validating, Phase::InFlight, Phase::Succeeded, Phase::Idle]
        );

        tracker.begin();
        assert_eq!(tracker.trace(), &[Phase::Idle, Phase::Validating]);
    }

    #[test]
    fn test_landed_flight_leaves_phase_alone() {
        let mut tracker = PhaseTracker::new("test");
        let status = StatusReporter::new();
        tracker.begin();

        Flight::take_off(&mut tracker, &status, "working", "broke").land();

        assert_eq!(tracker.current(), Phase::InFlight);
        assert_eq!(status.current(), Status::in_progress("working"));
    }

    #[test]
    fn test_dropped_flight_fails_back_to_idle() {
        let mut tracker = PhaseTracker::new("test");
        let status = StatusReporter::new();
        tracker.begin();

        drop(Flight::take_off(&mut tracker, &status, "working", "broke"));

        assert_eq!(tracker.current(), Phase::Idle);
        assert_eq!(
            tracker.trace(),
            &[Phase::Idle, Phase::Validating, Phase::InFlight, Phase::Failed, Phase::Idle]
        );
        assert_eq!(status.current(), Status::failure("broke"));
    }

    #[test]
    fn test_begin_recovers_from_abandoned_operation() {
        let mut tracker = PhaseTracker::new("test");
        tracker.begin();
        tracker.enter(Phase::InFlight);

        tracker.begin();
        assert_eq!(tracker.current(), Phase::Validating);
    }
}
