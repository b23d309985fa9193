use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::MatchStatus;

/// Events that can be applied to a match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// A gross score was recorded for the match.
    ScoreRecorded,
    /// The scorecard is complete and the match is closed.
    Finalize,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Status the match was in when the event was received.
    pub from: MatchStatus,
    /// The event that cannot be applied from this status.
    pub event: MatchEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current status.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    NoPending,
    IdMismatch {
        expected: PlanId,
        got: PlanId,
    },
    /// Status changed since the plan was created.
    StatusMismatch {
        expected: MatchStatus,
        actual: MatchStatus,
    },
    VersionMismatch {
        expected: usize,
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    NoPending,
    IdMismatch { expected: PlanId, got: PlanId },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub from: MatchStatus,
    pub to: MatchStatus,
    pub event: MatchEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    pub pending_since: Instant,
}

/// Snapshot of a lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: MatchStatus,
    pub version: usize,
    /// Target status of the pending transition, if any.
    pub pending: Option<MatchStatus>,
}

/// Forward-only lifecycle of a single match:
/// `Scheduled -> InProgress -> Completed`.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    status: MatchStatus,
    version: usize,
    pending: Option<Plan>,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self::new(MatchStatus::Scheduled)
    }
}

impl MatchStateMachine {
    /// Create a lifecycle starting at `status`, as read from the store.
    pub fn new(status: MatchStatus) -> Self {
        Self {
            status,
            version: 0,
            pending: None,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Catch up with a status observed in the store.
    ///
    /// Only forward moves are taken, and never while a transition is pending.
    /// Returns whether the status changed.
    pub fn observe(&mut self, status: MatchStatus) -> bool {
        if self.pending.is_some() || status <= self.status {
            return false;
        }
        self.status = status;
        self.version += 1;
        true
    }

    /// Validate `event` against the current status and park it as the pending plan.
    pub fn plan(&mut self, event: MatchEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.status,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply the pending plan, returning the new status.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<MatchStatus, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.status != plan.from {
            return Err(ApplyError::StatusMismatch {
                expected: plan.from,
                actual: self.status,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.status = plan.to;
        self.version = plan.version_next;

        Ok(self.status)
    }

    /// Drop the pending plan without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: MatchEvent) -> Result<MatchStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (MatchStatus::Scheduled, MatchEvent::ScoreRecorded) => MatchStatus::InProgress,
            (MatchStatus::InProgress, MatchEvent::ScoreRecorded) => MatchStatus::InProgress,
            (MatchStatus::InProgress, MatchEvent::Finalize) => MatchStatus::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut MatchStateMachine, event: MatchEvent) -> MatchStatus {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn full_lifecycle() {
        let mut sm = MatchStateMachine::default();
        assert_eq!(sm.status(), MatchStatus::Scheduled);

        assert_eq!(
            apply(&mut sm, MatchEvent::ScoreRecorded),
            MatchStatus::InProgress
        );
        assert_eq!(
            apply(&mut sm, MatchEvent::ScoreRecorded),
            MatchStatus::InProgress
        );
        assert_eq!(apply(&mut sm, MatchEvent::Finalize), MatchStatus::Completed);
        assert_eq!(sm.snapshot().version, 3);
    }

    #[test]
    fn scheduled_match_cannot_be_finalized() {
        let mut sm = MatchStateMachine::default();
        let err = sm.plan(MatchEvent::Finalize).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidTransition(InvalidTransition {
                from: MatchStatus::Scheduled,
                event: MatchEvent::Finalize,
            })
        );
    }

    #[test]
    fn completed_match_refuses_scores() {
        let mut sm = MatchStateMachine::new(MatchStatus::Completed);
        assert!(matches!(
            sm.plan(MatchEvent::ScoreRecorded),
            Err(PlanError::InvalidTransition(_))
        ));
        assert!(matches!(
            sm.plan(MatchEvent::Finalize),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn only_one_plan_at_a_time() {
        let mut sm = MatchStateMachine::new(MatchStatus::InProgress);
        let plan = sm.plan(MatchEvent::Finalize).unwrap();
        assert_eq!(sm.snapshot().pending, Some(MatchStatus::Completed));
        assert_eq!(
            sm.plan(MatchEvent::ScoreRecorded).unwrap_err(),
            PlanError::AlreadyPending
        );

        sm.abort(plan.id).unwrap();
        assert_eq!(sm.status(), MatchStatus::InProgress);
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan() {
        let mut sm = MatchStateMachine::new(MatchStatus::InProgress);
        let plan = sm.plan(MatchEvent::Finalize).unwrap();
        let other = Uuid::new_v4();

        assert_eq!(
            sm.apply(other).unwrap_err(),
            ApplyError::IdMismatch {
                expected: plan.id,
                got: other
            }
        );
        assert_eq!(sm.apply(plan.id).unwrap(), MatchStatus::Completed);
    }

    #[test]
    fn observe_only_moves_forward() {
        let mut sm = MatchStateMachine::new(MatchStatus::InProgress);
        assert!(!sm.observe(MatchStatus::Scheduled));
        assert!(sm.observe(MatchStatus::Completed));
        assert_eq!(sm.status(), MatchStatus::Completed);
    }

    #[test]
    fn observe_waits_for_pending_plan() {
        let mut sm = MatchStateMachine::default();
        let plan = sm.plan(MatchEvent::ScoreRecorded).unwrap();
        assert!(!sm.observe(MatchStatus::InProgress));
        sm.apply(plan.id).unwrap();
        assert_eq!(sm.status(), MatchStatus::InProgress);
    }
}
