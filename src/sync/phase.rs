use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Save activity of a match as shown to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    /// Initial fetch of roster and scores.
    Loading,
    /// Nothing in flight.
    Idle,
    /// At least one cell write is in flight.
    Saving,
    /// A write failed transiently and will be attempted again.
    Retrying {
        /// Failed attempts so far.
        attempt: u32,
    },
    /// Every in-flight write completed successfully.
    Saved,
}

/// Inputs driving [`SyncPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhaseEvent {
    /// Initial fetch completed.
    Loaded,
    /// A cell write was issued.
    SaveStarted,
    /// A cell write failed transiently and sleeps before the next attempt.
    RetryScheduled {
        /// Failed attempts so far.
        attempt: u32,
    },
    /// Last in-flight write finished and all of them succeeded.
    SaveSucceeded,
    /// Last in-flight write finished and at least one failed or was rejected.
    SaveFailed,
    /// The `Saved` indicator has been shown long enough.
    Settled,
}

/// Event that is not valid in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sync phase {from:?} does not accept {event:?}")]
pub struct InvalidPhaseTransition {
    /// Phase the event was applied to.
    pub from: SyncPhase,
    /// Rejected event.
    pub event: SyncPhaseEvent,
}

impl SyncPhase {
    /// Whether a write is still in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, SyncPhase::Saving | SyncPhase::Retrying { .. })
    }

    /// Phase after `event`, or an error when the event makes no sense here.
    pub fn next(self, event: SyncPhaseEvent) -> Result<SyncPhase, InvalidPhaseTransition> {
        use SyncPhase::*;
        use SyncPhaseEvent as E;

        let next = match (self, event) {
            (Loading, E::Loaded) => Idle,
            (Idle | Saved, E::SaveStarted) => Saving,
            (Saving | Retrying { .. }, E::SaveStarted) => self,
            (Saving | Retrying { .. }, E::RetryScheduled { attempt }) => Retrying { attempt },
            (Saving | Retrying { .. }, E::SaveSucceeded) => Saved,
            (Saving | Retrying { .. }, E::SaveFailed) => Idle,
            (Saved, E::Settled) => Idle,
            (from, event) => return Err(InvalidPhaseTransition { from, event }),
        };
        Ok(next)
    }
}
