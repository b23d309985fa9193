//! Score Sync Controller: owns the mutable score grid of a match on the
//! scoring side and keeps it consistent with the backing store.

pub(crate) mod controller;
mod error;
mod phase;
mod policy;

pub use controller::{
    CellSyncState, PersistOutcome, ScoreEntry, ScoreSyncController, SyncNotice, SyncNoticeKind,
};
pub use error::SyncError;
pub use phase::{InvalidPhaseTransition, SyncPhase, SyncPhaseEvent};
pub use policy::SyncPolicy;
