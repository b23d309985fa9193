use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    scoring::{CellKey, MAX_GROSS_SCORE, MissingScore, RosterError},
};

/// Failures reported by the score sync controller.
///
/// Store failures of a single cell write never show up here: they are
/// reported per cell through notices.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Gross score outside the accepted range.
    #[error("gross score {0} is outside 1..={MAX_GROSS_SCORE}")]
    InvalidScore(u8),
    /// Player is not an active member of the match roster.
    #[error("player `{0}` is not active in this match")]
    UnknownPlayer(Uuid),
    /// Scores of a completed match cannot change.
    #[error("match is completed; scores are frozen")]
    MatchCompleted,
    /// Finalize was attempted before every active player scored every hole.
    #[error("match is missing {} scores", .0.len())]
    Incomplete(Vec<MissingScore>),
    /// Finalize was attempted while local edits are not confirmed by the store.
    #[error("{} score edits are not saved yet", .0.len())]
    UnsavedEdits(Vec<CellKey>),
    /// Roster from the store is unusable for scoring.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// A store request exceeded the configured request timeout.
    #[error("store request timed out")]
    Timeout,
    /// Store failure outside of a cell write.
    #[error(transparent)]
    Store(#[from] StorageError),
}
