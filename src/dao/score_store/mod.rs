#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    dao::{
        models::{MatchStatus, ScoreWrite},
        storage::{StorageError, StorageResult},
    },
    scoring::{HoleScore, MAX_GROSS_SCORE, MatchPlayer, MatchRoster, ScoreGrid, missing_scores, resolve_roster},
};

/// Abstraction over the persistence layer holding match rosters and scores.
///
/// Every method maps onto one external operation so the scoring engine can run
/// against any backend, in memory or remote.
pub trait ScoreStore: Send + Sync {
    /// Current authoritative score set of a match (scored cells only).
    fn fetch_scores(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HoleScore>>>;
    /// Upsert or clear a single cell.
    fn write_score(&self, write: ScoreWrite) -> BoxFuture<'static, StorageResult<()>>;
    /// Active lineups of a match with substitutions resolved.
    fn fetch_roster(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchRoster>>;
    /// Current lifecycle status of a match.
    fn fetch_match_status(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchStatus>>;
    /// Move a match to `status`; backends re-validate the transition.
    fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Push feed of match ids whose scores or status may have changed, if the
    /// backend offers one.
    fn subscribe_changes(&self) -> Option<broadcast::Receiver<Uuid>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Resolve stored roster rows, reporting a broken roster as a rejection.
pub(crate) fn roster_from_rows(match_id: Uuid, rows: &[MatchPlayer]) -> StorageResult<MatchRoster> {
    resolve_roster(rows)
        .map_err(|err| StorageError::rejected(format!("roster of match `{match_id}` is invalid: {err}")))
}

/// Checks every backend applies before accepting a score write.
pub(crate) fn validate_write(
    status: MatchStatus,
    roster: &MatchRoster,
    write: &ScoreWrite,
) -> StorageResult<()> {
    if status == MatchStatus::Completed {
        return Err(StorageError::rejected(format!(
            "match `{}` is completed; scores are frozen",
            write.match_id
        )));
    }

    if !roster.contains(write.player_id) {
        return Err(StorageError::rejected(format!(
            "player `{}` is not active in match `{}`",
            write.player_id, write.match_id
        )));
    }

    if let Some(score) = write.score {
        if !(1..=MAX_GROSS_SCORE).contains(&score) {
            return Err(StorageError::rejected(format!(
                "gross score {score} is outside 1..={MAX_GROSS_SCORE}"
            )));
        }
    }

    Ok(())
}

/// Checks every backend applies before changing a match status.
///
/// Statuses only move forward, and completing a match requires every active
/// player to have scored every hole.
pub(crate) fn validate_status_change(
    current: MatchStatus,
    next: MatchStatus,
    roster: &MatchRoster,
    grid: &ScoreGrid,
) -> StorageResult<()> {
    if next < current {
        return Err(StorageError::rejected(format!(
            "match status cannot move back from {current:?} to {next:?}"
        )));
    }

    if next == MatchStatus::Completed && current != MatchStatus::Completed {
        let missing = missing_scores(roster, grid);
        if !missing.is_empty() {
            return Err(StorageError::rejected(format!(
                "match is missing {} scores",
                missing.len()
            )));
        }
    }

    Ok(())
}
