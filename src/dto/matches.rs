use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::MatchStatus,
    scoring::{Hole, HoleScore, MatchTotals, Scorecard},
    sync::{CellSyncState, SyncPhase},
};

/// Set or clear the gross score of one player on one hole.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ScoreRequest {
    pub player_id: Uuid,
    #[validate(range(min = 1, max = 9))]
    #[schema(minimum = 1, maximum = 9)]
    pub hole: u8,
    /// Gross strokes; `null` clears the cell.
    #[validate(range(min = 1, max = 15))]
    #[schema(minimum = 1, maximum = 15)]
    pub score: Option<u8>,
}

/// Answer to a score entry, computed from the optimistic grid.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreEntryResponse {
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub hole: Hole,
    pub score: Option<u8>,
    /// Persistence state of the cell right after the entry.
    pub sync: CellSyncState,
    pub status: MatchStatus,
    pub scorecard: Scorecard,
}

/// One scored cell as known to the server-side session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreCell {
    pub player_id: Uuid,
    pub hole: Hole,
    pub score: Option<u8>,
    /// Present for cells edited through this server since the match was loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<CellSyncState>,
}

impl ScoreCell {
    pub fn new(score: HoleScore, sync: Option<CellSyncState>) -> Self {
        Self {
            player_id: score.player_id,
            hole: score.hole,
            score: score.score,
            sync,
        }
    }
}

/// Raw scores of a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoresResponse {
    pub match_id: Uuid,
    pub status: MatchStatus,
    pub phase: SyncPhase,
    pub scores: Vec<ScoreCell>,
}

/// Full derived scorecard of a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScorecardResponse {
    pub match_id: Uuid,
    pub status: MatchStatus,
    pub phase: SyncPhase,
    pub scorecard: Scorecard,
    /// RFC 3339 timestamp of the computation.
    pub generated_at: String,
}

/// Outcome of a successful finalize.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizeResponse {
    pub match_id: Uuid,
    pub status: MatchStatus,
    pub totals: MatchTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hole: u8, score: Option<u8>) -> ScoreRequest {
        ScoreRequest {
            player_id: Uuid::new_v4(),
            hole,
            score,
        }
    }

    #[test]
    fn accepts_scores_on_the_course() {
        assert!(request(1, Some(1)).validate().is_ok());
        assert!(request(9, Some(15)).validate().is_ok());
        assert!(request(5, None).validate().is_ok());
    }

    #[test]
    fn rejects_holes_off_the_course() {
        assert!(request(0, Some(4)).validate().is_err());
        assert!(request(10, Some(4)).validate().is_err());
    }

    #[test]
    fn rejects_gross_scores_out_of_range() {
        assert!(request(3, Some(0)).validate().is_err());
        assert!(request(3, Some(16)).validate().is_err());
    }

    #[test]
    fn null_score_deserializes_as_clear() {
        let raw = format!(
            r#"{{ "player_id": "{}", "hole": 4, "score": null }}"#,
            Uuid::nil()
        );
        let parsed: ScoreRequest = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.score, None);
        assert_eq!(parsed.hole, 4);
    }
}
