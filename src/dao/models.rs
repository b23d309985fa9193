use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scoring::{Hole, HoleScore, MatchPlayer};

/// Lifecycle status of a match. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// No score has been recorded yet.
    Scheduled,
    /// At least one score has been recorded.
    InProgress,
    /// Finalized; scores are frozen.
    Completed,
}

/// Persisted match with its roster rows and scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Schedule week; carried along but unused by scoring.
    #[serde(default)]
    pub week_number: u32,
    /// Hole the groups tee off on; holes are still scored and ranked 1..=9.
    #[serde(default)]
    pub starting_hole: Hole,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Match-player rows, including inactive replaced players.
    pub players: Vec<MatchPlayer>,
    /// Scored cells.
    #[serde(default)]
    pub scores: Vec<HoleScore>,
}

/// Single-cell upsert sent to the backing store. `score: None` clears the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWrite {
    /// Match the cell belongs to.
    pub match_id: Uuid,
    /// Player the score belongs to.
    pub player_id: Uuid,
    /// Hole played.
    pub hole: Hole,
    /// Gross score or `None` to clear.
    pub score: Option<u8>,
}

impl ScoreWrite {
    /// The grid cell this write addresses.
    pub fn cell(&self) -> HoleScore {
        HoleScore {
            player_id: self.player_id,
            hole: self.hole,
            score: self.score,
        }
    }
}
