//! Full derived view of a match: strokes, nets, hole points, totals and gaps.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    allocator::StrokeAllocator,
    course::Hole,
    grid::ScoreGrid,
    net::net_score,
    points::{HolePoints, MatchTotals, compute_all_holes, compute_match_totals},
    roster::{MatchRoster, RosterError, Side},
};

/// A (player, hole) cell that still needs a gross score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MissingScore {
    /// Player missing a score.
    pub player_id: Uuid,
    /// Hole without a score.
    pub hole: Hole,
}

/// One player's line on the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerLine {
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Side the player plays for.
    pub side: Side,
    /// Course handicap, when the handicap index is known.
    pub course_handicap: Option<i32>,
    /// Per-hole cells in hole order.
    pub holes: Vec<PlayerHole>,
}

/// One cell of a player's line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerHole {
    /// Hole number.
    pub hole: Hole,
    /// Gross score, when entered.
    pub gross: Option<u8>,
    /// Strokes received on the hole.
    pub strokes: u32,
    /// Net score, when a gross score exists.
    pub net: Option<u32>,
}

/// Derived scorecard, recomputed from roster and raw scores on every call.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Scorecard {
    /// Player lines, home lineup first.
    pub players: Vec<PlayerLine>,
    /// Per-hole match points.
    pub holes: Vec<HolePoints>,
    /// Match totals.
    pub totals: MatchTotals,
    /// Cells still missing a gross score.
    pub missing: Vec<MissingScore>,
}

impl Scorecard {
    /// Compute the scorecard for `roster` from the current `grid`.
    pub fn compute(roster: &MatchRoster, grid: &ScoreGrid) -> Result<Self, RosterError> {
        let allocator = StrokeAllocator::for_roster(roster)?;

        let mut players = Vec::with_capacity(4);
        for side in [Side::Home, Side::Away] {
            for player in &roster.lineup(side).players {
                let holes = Hole::all()
                    .map(|hole| {
                        let gross = grid.get(player.id, hole);
                        let strokes = allocator.strokes(player.id, hole)?;
                        Ok::<_, RosterError>(PlayerHole {
                            hole,
                            gross,
                            strokes,
                            net: net_score(gross, strokes),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                players.push(PlayerLine {
                    player_id: player.id,
                    name: player.name.clone(),
                    side,
                    course_handicap: allocator.course_handicap(player.id)?,
                    holes,
                });
            }
        }

        let holes = compute_all_holes(roster, grid, &allocator)?;
        let totals = compute_match_totals(&holes);

        Ok(Self {
            players,
            holes,
            totals,
            missing: missing_scores(roster, grid),
        })
    }

    /// Whether every active player has scored every hole.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Every (active player, hole) cell without a gross score, home lineup first.
pub fn missing_scores(roster: &MatchRoster, grid: &ScoreGrid) -> Vec<MissingScore> {
    roster
        .players()
        .flat_map(|player| {
            Hole::all()
                .filter(move |hole| grid.get(player.id, *hole).is_none())
                .map(move |hole| MissingScore {
                    player_id: player.id,
                    hole,
                })
        })
        .collect()
}

/// True iff every active player has a gross score on all nine holes.
pub fn can_finalize(roster: &MatchRoster, grid: &ScoreGrid) -> bool {
    missing_scores(roster, grid).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{points::Points, roster::tests::roster};

    fn full_grid(roster: &MatchRoster, score: u8) -> ScoreGrid {
        let mut grid = ScoreGrid::new();
        for player in roster.players() {
            for hole in Hole::all() {
                grid.set(player.id, hole, Some(score));
            }
        }
        grid
    }

    #[test]
    fn empty_grid_misses_every_cell() {
        let roster = roster([2.0, 9.0], [4.0, 14.0]);
        let card = Scorecard::compute(&roster, &ScoreGrid::new()).unwrap();

        assert_eq!(card.missing.len(), 36);
        assert_eq!(card.totals, MatchTotals::default());
        assert!(!card.is_complete());
        assert!(card.players.iter().all(|line| line.holes.len() == 9));
    }

    #[test]
    fn missing_hole_nine_is_reported_exactly() {
        let roster = roster([2.0, 9.0], [4.0, 14.0]);
        let mut grid = full_grid(&roster, 5);
        let laggard = roster.away.players[1].id;
        let nine = Hole::new(9).unwrap();
        grid.set(laggard, nine, None);

        assert!(!can_finalize(&roster, &grid));
        assert_eq!(
            missing_scores(&roster, &grid),
            vec![MissingScore {
                player_id: laggard,
                hole: nine
            }]
        );
    }

    #[test]
    fn complete_card_can_finalize() {
        let roster = roster([2.0, 9.0], [4.0, 14.0]);
        let grid = full_grid(&roster, 5);

        let card = Scorecard::compute(&roster, &grid).unwrap();
        assert!(card.is_complete());
        assert!(can_finalize(&roster, &grid));
        assert_eq!(card.totals.holes_decided, 9);
        assert_eq!(card.totals.home + card.totals.away, Points::from_halves(18));
    }

    #[test]
    fn player_lines_carry_strokes_and_nets() {
        let roster = roster([0.0, 9.0], [0.0, 0.0]);
        let grid = full_grid(&roster, 5);
        let card = Scorecard::compute(&roster, &grid).unwrap();

        let line = card
            .players
            .iter()
            .find(|line| line.player_id == roster.home.players[1].id)
            .unwrap();
        assert_eq!(line.course_handicap, Some(9));
        assert!(line.holes.iter().all(|cell| cell.strokes == 1));
        assert!(line.holes.iter().all(|cell| cell.net == Some(4)));

        // The stroked home player wins every hole on net.
        assert_eq!(card.totals.home, Points::from_halves(18));
    }
}
