//! Raw gross scores of a match keyed by (player, hole).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::course::Hole;

/// One cell of the score grid. `score: None` means "not entered yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HoleScore {
    /// Player the score belongs to.
    pub player_id: Uuid,
    /// Hole played.
    pub hole: Hole,
    /// Gross strokes, or `None` when cleared / not entered.
    pub score: Option<u8>,
}

/// Key identifying a single cell of the grid.
pub type CellKey = (Uuid, Hole);

/// Gross scores entered for a match. Absent cells are unscored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreGrid {
    cells: HashMap<CellKey, u8>,
}

impl ScoreGrid {
    /// Empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gross score for a cell.
    pub fn get(&self, player_id: Uuid, hole: Hole) -> Option<u8> {
        self.cells.get(&(player_id, hole)).copied()
    }

    /// Set or clear a cell, returning the previous value.
    pub fn set(&mut self, player_id: Uuid, hole: Hole, score: Option<u8>) -> Option<u8> {
        match score {
            Some(value) => self.cells.insert((player_id, hole), value),
            None => self.cells.remove(&(player_id, hole)),
        }
    }

    /// Apply a cell update.
    pub fn apply(&mut self, score: HoleScore) -> Option<u8> {
        self.set(score.player_id, score.hole, score.score)
    }

    /// Number of scored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell has been scored yet.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Scored cells, sorted by player then hole for stable output.
    pub fn entries(&self) -> Vec<HoleScore> {
        let mut entries: Vec<HoleScore> = self
            .cells
            .iter()
            .map(|(&(player_id, hole), &score)| HoleScore {
                player_id,
                hole,
                score: Some(score),
            })
            .collect();
        entries.sort_by_key(|entry| (entry.player_id, entry.hole));
        entries
    }
}

impl FromIterator<HoleScore> for ScoreGrid {
    fn from_iter<T: IntoIterator<Item = HoleScore>>(iter: T) -> Self {
        let mut grid = Self::new();
        for score in iter {
            grid.apply(score);
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_removes_the_cell() {
        let player = Uuid::new_v4();
        let hole = Hole::new(3).unwrap();
        let mut grid = ScoreGrid::new();

        assert_eq!(grid.set(player, hole, Some(5)), None);
        assert_eq!(grid.set(player, hole, Some(4)), Some(5));
        assert_eq!(grid.get(player, hole), Some(4));

        assert_eq!(grid.set(player, hole, None), Some(4));
        assert_eq!(grid.get(player, hole), None);
        assert!(grid.is_empty());
        assert!(grid.entries().is_empty());
    }

    #[test]
    fn later_entries_win_when_collecting() {
        let player = Uuid::new_v4();
        let hole = Hole::new(1).unwrap();
        let grid: ScoreGrid = [
            HoleScore {
                player_id: player,
                hole,
                score: Some(6),
            },
            HoleScore {
                player_id: player,
                hole,
                score: Some(5),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.get(player, hole), Some(5));
    }
}
