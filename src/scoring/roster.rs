//! Active lineups for a match, resolved from match-player rows.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of players each side fields in a match.
pub const LINEUP_SIZE: usize = 2;

/// Which team a player is playing for in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Home team.
    Home,
    /// Away team.
    Away,
}

/// A player taking part in a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Stable player identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// League-assigned handicap index, when one is known.
    pub handicap_index: Option<f64>,
    /// Whether this player is filling in for a regular team member.
    pub is_substitute: bool,
}

/// One row of the match roster as recorded by roster management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchPlayer {
    /// Side the player is playing for.
    pub side: Side,
    /// The player.
    pub player: Player,
    /// Regular team member this row replaces, for substitutes.
    #[serde(default)]
    pub replaces: Option<Uuid>,
    /// Rows that were swapped out stay on file but are inactive.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// The active players of one team for a match.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Lineup {
    /// Side this lineup plays for.
    pub side: Side,
    /// Active players, in roster order.
    pub players: Vec<Player>,
}

/// Both active lineups of a match.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchRoster {
    /// Home lineup.
    pub home: Lineup,
    /// Away lineup.
    pub away: Lineup,
}

/// Errors raised while building or using a roster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// A side does not field exactly two active players.
    #[error("{side:?} lineup has {count} active players, expected {LINEUP_SIZE}")]
    LineupSize {
        /// Offending side.
        side: Side,
        /// Number of active players found.
        count: usize,
    },
    /// The same player appears more than once among the active rows.
    #[error("player `{0}` appears more than once in the active roster")]
    DuplicatePlayer(Uuid),
    /// Stroke allocation needs at least two known handicaps.
    #[error("stroke allocation needs at least two known handicaps, found {0}")]
    InsufficientHandicaps(usize),
    /// A player is not part of the active roster.
    #[error("player `{0}` is not in the active roster")]
    UnknownPlayer(Uuid),
}

/// Build the active lineups of a match from its match-player rows.
///
/// Inactive rows are ignored, so a substitute row replaces rather than adds to
/// the regular player it stands in for.
pub fn resolve_roster(rows: &[MatchPlayer]) -> Result<MatchRoster, RosterError> {
    let mut seen = Vec::with_capacity(LINEUP_SIZE * 2);
    for row in rows.iter().filter(|row| row.active) {
        if seen.contains(&row.player.id) {
            return Err(RosterError::DuplicatePlayer(row.player.id));
        }
        seen.push(row.player.id);
    }

    Ok(MatchRoster {
        home: lineup_for(rows, Side::Home)?,
        away: lineup_for(rows, Side::Away)?,
    })
}

fn lineup_for(rows: &[MatchPlayer], side: Side) -> Result<Lineup, RosterError> {
    let players: Vec<Player> = rows
        .iter()
        .filter(|row| row.active && row.side == side)
        .map(|row| row.player.clone())
        .collect();

    if players.len() != LINEUP_SIZE {
        return Err(RosterError::LineupSize {
            side,
            count: players.len(),
        });
    }

    Ok(Lineup { side, players })
}

impl MatchRoster {
    /// Lineup for the given side.
    pub fn lineup(&self, side: Side) -> &Lineup {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// All active players, home lineup first.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.home.players.iter().chain(self.away.players.iter())
    }

    /// Look up an active player and the side they play for.
    pub fn find(&self, player_id: Uuid) -> Option<(Side, &Player)> {
        self.home
            .players
            .iter()
            .find(|player| player.id == player_id)
            .map(|player| (Side::Home, player))
            .or_else(|| {
                self.away
                    .players
                    .iter()
                    .find(|player| player.id == player_id)
                    .map(|player| (Side::Away, player))
            })
    }

    /// Whether the player is active in this match.
    pub fn contains(&self, player_id: Uuid) -> bool {
        self.find(player_id).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn player(name: &str, handicap_index: f64) -> Player {
        Player {
            id: Uuid::new_v4(),
            name: name.into(),
            handicap_index: Some(handicap_index),
            is_substitute: false,
        }
    }

    pub(crate) fn row(side: Side, player: Player) -> MatchPlayer {
        MatchPlayer {
            side,
            player,
            replaces: None,
            active: true,
        }
    }

    /// Roster with two primaries per side and the given handicap indexes.
    pub(crate) fn roster(home: [f64; 2], away: [f64; 2]) -> MatchRoster {
        let rows = vec![
            row(Side::Home, player("home-1", home[0])),
            row(Side::Home, player("home-2", home[1])),
            row(Side::Away, player("away-1", away[0])),
            row(Side::Away, player("away-2", away[1])),
        ];
        resolve_roster(&rows).unwrap()
    }

    #[test]
    fn resolves_primary_lineups() {
        let roster = roster([4.0, 12.0], [8.0, 20.0]);
        assert_eq!(roster.home.players.len(), 2);
        assert_eq!(roster.away.players.len(), 2);
        assert_eq!(roster.players().count(), 4);
    }

    #[test]
    fn substitute_replaces_inactive_primary() {
        let primary = player("regular", 10.0);
        let mut sub = player("sub", 18.0);
        sub.is_substitute = true;

        let rows = vec![
            MatchPlayer {
                active: false,
                ..row(Side::Home, primary.clone())
            },
            MatchPlayer {
                replaces: Some(primary.id),
                ..row(Side::Home, sub.clone())
            },
            row(Side::Home, player("partner", 6.0)),
            row(Side::Away, player("away-1", 9.0)),
            row(Side::Away, player("away-2", 11.0)),
        ];

        let roster = resolve_roster(&rows).unwrap();
        assert!(roster.contains(sub.id));
        assert!(!roster.contains(primary.id));
        assert_eq!(roster.find(sub.id).map(|(side, _)| side), Some(Side::Home));
    }

    #[test]
    fn extra_active_player_is_rejected() {
        let rows = vec![
            row(Side::Home, player("a", 1.0)),
            row(Side::Home, player("b", 2.0)),
            row(Side::Home, player("c", 3.0)),
            row(Side::Away, player("d", 4.0)),
            row(Side::Away, player("e", 5.0)),
        ];

        assert_eq!(
            resolve_roster(&rows),
            Err(RosterError::LineupSize {
                side: Side::Home,
                count: 3
            })
        );
    }

    #[test]
    fn same_player_on_both_sides_is_rejected() {
        let shared = player("twice", 7.0);
        let rows = vec![
            row(Side::Home, shared.clone()),
            row(Side::Home, player("b", 2.0)),
            row(Side::Away, shared.clone()),
            row(Side::Away, player("e", 5.0)),
        ];

        assert_eq!(
            resolve_roster(&rows),
            Err(RosterError::DuplicatePlayer(shared.id))
        );
    }

    #[test]
    fn active_flag_defaults_to_true() {
        let json = serde_json::json!({
            "side": "away",
            "player": {
                "id": Uuid::nil(),
                "name": "Pat",
                "handicap_index": 12.4,
                "is_substitute": false
            }
        });
        let row: MatchPlayer = serde_json::from_value(json).unwrap();
        assert!(row.active);
        assert_eq!(row.replaces, None);
    }
}
