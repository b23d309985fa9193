//! Best-ball match play: per-hole points and match totals.

use std::{fmt, iter::Sum, ops::Add};

use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use super::{
    allocator::StrokeAllocator,
    course::Hole,
    grid::ScoreGrid,
    net::net_score,
    roster::{Lineup, MatchRoster, RosterError},
};

/// Match points held as a whole number of half points, so sums stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = f64)]
pub struct Points(u32);

impl Points {
    /// No points.
    pub const ZERO: Points = Points(0);
    /// Half a point, awarded to each side on a halved hole.
    pub const HALF: Points = Points(1);
    /// A full point, awarded for winning a hole.
    pub const ONE: Points = Points(2);

    /// Build from a count of half points.
    pub fn from_halves(halves: u32) -> Self {
        Self(halves)
    }

    /// Number of half points.
    pub fn halves(self) -> u32 {
        self.0
    }

    /// Decimal value (exact for any realistic total).
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

impl Add for Points {
    type Output = Points;

    fn add(self, rhs: Self) -> Self::Output {
        Points(self.0 + rhs.0)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Points::ZERO, Add::add)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}.5", self.0 / 2)
        }
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// How a hole was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HoleOutcome {
    /// At least one side has no score yet; nothing is awarded.
    Pending,
    /// Home side had the lower best net.
    Home,
    /// Away side had the lower best net.
    Away,
    /// Best nets were equal.
    Halved,
}

/// Points awarded on one hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HolePoints {
    /// Hole these points belong to.
    pub hole: Hole,
    /// Decision for the hole.
    pub outcome: HoleOutcome,
    /// Best net score on the home side, if any home player has scored.
    pub home_best_net: Option<u32>,
    /// Best net score on the away side, if any away player has scored.
    pub away_best_net: Option<u32>,
    /// Points to the home side.
    pub home: Points,
    /// Points to the away side.
    pub away: Points,
}

impl HolePoints {
    /// Whether both sides had a scored player on this hole.
    pub fn is_decided(&self) -> bool {
        self.outcome != HoleOutcome::Pending
    }
}

/// Running totals for a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MatchTotals {
    /// Total points for the home side.
    pub home: Points,
    /// Total points for the away side.
    pub away: Points,
    /// Holes where both sides had a scored player.
    pub holes_decided: u8,
}

/// Best net score among the lineup's players who have scored the hole.
fn best_net(
    lineup: &Lineup,
    hole: Hole,
    grid: &ScoreGrid,
    allocator: &StrokeAllocator,
) -> Result<Option<u32>, RosterError> {
    let mut best: Option<u32> = None;
    for player in &lineup.players {
        let Some(gross) = grid.get(player.id, hole) else {
            continue;
        };
        let strokes = allocator.strokes(player.id, hole)?;
        if let Some(net) = net_score(Some(gross), strokes) {
            best = Some(best.map_or(net, |current| current.min(net)));
        }
    }
    Ok(best)
}

/// Compare best nets on a hole and award 1/0, 0/1, 0.5/0.5, or 0/0 when undecided.
pub fn compute_hole_points(
    hole: Hole,
    roster: &MatchRoster,
    grid: &ScoreGrid,
    allocator: &StrokeAllocator,
) -> Result<HolePoints, RosterError> {
    let home_best_net = best_net(&roster.home, hole, grid, allocator)?;
    let away_best_net = best_net(&roster.away, hole, grid, allocator)?;

    let (outcome, home, away) = match (home_best_net, away_best_net) {
        (Some(home), Some(away)) if home < away => (HoleOutcome::Home, Points::ONE, Points::ZERO),
        (Some(home), Some(away)) if home > away => (HoleOutcome::Away, Points::ZERO, Points::ONE),
        (Some(_), Some(_)) => (HoleOutcome::Halved, Points::HALF, Points::HALF),
        _ => (HoleOutcome::Pending, Points::ZERO, Points::ZERO),
    };

    Ok(HolePoints {
        hole,
        outcome,
        home_best_net,
        away_best_net,
        home,
        away,
    })
}

/// Points for every hole of the course, in hole order.
pub fn compute_all_holes(
    roster: &MatchRoster,
    grid: &ScoreGrid,
    allocator: &StrokeAllocator,
) -> Result<Vec<HolePoints>, RosterError> {
    Hole::all()
        .map(|hole| compute_hole_points(hole, roster, grid, allocator))
        .collect()
}

/// Elementwise sum of per-hole points.
pub fn compute_match_totals(holes: &[HolePoints]) -> MatchTotals {
    MatchTotals {
        home: holes.iter().map(|hole| hole.home).sum(),
        away: holes.iter().map(|hole| hole.away).sum(),
        holes_decided: holes.iter().filter(|hole| hole.is_decided()).count() as u8,
    }
}
