//! Static description of the league's 9-hole course.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Number of holes played in a league match.
pub const HOLE_COUNT: u8 = 9;
/// Slope rating of the course, relative to the standard 113.
pub const SLOPE_RATING: f64 = 117.0;
const STANDARD_SLOPE: f64 = 113.0;

/// Par and difficulty rating for each hole, indexed by `hole - 1`.
///
/// Difficulty ratings are a permutation of 1..=9 where 1 is the hardest hole.
const HOLES: [HoleInfo; HOLE_COUNT as usize] = [
    HoleInfo { par: 4, rating: 3 },
    HoleInfo { par: 3, rating: 9 },
    HoleInfo { par: 4, rating: 1 },
    HoleInfo { par: 5, rating: 5 },
    HoleInfo { par: 4, rating: 7 },
    HoleInfo { par: 4, rating: 2 },
    HoleInfo { par: 3, rating: 8 },
    HoleInfo { par: 5, rating: 6 },
    HoleInfo { par: 4, rating: 4 },
];

#[derive(Debug, Clone, Copy)]
struct HoleInfo {
    par: u8,
    rating: u8,
}

/// Raised when a hole number falls outside `1..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("hole {0} is outside the course (expected 1..={HOLE_COUNT})")]
pub struct InvalidHole(pub u8);

/// A hole number that is known to exist on the course.
///
/// Serialized as a bare integer in `1..=9`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(try_from = "u8", into = "u8")]
#[schema(value_type = u8)]
pub struct Hole(u8);

impl Default for Hole {
    fn default() -> Self {
        Self::FIRST
    }
}

impl Hole {
    /// The first hole of the course.
    pub const FIRST: Hole = Hole(1);

    /// Validate a raw hole number.
    pub fn new(number: u8) -> Result<Self, InvalidHole> {
        if (1..=HOLE_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(InvalidHole(number))
        }
    }

    /// Every hole of the course in playing order.
    pub fn all() -> impl Iterator<Item = Hole> + Clone {
        (1..=HOLE_COUNT).map(Hole)
    }

    /// Raw hole number (1-based).
    pub fn number(self) -> u8 {
        self.0
    }

    /// Par for this hole.
    pub fn par(self) -> u8 {
        self.info().par
    }

    /// Difficulty rating for this hole, 1 being the hardest.
    pub fn difficulty_rating(self) -> u8 {
        self.info().rating
    }

    fn info(self) -> HoleInfo {
        HOLES[usize::from(self.0 - 1)]
    }
}

impl TryFrom<u8> for Hole {
    type Error = InvalidHole;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Hole> for u8 {
    fn from(value: Hole) -> Self {
        value.0
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Par for the given hole.
pub fn par_for_hole(hole: Hole) -> u8 {
    hole.par()
}

/// Difficulty rating for the given hole (1 = hardest, 9 = easiest).
pub fn difficulty_rating_for_hole(hole: Hole) -> u8 {
    hole.difficulty_rating()
}

/// Total par of the course.
pub fn course_par() -> u32 {
    Hole::all().map(|hole| u32::from(hole.par())).sum()
}

/// Convert a handicap index into whole strokes on this course.
///
/// Rounds half up, so plus handicaps round towards zero on exact halves.
pub fn course_handicap(handicap_index: f64) -> i32 {
    let exact = handicap_index * SLOPE_RATING / STANDARD_SLOPE;
    (exact + 0.5).floor() as i32
}
