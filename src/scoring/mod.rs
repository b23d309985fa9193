//! Match scoring engine: course data, stroke allocation, net scores and
//! best-ball match points.

pub mod allocator;
pub mod course;
pub mod grid;
pub mod net;
pub mod points;
pub mod roster;
pub mod scorecard;

pub use allocator::{StrokeAllocator, strokes_given_on_hole};
pub use course::{Hole, InvalidHole, course_handicap};
pub use grid::{CellKey, HoleScore, ScoreGrid};
pub use net::{MAX_GROSS_SCORE, net_score};
pub use points::{HoleOutcome, HolePoints, MatchTotals, Points};
pub use roster::{MatchPlayer, MatchRoster, Player, RosterError, Side, resolve_roster};
pub use scorecard::{MissingScore, Scorecard, can_finalize, missing_scores};
