//! Handicap stroke allocation relative to the lowest handicap in a match.

use uuid::Uuid;

use super::{
    course::{Hole, course_handicap},
    roster::{MatchRoster, RosterError},
};

/// Width of one allocation band: one stroke per hole per nine strokes of difference.
pub const BAND_WIDTH: i32 = 9;

/// Strokes a player receives on `hole`, given every course handicap in the match.
///
/// `all_course_handicaps` should include the player's own handicap. When it is
/// the only entry the player is trivially the low handicap and receives nothing.
pub fn strokes_for_course_handicaps(
    player_course_handicap: i32,
    hole: Hole,
    all_course_handicaps: &[i32],
) -> u32 {
    let low = all_course_handicaps
        .iter()
        .copied()
        .min()
        .unwrap_or(player_course_handicap)
        .min(player_course_handicap);
    let base = player_course_handicap - low;
    if base <= 0 {
        return 0;
    }

    let rating = i32::from(hole.difficulty_rating());
    let mut strokes = 0;
    let mut remaining = base;
    while remaining > 0 {
        if rating <= remaining {
            strokes += 1;
        }
        remaining -= BAND_WIDTH;
    }
    strokes
}

/// Strokes given on `hole` to a player with `player_handicap_index`.
///
/// Handicaps are converted to course handicaps first; unknown handicaps are
/// left out of the comparison.
pub fn strokes_given_on_hole(
    player_handicap_index: f64,
    hole: Hole,
    all_handicap_indexes: &[Option<f64>],
) -> u32 {
    let course_handicaps: Vec<i32> = all_handicap_indexes
        .iter()
        .flatten()
        .map(|index| course_handicap(*index))
        .collect();
    strokes_for_course_handicaps(course_handicap(player_handicap_index), hole, &course_handicaps)
}

/// Stroke allocator bound to one match roster.
///
/// Built fresh from the current roster every time scores are evaluated, so a
/// substitution never sees allocations computed for the previous lineup.
#[derive(Debug, Clone)]
pub struct StrokeAllocator {
    course_handicaps: Vec<(Uuid, Option<i32>)>,
    known: Vec<i32>,
}

impl StrokeAllocator {
    /// Bind an allocator to the active players of `roster`.
    ///
    /// Fails when fewer than two players have a known handicap, since the
    /// allocation would be meaningless.
    pub fn for_roster(roster: &MatchRoster) -> Result<Self, RosterError> {
        let course_handicaps: Vec<(Uuid, Option<i32>)> = roster
            .players()
            .map(|player| (player.id, player.handicap_index.map(course_handicap)))
            .collect();
        let known: Vec<i32> = course_handicaps.iter().filter_map(|(_, ch)| *ch).collect();

        if known.len() < 2 {
            return Err(RosterError::InsufficientHandicaps(known.len()));
        }

        Ok(Self {
            course_handicaps,
            known,
        })
    }

    /// Course handicap of an active player, if known.
    pub fn course_handicap(&self, player_id: Uuid) -> Result<Option<i32>, RosterError> {
        self.course_handicaps
            .iter()
            .find(|(id, _)| *id == player_id)
            .map(|(_, ch)| *ch)
            .ok_or(RosterError::UnknownPlayer(player_id))
    }

    /// Strokes given to `player_id` on `hole`; players without a handicap get none.
    pub fn strokes(&self, player_id: Uuid, hole: Hole) -> Result<u32, RosterError> {
        Ok(self
            .course_handicap(player_id)?
            .map(|ch| strokes_for_course_handicaps(ch, hole, &self.known))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::roster::tests::roster;
    use proptest::prelude::*;

    fn hole_with_rating(rating: u8) -> Hole {
        Hole::all()
            .find(|hole| hole.difficulty_rating() == rating)
            .unwrap()
    }

    #[test]
    fn scratch_player_gets_nothing() {
        for hole in Hole::all() {
            assert_eq!(strokes_for_course_handicaps(0, hole, &[0, 9, 18, 27]), 0);
        }
    }

    #[test]
    fn single_band_follows_difficulty_order() {
        let all = [0, 5];
        for rating in 1..=9 {
            let expected = u32::from(rating <= 5);
            assert_eq!(
                strokes_for_course_handicaps(5, hole_with_rating(rating), &all),
                expected,
                "rating {rating}"
            );
        }
    }

    #[test]
    fn ten_stroke_difference_doubles_up_on_the_hardest_hole() {
        let all = [2, 12];
        let strokes: Vec<u32> = (1..=9)
            .map(|rating| strokes_for_course_handicaps(12, hole_with_rating(rating), &all))
            .collect();
        assert_eq!(strokes, vec![2, 1, 1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn twenty_seven_strokes_is_three_on_every_hole() {
        let all = [0, 9, 18, 27];
        for hole in Hole::all() {
            assert_eq!(strokes_for_course_handicaps(27, hole, &all), 3);
            assert_eq!(strokes_for_course_handicaps(18, hole, &all), 2);
            assert_eq!(strokes_for_course_handicaps(9, hole, &all), 1);
        }
    }

    #[test]
    fn lone_player_receives_nothing() {
        for hole in Hole::all() {
            assert_eq!(strokes_for_course_handicaps(14, hole, &[14]), 0);
            assert_eq!(strokes_for_course_handicaps(14, hole, &[]), 0);
        }
    }

    #[test]
    fn unknown_handicaps_are_skipped() {
        let hardest = hole_with_rating(1);
        assert_eq!(
            strokes_given_on_hole(10.0, hardest, &[None, Some(0.0), Some(10.0)]),
            2
        );
        assert_eq!(strokes_given_on_hole(10.0, hardest, &[None, Some(10.0)]), 0);
    }

    #[test]
    fn allocator_requires_two_known_handicaps() {
        let mut roster = roster([0.0, 10.0], [5.0, 8.0]);
        for player in roster
            .home
            .players
            .iter_mut()
            .chain(roster.away.players.iter_mut())
            .skip(1)
        {
            player.handicap_index = None;
        }

        assert_eq!(
            StrokeAllocator::for_roster(&roster).unwrap_err(),
            RosterError::InsufficientHandicaps(1)
        );
    }

    #[test]
    fn allocator_is_relative_to_current_roster() {
        let mut roster = roster([0.0, 10.0], [5.0, 8.0]);
        let player = roster.home.players[1].id;
        let hardest = hole_with_rating(1);

        let before = StrokeAllocator::for_roster(&roster).unwrap();
        assert_eq!(before.strokes(player, hardest).unwrap(), 2);

        // Substitute the scratch player with a 6.0: the low handicap becomes 5.
        roster.home.players[0].handicap_index = Some(6.0);
        let after = StrokeAllocator::for_roster(&roster).unwrap();
        assert_eq!(after.course_handicap(player).unwrap(), Some(10));
        assert_eq!(after.strokes(player, hardest).unwrap(), 1);
        assert_eq!(after.strokes(player, hole_with_rating(6)).unwrap(), 0);
        assert_eq!(before.strokes(player, hole_with_rating(6)).unwrap(), 1);
    }

    #[test]
    fn unknown_player_is_reported() {
        let roster = roster([0.0, 10.0], [5.0, 8.0]);
        let allocator = StrokeAllocator::for_roster(&roster).unwrap();
        let stranger = Uuid::new_v4();
        assert_eq!(
            allocator.strokes(stranger, hole_with_rating(1)),
            Err(RosterError::UnknownPlayer(stranger))
        );
    }

    proptest! {
        #[test]
        fn strokes_sum_to_the_handicap_difference(
            player in 0i32..60,
            others in proptest::collection::vec(0i32..60, 1..4)
        ) {
            let mut all = others.clone();
            all.push(player);
            let low = *all.iter().min().unwrap();
            let total: u32 = Hole::all()
                .map(|hole| strokes_for_course_handicaps(player, hole, &all))
                .sum();
            prop_assert_eq!(total as i32, player - low);
        }

        #[test]
        fn band_loop_matches_closed_form(base in 0i32..80, rating in 1u8..=9) {
            let hole = hole_with_rating(rating);
            let expected = if base <= 0 {
                0
            } else {
                (base / BAND_WIDTH) as u32 + u32::from(i32::from(rating) <= base % BAND_WIDTH)
            };
            prop_assert_eq!(strokes_for_course_handicaps(base, hole, &[0, base]), expected);
        }

        #[test]
        fn lowest_handicap_never_receives_strokes(
            handicaps in proptest::collection::vec(-5i32..50, 2..5)
        ) {
            let low = *handicaps.iter().min().unwrap();
            for hole in Hole::all() {
                prop_assert_eq!(strokes_for_course_handicaps(low, hole, &handicaps), 0);
            }
        }
    }
}
