/// Largest gross score accepted for a single hole.
pub const MAX_GROSS_SCORE: u8 = 15;

/// Net score for a hole: gross minus strokes given, never below 1.
///
/// Returns `None` while no gross score has been entered.
pub fn net_score(gross: Option<u8>, strokes_given: u32) -> Option<u32> {
    gross.map(|gross| u32::from(gross).saturating_sub(strokes_given).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unscored_hole_has_no_net() {
        assert_eq!(net_score(None, 0), None);
        assert_eq!(net_score(None, 3), None);
    }

    #[test]
    fn strokes_are_subtracted() {
        assert_eq!(net_score(Some(5), 0), Some(5));
        assert_eq!(net_score(Some(5), 2), Some(3));
    }

    #[test]
    fn net_is_floored_at_one() {
        assert_eq!(net_score(Some(2), 2), Some(1));
        assert_eq!(net_score(Some(1), 5), Some(1));
    }

    proptest! {
        #[test]
        fn net_is_never_below_one(gross in 1u8..=MAX_GROSS_SCORE, strokes in 0u32..10) {
            let net = net_score(Some(gross), strokes).unwrap();
            prop_assert!(net >= 1);
            prop_assert!(net <= u32::from(gross));
        }
    }
}
