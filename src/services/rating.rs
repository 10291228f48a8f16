//! Title rating derived from review scores.

/// Mean of `scores` rounded to the nearest integer, halves rounded up.
///
/// `None` when there are no scores. Integer arithmetic only, so the result
/// matches for every store and never depends on float formatting.
pub fn recompute_rating(scores: &[i32]) -> Option<i32> {
    if scores.is_empty() {
        return None;
    }

    let sum: i64 = scores.iter().map(|s| i64::from(*s)).sum();
    let count = scores.len() as i64;

    // scores are in 1..=10, so floor((2 * sum + count) / (2 * count))
    // is round-half-up of sum / count
    Some(((2 * sum + count) / (2 * count)) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_review_set_has_no_rating() {
        assert_eq!(recompute_rating(&[]), None);
    }

    #[test]
    fn single_score_is_the_rating() {
        for score in 1..=10 {
            assert_eq!(recompute_rating(&[score]), Some(score));
        }
    }

    #[test]
    fn mean_is_rounded_to_nearest() {
        assert_eq!(recompute_rating(&[7, 8]), Some(8)); // 7.5
        assert_eq!(recompute_rating(&[1, 2, 2]), Some(2)); // 1.67
        assert_eq!(recompute_rating(&[1, 1, 2]), Some(1)); // 1.33
        assert_eq!(recompute_rating(&[10, 10, 9]), Some(10)); // 9.67
        assert_eq!(recompute_rating(&[1, 10]), Some(6)); // 5.5
    }

    #[test]
    fn agrees_with_float_rounding() {
        // every multiset of up to three scores
        for a in 1..=10 {
            for b in 1..=10 {
                for c in 1..=10 {
                    let scores = [a, b, c];
                    let mean = scores.iter().sum::<i32>() as f64 / 3.0;
                    assert_eq!(recompute_rating(&scores), Some(mean.round() as i32));
                }
            }
        }
    }
}
