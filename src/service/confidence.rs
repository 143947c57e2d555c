//! Confidence scoring for ranked candidates.

/// Sigmoid steepness.
const STEEPNESS: f64 = 20.0;
/// Match ratio that maps to 50 points.
const MIDPOINT: f64 = 0.15;
/// Ratio above which exceptional matches earn a linear boost.
const BOOST_THRESHOLD: f64 = 0.30;
/// Vote counts below this are statistically unreliable and scaled down.
const MIN_RELIABLE_MATCHES: usize = 5;

/// Score a candidate between 0 and 100.
///
/// The match count is compared against the smaller of the query and
/// reference hash counts, so short queries against long references are
/// judged fairly.
pub(crate) fn confidence(match_count: usize, query_hash_count: usize, db_hash_count: usize) -> f64 {
    if match_count == 0 || query_hash_count == 0 || db_hash_count == 0 {
        return 0.0;
    }

    let reference = query_hash_count.min(db_hash_count) as f64;
    let ratio = match_count as f64 / reference;

    let exponent = -STEEPNESS * (ratio - MIDPOINT);
    let mut confidence = 100.0 / (1.0 + exponent.exp());

    if ratio > BOOST_THRESHOLD {
        confidence = (confidence + (ratio - BOOST_THRESHOLD) * 50.0).min(100.0);
    }

    if match_count < MIN_RELIABLE_MATCHES {
        confidence *= match_count as f64 / MIN_RELIABLE_MATCHES as f64;
    }

    confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inputs_score_zero() {
        assert_eq!(confidence(0, 100, 100), 0.0);
        assert_eq!(confidence(10, 0, 100), 0.0);
        assert_eq!(confidence(10, 100, 0), 0.0);
    }

    #[test]
    fn scores_stay_within_bounds() {
        for &(m, q, d) in &[
            (1usize, 1usize, 1usize),
            (5, 10, 10),
            (100, 100, 100),
            (1_000, 100, 50),
            (3, 10_000, 10_000),
            (50_000, 50_000, 50_000),
        ] {
            let c = confidence(m, q, d);
            assert!((0.0..=100.0).contains(&c), "confidence({m}, {q}, {d}) = {c}");
        }
    }

    #[test]
    fn near_total_overlap_scores_high() {
        assert!(confidence(95, 100, 2_000) > 90.0);
    }

    #[test]
    fn low_ratio_scores_low() {
        assert!(confidence(10, 1_000, 1_000) < 20.0);
    }

    #[test]
    fn tiny_match_counts_are_penalized() {
        // Same ratio, but counts below five are scaled down.
        let reliable = confidence(10, 40, 1_000);
        let sparse = confidence(2, 8, 1_000);
        assert!(sparse < reliable);
        assert!(sparse < 50.0);
    }

    #[test]
    fn uses_the_smaller_hash_count_as_reference() {
        // A 30-hash query that fully matches a 1000-hash reference is a
        // strong result even though 30/1000 is small.
        assert!(confidence(30, 30, 1_000) > 90.0);
        assert!(confidence(30, 1_000, 30) > 90.0);
    }

    #[test]
    fn midpoint_ratio_scores_near_fifty() {
        let c = confidence(15, 100, 1_000);
        assert!((c - 50.0).abs() < 5.0, "expected about 50, got {c}");
    }
}
