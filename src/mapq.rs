//! Mapping-quality model.
//!
//! MAPQ is the Phred-scaled probability that the reported pair is wrong,
//! estimated from the ratio of the best pair's match probability to the
//! summed probability of every pair considered.  Seeds skipped for being too
//! popular hide candidates from that sum, so each one docks the estimate.

use crate::defaults::MAPQ_MAX;

/// Compute MAPQ for one read of the best pair.
///
/// `probability_of_all_pairs` is the compensated-probability mass over every
/// anchor within the MAPQ cutoff; `probability_of_best_pair` is the best
/// anchor's share of it.  `score` is the read's edit-distance score (negative
/// means unaligned).  `popular_seeds_skipped` is summed over both reads.
pub fn compute_mapq(
    probability_of_all_pairs: f64,
    probability_of_best_pair: f64,
    score: i32,
    popular_seeds_skipped: u32,
) -> u8 {
    if score < 0 || probability_of_all_pairs <= 0.0 || probability_of_best_pair <= 0.0 {
        return 0;
    }

    let correctness = (probability_of_best_pair / probability_of_all_pairs).min(1.0);

    let base = if correctness >= 1.0 - 1e-10 {
        MAPQ_MAX as i32
    } else {
        let phred = -10.0 * (1.0 - correctness).log10();
        (phred as i32).min(MAPQ_MAX as i32)
    };

    // Each skipped popular seed hides an unknown number of competing
    // candidates from probability_of_all_pairs.
    (base - 2 * popular_seeds_skipped as i32).clamp(0, MAPQ_MAX as i32) as u8
}
