//! Bounded edit-distance oracle interface.
//!
//! The aligner scores a candidate locus by splitting the read at the seed:
//! the tail (seed end to read end) is scored left-to-right, the head (read
//! start to seed start) right-to-left.  The oracle provides both primitives;
//! the aligner owns the split, the seed's probability contribution, and all
//! candidate bookkeeping.

/// Result of scoring one side of the seed.
#[derive(Debug, Clone, Copy)]
pub struct ScoredEnd {
    /// Edit-distance score, in [0, limit].
    pub score: i32,
    /// Match probability of the scored region, in [0, 1].
    pub probability: f64,
}

pub trait ScoringOracle {
    /// Score `pattern` against `text` left-to-right under `limit`.
    ///
    /// `text` may be longer than `pattern` to leave room for deletions.
    /// Returns `None` when no alignment within `limit` exists.
    fn score_forward(
        &mut self,
        text: &[u8],
        pattern: &[u8],
        quality: &[u8],
        limit: i32,
    ) -> Option<ScoredEnd>;

    /// Score the read head right-to-left.
    ///
    /// Both ends are anchored on the right: `text` ends where the seed match
    /// begins (with extra lookback bases before it for deletions), and
    /// `pattern_rev`/`quality_rev` hold the read prefix byte-reversed, so the
    /// implementation walks `pattern_rev` forward while walking `text` from
    /// its last byte backwards.  On success also returns the signed
    /// correction to add to the candidate locus to obtain the leftmost
    /// aligned genome position (non-zero when indels shift the start).
    fn score_reverse(
        &mut self,
        text: &[u8],
        pattern_rev: &[u8],
        quality_rev: &[u8],
        limit: i32,
    ) -> Option<(ScoredEnd, i64)>;
}
