//! Phase 2: coordinated descent over the two sides of each set pair.
//!
//! Both hit streams are walked in descending locus order.  The fewer-hits
//! side drives: for each of its loci, every more-hits locus within the
//! spacing window becomes a mate candidate, and the fewer-side locus itself
//! becomes a scoring candidate when the combined lower bound is not already
//! hopeless.  The walk can stop at a target locus so an upstream driver can
//! sweep one cluster neighborhood at a time.

use super::candidates::{MateScore, ScoringCandidate, ScoringMateCandidate, NUM_SET_PAIRS};
use super::set_pair_direction;
use super::PairAligner;
use crate::cluster::UNCLUSTERED;
use crate::genome::{GenomeView, INVALID_LOCATION};
use crate::index::SeedIndex;
use crate::scoring::ScoringOracle;
use crate::utils::locations_within;

/// Cursor state for both set pairs.
pub(crate) struct DescentState {
    pub fewer_locus: [u64; NUM_SET_PAIRS],
    pub more_locus: [u64; NUM_SET_PAIRS],
    pub fewer_seed_offset: [u64; NUM_SET_PAIRS],
    pub more_seed_offset: [u64; NUM_SET_PAIRS],
    pub out_of_more: [bool; NUM_SET_PAIRS],
    pub done: [bool; NUM_SET_PAIRS],
}

impl DescentState {
    pub fn new() -> DescentState {
        DescentState {
            fewer_locus: [0; NUM_SET_PAIRS],
            more_locus: [INVALID_LOCATION; NUM_SET_PAIRS],
            fewer_seed_offset: [0; NUM_SET_PAIRS],
            more_seed_offset: [0; NUM_SET_PAIRS],
            out_of_more: [false; NUM_SET_PAIRS],
            done: [true; NUM_SET_PAIRS],
        }
    }
}

enum MoveOutcome {
    /// Both streams are exhausted for this set pair.
    SetPairDone,
    /// The fewer side jumped past a gap; re-check before adding candidates.
    Stepped,
    /// The streams are within the window; add candidates.
    InWindow,
}

impl<G: GenomeView, I: SeedIndex, O: ScoringOracle> PairAligner<'_, G, I, O> {
    /// Position both set pairs at their first fewer-side locus.  Returns
    /// false when neither set pair has any fewer-side hits.
    pub fn init_descent(&mut self) -> bool {
        let mut any_live = false;
        for sp in 0..NUM_SET_PAIRS {
            self.descent.more_locus[sp] = INVALID_LOCATION;
            self.descent.more_seed_offset[sp] = 0;
            self.descent.out_of_more[sp] = false;

            let dir = set_pair_direction(sp, self.fewer_read);
            match self.hit_sets[self.fewer_read][dir.index()].first_hit() {
                Some((locus, seed_offset)) => {
                    self.descent.fewer_locus[sp] = locus;
                    self.descent.fewer_seed_offset[sp] = seed_offset;
                    self.descent.done[sp] = false;
                    any_live = true;
                }
                None => self.descent.done[sp] = true,
            }
        }
        any_live
    }

    /// Enumerate every candidate pair (no target locus).
    pub fn enumerate_candidates(&mut self) {
        if self.init_descent() {
            self.descend_to_target(0, UNCLUSTERED);
        }
    }

    /// Highest fewer-side locus not yet consumed across live set pairs.
    pub fn next_fewer_locus(&self) -> Option<u64> {
        (0..NUM_SET_PAIRS)
            .filter(|&sp| !self.descent.done[sp])
            .map(|sp| self.descent.fewer_locus[sp])
            .max()
    }

    /// Walk both set pairs round-robin, adding candidates, until every live
    /// fewer-side cursor has descended to `target` (or the streams run
    /// out).  Candidates created here carry `cluster`.  Returns true while
    /// at least one set pair is still live.
    pub fn descend_to_target(&mut self, target: u64, cluster: i32) -> bool {
        let mut made_progress = true;
        let mut target_not_met = (0..NUM_SET_PAIRS)
            .any(|sp| !self.descent.done[sp] && self.descent.fewer_locus[sp] > target);

        while made_progress && target_not_met {
            made_progress = false;
            for sp in 0..NUM_SET_PAIRS {
                if self.descent.done[sp] {
                    continue;
                }
                match self.move_locus(sp) {
                    MoveOutcome::SetPairDone => {
                        self.descent.done[sp] = true;
                        continue;
                    }
                    MoveOutcome::Stepped => {
                        made_progress = true;
                        continue;
                    }
                    MoveOutcome::InWindow => {}
                }

                let not_met = self.descent.fewer_locus[sp] > target;
                target_not_met = target_not_met || not_met;
                if not_met {
                    let exhausted = self.add_candidates_at_cursor(sp, cluster);
                    self.descent.done[sp] = exhausted;
                    made_progress = made_progress || !exhausted;
                }
            }
        }

        self.descent.done.iter().any(|done| !done)
    }

    /// Re-establish the loop invariant: the more-side cursor is the highest
    /// locus that could still pair with the current fewer-side locus.
    fn move_locus(&mut self, sp: usize) -> MoveOutcome {
        let max_spacing = self.opt.max_spacing;
        let fewer = self.descent.fewer_locus[sp];

        if self.descent.more_locus[sp] > fewer.saturating_add(max_spacing) {
            // More side is above the window; jump it down.
            let dir = set_pair_direction(sp, self.more_read);
            match self.hit_sets[self.more_read][dir.index()]
                .next_hit_leq(fewer.saturating_add(max_spacing))
            {
                Some((locus, seed_offset)) => {
                    self.descent.more_locus[sp] = locus;
                    self.descent.more_seed_offset[sp] = seed_offset;
                }
                None => return MoveOutcome::SetPairDone,
            }
        }

        let more = self.descent.more_locus[sp];
        let more_too_low = more.saturating_add(max_spacing) < fewer;
        if more_too_low || self.descent.out_of_more[sp] {
            // The fewer-side locus has no mate unless one of the already
            // recorded mate candidates is still in range.
            let last_mate_in_range = self.pools.mates[sp]
                .last()
                .is_some_and(|mate| locations_within(mate.locus, fewer, max_spacing));
            if !last_mate_in_range {
                if self.descent.out_of_more[sp] {
                    return MoveOutcome::SetPairDone;
                }
                let dir = set_pair_direction(sp, self.fewer_read);
                match self.hit_sets[self.fewer_read][dir.index()]
                    .next_hit_leq(more.saturating_add(max_spacing))
                {
                    Some((locus, seed_offset)) => {
                        self.descent.fewer_locus[sp] = locus;
                        self.descent.fewer_seed_offset[sp] = seed_offset;
                        return MoveOutcome::Stepped;
                    }
                    None => return MoveOutcome::SetPairDone,
                }
            }
        }

        MoveOutcome::InWindow
    }

    /// Record every in-window more-side locus as a mate candidate, then the
    /// fewer-side locus itself as a scoring candidate if the pair's combined
    /// lower bound clears the search ceiling.  Returns true when the fewer
    /// side is exhausted afterwards.
    fn add_candidates_at_cursor(&mut self, sp: usize, cluster: i32) -> bool {
        let max_spacing = self.opt.max_spacing;
        let fewer = self.descent.fewer_locus[sp];
        let window_floor = fewer.saturating_sub(max_spacing);

        let more_dir = set_pair_direction(sp, self.more_read);
        while self.descent.more_locus[sp] >= window_floor && !self.descent.out_of_more[sp] {
            let best_possible = if self.opt.no_truncation {
                0
            } else {
                self.hit_sets[self.more_read][more_dir.index()].best_possible_score_for_cursor()
            };
            self.pools.push_mate(
                sp,
                ScoringMateCandidate {
                    locus: self.descent.more_locus[sp],
                    best_possible_score: best_possible,
                    seed_offset: self.descent.more_seed_offset[sp],
                    score: MateScore::Unscored,
                },
            );
            log::trace!(
                "set pair {sp}: mate candidate {} at {}, lower bound {}",
                self.pools.mates[sp].len() - 1,
                self.descent.more_locus[sp],
                best_possible
            );

            match self.hit_sets[self.more_read][more_dir.index()].next_lower_hit() {
                Some((locus, seed_offset)) => {
                    self.descent.more_locus[sp] = locus;
                    self.descent.more_seed_offset[sp] = seed_offset;
                }
                None => {
                    self.descent.more_locus[sp] = 0;
                    self.descent.out_of_more[sp] = true;
                }
            }
        }

        let fewer_dir = set_pair_direction(sp, self.fewer_read);
        let best_possible_fewer = if self.opt.no_truncation {
            0
        } else {
            self.hit_sets[self.fewer_read][fewer_dir.index()].best_possible_score_for_cursor()
        };

        // The mates just added may overlap ones recorded for an earlier,
        // higher fewer-side locus, so take the minimum over every mate
        // still inside the window.
        let ceiling = self.opt.max_k + self.opt.extra_search_depth;
        let mut lowest_mate_bound = ceiling;
        for mate in self.pools.mates[sp].iter().rev() {
            if mate.locus > fewer.saturating_add(max_spacing) {
                break;
            }
            lowest_mate_bound = lowest_mate_bound.min(mate.best_possible_score);
        }

        if lowest_mate_bound + best_possible_fewer <= ceiling {
            // move_locus only falls through to us with an in-window mate
            // recorded or about to be recorded.
            debug_assert!(!self.pools.mates[sp].is_empty());
            let cluster_penalty = if cluster == UNCLUSTERED {
                self.opt.cluster_ed_compensation
            } else {
                0
            };
            let list = if self.opt.no_ordered_evaluation {
                0
            } else {
                (lowest_mate_bound + best_possible_fewer + cluster_penalty) as usize
            };
            self.pools.push_candidate(
                ScoringCandidate {
                    locus: fewer,
                    set_pair: sp,
                    highest_mate: self.pools.mates[sp].len() - 1,
                    seed_offset: self.descent.fewer_seed_offset[sp],
                    best_possible_score: best_possible_fewer,
                    next_in_list: None,
                    cluster,
                    fewer_end: None,
                    merge_anchor: None,
                },
                list,
            );
            log::trace!(
                "set pair {sp}: scoring candidate at {fewer}, list {list}, lower bound {best_possible_fewer}"
            );
        }

        match self.hit_sets[self.fewer_read][fewer_dir.index()].next_lower_hit() {
            Some((locus, seed_offset)) => {
                self.descent.fewer_locus[sp] = locus;
                self.descent.fewer_seed_offset[sp] = seed_offset;
                false
            }
            None => true,
        }
    }
}
