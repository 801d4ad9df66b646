//! Arena-allocated candidate records for one pair.
//!
//! Candidates, mate candidates, and merge anchors live in flat pools that
//! are cleared (capacity kept) at the start of each pair; cross-references
//! are pool indices.  Score lists are intrusive singly-linked lists threaded
//! through the candidate pool, one list per best-possible pair score.

use crate::cluster::UNCLUSTERED;
use crate::defaults::CANDIDATE_MERGE_WINDOW;
use crate::utils::{self, locations_within};

pub(crate) const NUM_SET_PAIRS: usize = 2;

/// One side of the seed split, successfully scored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoredLocation {
    pub score: i32,
    pub probability: f64,
    /// Signed correction to the candidate locus from indels in the head.
    pub offset: i64,
}

/// Scoring state of a mate candidate.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MateScore {
    Unscored,
    /// The oracle gave up under `limit`; retry only with a looser limit.
    Failed { limit: i32 },
    Scored(ScoredLocation),
}

/// A locus on the more-hits side that may pair with nearby fewer-side loci.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoringMateCandidate {
    pub locus: u64,
    pub best_possible_score: i32,
    pub seed_offset: u64,
    pub score: MateScore,
}

/// A locus on the fewer-hits side, queued for scoring.
#[derive(Debug, Clone)]
pub(crate) struct ScoringCandidate {
    pub locus: u64,
    pub set_pair: usize,
    /// Index of the lowest-locus mate candidate recorded when this
    /// candidate was created; the scorer walks from here toward index 0.
    pub highest_mate: usize,
    pub seed_offset: u64,
    pub best_possible_score: i32,
    pub next_in_list: Option<u32>,
    pub cluster: i32,
    pub fewer_end: Option<ScoredLocation>,
    pub merge_anchor: Option<u32>,
}

/// Representative of all scored pairs in one genomic neighborhood, so a pair
/// straddled by several seeds is reported once.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergeAnchor {
    pub more_locus: u64,
    pub fewer_locus: u64,
    pub pair_score: i32,
    pub probability: f64,
    pub cluster: i32,
    pub candidate: u32,
    pub mate: u32,
}

impl MergeAnchor {
    fn range_matches(&self, more_locus: u64, fewer_locus: u64) -> bool {
        locations_within(self.more_locus, more_locus, CANDIDATE_MERGE_WINDOW)
            && locations_within(self.fewer_locus, fewer_locus, CANDIDATE_MERGE_WINDOW)
    }

    /// Offer a new scored pair to this anchor.  Returns true when the new
    /// pair was installed (either it landed outside the anchor's range, or
    /// it beat the incumbent); false when it should be ignored.
    ///
    /// Tie-break order: clustered beats unclustered, then lower pair score,
    /// then higher match probability; the incumbent wins exact ties.
    pub fn offer(
        &mut self,
        more_locus: u64,
        fewer_locus: u64,
        probability: f64,
        pair_score: i32,
        cluster: i32,
        candidate: u32,
        mate: u32,
    ) -> bool {
        let install = if !self.range_matches(more_locus, fewer_locus) {
            true
        } else {
            let gains_cluster = self.cluster == UNCLUSTERED && cluster != UNCLUSTERED;
            let loses_cluster = self.cluster != UNCLUSTERED && cluster == UNCLUSTERED;
            gains_cluster
                || (!loses_cluster
                    && (pair_score < self.pair_score
                        || (pair_score == self.pair_score && probability > self.probability)))
        };
        if install {
            self.more_locus = more_locus;
            self.fewer_locus = fewer_locus;
            self.probability = probability;
            self.pair_score = pair_score;
            self.cluster = cluster;
            self.candidate = candidate;
            self.mate = mate;
        } else {
            log::trace!(
                "merge: dropping pair at ({more_locus}, {fewer_locus}) against anchor ({}, {})",
                self.more_locus,
                self.fewer_locus
            );
        }
        install
    }
}

/// All per-pair candidate storage, reset between pairs.
pub(crate) struct CandidatePools {
    pub candidates: Vec<ScoringCandidate>,
    pub mates: [Vec<ScoringMateCandidate>; NUM_SET_PAIRS],
    pub anchors: Vec<MergeAnchor>,
    /// Head indices into `candidates`, one list per best-possible score.
    pub score_lists: Vec<Option<u32>>,
    pub max_used_list: usize,
    candidate_cap: usize,
    mate_cap: usize,
    anchor_cap: usize,
}

impl CandidatePools {
    pub fn new(pool_size: usize, score_list_len: usize) -> CandidatePools {
        CandidatePools {
            candidates: Vec::new(),
            mates: [Vec::new(), Vec::new()],
            anchors: Vec::new(),
            score_lists: vec![None; score_list_len],
            max_used_list: 0,
            candidate_cap: pool_size,
            mate_cap: (pool_size / 2).max(1),
            anchor_cap: pool_size,
        }
    }

    pub fn reset(&mut self) {
        self.candidates.clear();
        self.mates[0].clear();
        self.mates[1].clear();
        self.anchors.clear();
        self.score_lists.iter_mut().for_each(|head| *head = None);
        self.max_used_list = 0;
    }

    pub fn push_mate(&mut self, set_pair: usize, mate: ScoringMateCandidate) {
        if self.mates[set_pair].len() >= self.mate_cap {
            utils::err_fatal(
                "PairAligner",
                "ran out of mate candidate pool entries; rerun with a larger max_candidate_pool_size",
            );
        }
        self.mates[set_pair].push(mate);
    }

    /// Insert a candidate at the head of `score_lists[list]`.
    pub fn push_candidate(&mut self, mut candidate: ScoringCandidate, list: usize) {
        if self.candidates.len() >= self.candidate_cap {
            utils::err_fatal(
                "PairAligner",
                "ran out of scoring candidate pool entries; rerun with a larger max_candidate_pool_size",
            );
        }
        let idx = self.candidates.len() as u32;
        candidate.next_in_list = self.score_lists[list];
        self.candidates.push(candidate);
        self.score_lists[list] = Some(idx);
        self.max_used_list = self.max_used_list.max(list);
    }

    pub fn alloc_anchor(&mut self, anchor: MergeAnchor) -> u32 {
        if self.anchors.len() >= self.anchor_cap {
            utils::err_fatal(
                "PairAligner",
                "ran out of merge anchor pool entries; rerun with a larger max_candidate_pool_size",
            );
        }
        let idx = self.anchors.len() as u32;
        self.anchors.push(anchor);
        idx
    }
}
