//! Intersection-based paired-end aligner with linked-read cluster scoring.
//!
//! One `PairAligner` handles one pair at a time through four phases:
//! seed sampling, coordinated descent over the hit streams, candidate
//! scoring with merge/cluster handling, and finalization.  `align()` drives
//! all four; the phases are also public so a per-cluster driver can
//! interleave descent targets, counter updates, and a revise scoring pass
//! across many pairs.

mod candidates;
mod descent;
mod finalize;
mod hit_set;
mod opt;
mod scoring;
mod seeding;

pub use opt::{AlignerOpt, OptError};
pub use scoring::ResultCounts;

use crate::adjust::AlignmentAdjuster;
use crate::cluster::{ClusterCounter, ClusterToggle};
use crate::genome::{Direction, GenomeView, NUM_DIRECTIONS};
use crate::index::SeedIndex;
use crate::read::Read;
use crate::result::{AlignOutcome, PairedAlignmentResult};
use crate::scoring::ScoringOracle;
use crate::utils;
use candidates::CandidatePools;
use descent::DescentState;
use finalize::ContigHitCount;
use hit_set::HitSet;
use seeding::PreparedRead;
use std::sync::Arc;

/// Strand a read takes in one orientation combination: set pair 0 is
/// {read 0 forward, read 1 RC}, set pair 1 the opposite.
#[inline]
pub(crate) fn set_pair_direction(set_pair: usize, which_read: usize) -> Direction {
    if (set_pair == 0) == (which_read == 0) {
        Direction::Forward
    } else {
        Direction::ReverseComplement
    }
}

pub struct PairAligner<'g, G: GenomeView, I: SeedIndex, O: ScoringOracle> {
    pub(crate) opt: AlignerOpt,
    pub(crate) genome: &'g G,
    pub(crate) index: &'g I,
    pub(crate) oracle: O,
    pub(crate) adjuster: Box<dyn AlignmentAdjuster>,
    /// Shared across instances; see `ClusterCounter`.
    pub(crate) clusters: Arc<ClusterCounter>,
    pub(crate) toggle: ClusterToggle,
    pub(crate) seed_len: usize,
    pub(crate) wrapped_offsets: Vec<usize>,

    // Per-pair state, reset by prepare_pair.
    pub(crate) seed_used: Vec<bool>,
    pub(crate) prepared: [PreparedRead; 2],
    pub(crate) hit_sets: [[HitSet; NUM_DIRECTIONS]; 2],
    pub(crate) fewer_read: usize,
    pub(crate) more_read: usize,
    pub(crate) pools: CandidatePools,
    pub(crate) descent: DescentState,
    pub(crate) hits_per_contig: Vec<ContigHitCount>,
    pub(crate) contig_epoch: u64,

    pub(crate) n_locations_scored: u64,
}

impl<'g, G: GenomeView, I: SeedIndex, O: ScoringOracle> PairAligner<'g, G, I, O> {
    /// Build an aligner instance.  `clusters` must cover every cluster
    /// identifier the caller will pass to `descend_to_target`; pass an
    /// empty counter when running without linked-read clustering.
    pub fn new(
        opt: AlignerOpt,
        genome: &'g G,
        index: &'g I,
        oracle: O,
        adjuster: Box<dyn AlignmentAdjuster>,
        clusters: Arc<ClusterCounter>,
    ) -> Result<PairAligner<'g, G, I, O>, OptError> {
        opt.validate()?;
        let seed_len = index.seed_len();
        let max_seeds = opt.seed_budget(opt.max_read_len, seed_len);
        let pool_size = opt
            .max_candidate_pool_size
            .min(opt.max_big_hits.saturating_mul(max_seeds).saturating_mul(2))
            .max(1);
        let contig_slots = if opt.max_secondary_per_contig > 0 {
            genome.contig_count()
        } else {
            0
        };

        Ok(PairAligner {
            pools: CandidatePools::new(pool_size, opt.score_list_len()),
            toggle: ClusterToggle::new(clusters.len()),
            seed_used: vec![false; opt.max_read_len],
            wrapped_offsets: seeding::wrapped_seed_offsets(seed_len),
            prepared: [PreparedRead::new(), PreparedRead::new()],
            hit_sets: [
                [HitSet::new(opt.max_hits), HitSet::new(opt.max_hits)],
                [HitSet::new(opt.max_hits), HitSet::new(opt.max_hits)],
            ],
            descent: DescentState::new(),
            hits_per_contig: vec![ContigHitCount::default(); contig_slots],
            contig_epoch: 0,
            fewer_read: 0,
            more_read: 1,
            n_locations_scored: 0,
            seed_len,
            opt,
            genome,
            index,
            oracle,
            adjuster,
            clusters,
        })
    }

    /// Number of oracle calls made over this instance's lifetime.
    pub fn n_locations_scored(&self) -> u64 {
        self.n_locations_scored
    }

    /// Per-read counts of seeds skipped as popular during the last pair.
    pub fn popular_seeds_skipped(&self) -> [u32; 2] {
        [
            self.prepared[0].popular_seeds_skipped,
            self.prepared[1].popular_seeds_skipped,
        ]
    }

    pub fn opt(&self) -> &AlignerOpt {
        &self.opt
    }

    /// Phase 1: reset per-pair state, build working copies, sample seeds,
    /// and decide which read drives the descent.  Returns false when the
    /// pair cannot align at all (a read shorter than the seed, or too many
    /// Ns); the caller should report both reads NotFound.
    pub fn prepare_pair(&mut self, read0: &Read, read1: &Read) -> bool {
        self.pools.reset();
        self.toggle.reset();
        for which in 0..2 {
            for dir in 0..NUM_DIRECTIONS {
                self.hit_sets[which][dir].reset();
            }
        }
        self.descent = DescentState::new();

        for read in [read0, read1] {
            if read.len() > self.opt.max_read_len {
                utils::err_fatal(
                    "PairAligner",
                    &format!(
                        "read '{}' is longer than the configured maximum ({} > {}); raise max_read_len",
                        read.id(),
                        read.len(),
                        self.opt.max_read_len
                    ),
                );
            }
        }

        if read0.len() < self.seed_len || read1.len() < self.seed_len {
            log::debug!(
                "pair '{}' too short to seed ({} / {} vs seed length {})",
                read0.id(),
                read0.len(),
                read1.len(),
                self.seed_len
            );
            return false;
        }

        let mut count_of_ns = 0;
        count_of_ns += self.prepared[0].prepare(read0);
        count_of_ns += self.prepared[1].prepare(read1);
        if count_of_ns > self.opt.max_k as usize {
            log::debug!(
                "pair '{}' rejected before seeding: {} Ns exceeds max_k {}",
                read0.id(),
                count_of_ns,
                self.opt.max_k
            );
            return false;
        }

        let max_seeds = self
            .opt
            .seed_budget(read0.len().max(read1.len()), self.seed_len);
        for which in 0..2 {
            seeding::sample_read(
                self.index,
                &self.opt,
                self.seed_len,
                &self.wrapped_offsets,
                max_seeds,
                &mut self.seed_used,
                &mut self.prepared[which],
                &mut self.hit_sets[which],
            );
        }

        let hits0 = self.prepared[0].total_hits[0] + self.prepared[0].total_hits[1];
        let hits1 = self.prepared[1].total_hits[0] + self.prepared[1].total_hits[1];
        self.more_read = if hits0 > hits1 { 0 } else { 1 };
        self.fewer_read = 1 - self.more_read;
        log::debug!(
            "pair '{}': read 0 has {hits0} hits, read 1 has {hits1} hits",
            read0.id()
        );
        true
    }

    /// Run all four phases for one pair.  Secondary results land in
    /// `secondaries` (cleared first); the best pair is returned separately
    /// and never appears among the secondaries.
    pub fn align(
        &mut self,
        read0: &Read,
        read1: &Read,
        max_edit_distance_for_secondary: i32,
        secondary_buffer_limit: usize,
        max_secondary_to_return: usize,
        secondaries: &mut Vec<PairedAlignmentResult>,
    ) -> AlignOutcome {
        secondaries.clear();
        if !self.prepare_pair(read0, read1) {
            return AlignOutcome::Aligned {
                best: PairedAlignmentResult::unmapped(),
            };
        }

        self.enumerate_candidates();

        let min_cluster_size = self.opt.min_cluster_size;
        let mut best_compensated = self.opt.score_ceiling();
        self.score_candidates(&mut best_compensated, false);
        self.increment_clusters(best_compensated);
        self.correct_best_score(&mut best_compensated, min_cluster_size);

        let counts = self.count_results(
            max_edit_distance_for_secondary,
            best_compensated,
            min_cluster_size,
        );
        if counts.n_secondary > secondary_buffer_limit {
            return AlignOutcome::SecondaryBufferTooSmall {
                required: counts.n_secondary,
            };
        }

        let mut best = self.generate_results(
            min_cluster_size,
            max_edit_distance_for_secondary,
            &mut best_compensated,
            secondaries,
        );
        self.finalize(
            max_edit_distance_for_secondary,
            max_secondary_to_return,
            counts.probability_of_all_pairs,
            &mut best_compensated,
            &mut best,
            secondaries,
        );

        AlignOutcome::Aligned { best }
    }
}
