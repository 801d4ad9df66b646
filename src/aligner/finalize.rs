//! Phase 4: MAPQ, alignment adjustment, and secondary-result pruning.

use super::PairAligner;
use crate::cluster::UNCLUSTERED;
use crate::genome::{Direction, GenomeView};
use crate::index::SeedIndex;
use crate::mapq;
use crate::result::{AlignmentStatus, PairedAlignmentResult};
use crate::scoring::ScoringOracle;
use crate::utils;

/// Epoch-stamped per-contig hit count, so the per-pair reset is O(1).
#[derive(Clone, Copy, Default)]
pub(crate) struct ContigHitCount {
    hits: u32,
    epoch: u64,
}

impl<G: GenomeView, I: SeedIndex, O: ScoringOracle> PairAligner<'_, G, I, O> {
    /// Finish the pair: compute MAPQ and statuses for the best result, run
    /// the alignment adjuster, re-derive compensated scores, drop
    /// secondaries that fell out of range, enforce the per-contig cap, and
    /// truncate to the caller's return limit.
    pub fn finalize(
        &mut self,
        max_edit_distance_for_secondary: i32,
        max_secondary_to_return: usize,
        probability_of_all_pairs: f64,
        best_compensated: &mut i32,
        best: &mut PairedAlignmentResult,
        secondaries: &mut Vec<PairedAlignmentResult>,
    ) {
        let comp = self.opt.cluster_ed_compensation;
        let popular_skipped = self.prepared[0].popular_seeds_skipped
            + self.prepared[1].popular_seeds_skipped;

        if !best.is_unmapped() {
            for which in 0..2 {
                best.mapq[which] = mapq::compute_mapq(
                    probability_of_all_pairs,
                    best.probability,
                    best.score[which],
                    popular_skipped,
                );
                best.status[which] = if best.mapq[which] > self.opt.print_stats_mapq_limit {
                    AlignmentStatus::SingleHit
                } else {
                    AlignmentStatus::MultipleHits
                };
                best.clipping_adjustment[which] = 0;
            }
            log::debug!(
                "best pair {} {:?} / {} {:?}, mapq {}/{}, P(all) {:e}, P(best) {:e}",
                best.location[0],
                best.direction[0],
                best.location[1],
                best.direction[1],
                best.mapq[0],
                best.mapq[1],
                probability_of_all_pairs,
                best.probability
            );
        }
        best.score_prior_to_clipping = best.score;

        if !self.opt.ignore_alignment_adjustments {
            let fwd = Direction::Forward.index();
            let (read0, read1) = (&self.prepared[0].data[fwd], &self.prepared[1].data[fwd]);

            self.adjuster.adjust(read0, read1, best);
            if !best.is_unmapped() {
                let astray_penalty = if best.cluster == UNCLUSTERED { comp } else { 0 };
                best.compensated_score = best.score[0] + best.score[1] + astray_penalty;
                *best_compensated = best.compensated_score;
            }

            for secondary in secondaries.iter_mut() {
                secondary.score_prior_to_clipping = secondary.score;
                self.adjuster.adjust(read0, read1, secondary);
                if !secondary.is_unmapped() {
                    let astray_penalty =
                        if secondary.cluster == UNCLUSTERED { comp } else { 0 };
                    secondary.compensated_score =
                        secondary.score[0] + secondary.score[1] + astray_penalty;
                    *best_compensated = (*best_compensated).min(secondary.compensated_score);
                }
            }
        } else {
            for secondary in secondaries.iter_mut() {
                secondary.score_prior_to_clipping = secondary.score;
            }
        }

        // Adjustment may have revealed that a secondary is now too far from
        // the best, or discarded one of its ends entirely.
        let mut i = 0;
        while i < secondaries.len() {
            let drop = secondaries[i].compensated_score
                > *best_compensated + max_edit_distance_for_secondary
                || secondaries[i].is_unmapped();
            if drop {
                secondaries.swap_remove(i);
            } else {
                i += 1;
            }
        }

        if self.opt.max_secondary_per_contig > 0
            && best.status[0] != AlignmentStatus::NotFound
        {
            self.enforce_contig_cap(best, secondaries);
        }

        if secondaries.len() > max_secondary_to_return {
            secondaries.sort_by(|a, b| {
                a.compensated_score
                    .cmp(&b.compensated_score)
                    .then_with(|| b.probability.total_cmp(&a.probability))
                    .then_with(|| {
                        utils::hash_64(a.location[0]).cmp(&utils::hash_64(b.location[0]))
                    })
            });
            secondaries.truncate(max_secondary_to_return);
        }
    }

    /// Cap how many results any single contig may contribute.  Counting
    /// uses the epoch array; only if some contig busts the cap do we pay
    /// for the sort-and-sweep.  The primary result pre-counts as one hit
    /// on its contig.
    fn enforce_contig_cap(
        &mut self,
        best: &PairedAlignmentResult,
        secondaries: &mut Vec<PairedAlignmentResult>,
    ) {
        let genome = self.genome;
        let cap = self.opt.max_secondary_per_contig as u32;

        self.contig_epoch += 1;
        let epoch = self.contig_epoch;

        let primary_contig = genome.contig_at(best.location[0]);
        self.hits_per_contig[primary_contig] = ContigHitCount { hits: 1, epoch };

        let mut any_contig_over_cap = false;
        for secondary in secondaries.iter() {
            // Both ends are within the spacing window, so either end's
            // contig will do.
            let contig = genome.contig_at(secondary.location[0]);
            let slot = &mut self.hits_per_contig[contig];
            if slot.epoch != epoch {
                *slot = ContigHitCount { hits: 0, epoch };
            }
            slot.hits += 1;
            if slot.hits > cap {
                any_contig_over_cap = true;
                break;
            }
        }
        if !any_contig_over_cap {
            return;
        }

        secondaries.sort_by(|a, b| {
            genome
                .contig_at(a.location[0])
                .cmp(&genome.contig_at(b.location[0]))
                .then_with(|| a.compensated_score.cmp(&b.compensated_score))
        });

        let mut current_contig = None;
        let mut current_count = 0u32;
        secondaries.retain(|secondary| {
            let contig = genome.contig_at(secondary.location[0]);
            if current_contig != Some(contig) {
                current_contig = Some(contig);
                current_count = if contig == primary_contig { 1 } else { 0 };
            }
            current_count += 1;
            current_count <= cap
        });
    }
}
