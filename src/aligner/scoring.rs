//! Phase 3: score candidates in best-possible order, merge near-duplicates,
//! and settle the cluster compensation.
//!
//! Candidates come off the score lists cheapest-lower-bound first, so the
//! first real scores tighten the limit (Ukkonen pruning) and later lists are
//! often never opened.  Every scored pair is funneled through a merge anchor
//! so one genomic pair straddled by several seeds is counted once.  Cluster
//! handling runs in three steps after scoring: increment the shared
//! membership counts, re-derive the best compensated score under the final
//! clustered/unclustered decision, then count and emit results.

use super::candidates::{MateScore, MergeAnchor, ScoredLocation, ScoringCandidate};
use super::seeding::PreparedRead;
use super::set_pair_direction;
use super::PairAligner;
use crate::cluster::UNCLUSTERED;
use crate::defaults::{CANDIDATE_MERGE_WINDOW, SNP_PROB};
use crate::genome::{Direction, GenomeView};
use crate::index::SeedIndex;
use crate::result::{AlignmentStatus, PairedAlignmentResult};
use crate::scoring::ScoringOracle;
use crate::utils::locations_within;

/// Outcome of the counting pass over merge anchors.
#[derive(Debug, Clone, Copy)]
pub struct ResultCounts {
    /// Anchors within `best + max_edit_distance_for_secondary`.
    pub n_secondary: usize,
    /// Compensated-probability mass of anchors within the MAPQ cutoff.
    pub probability_of_all_pairs: f64,
}

/// Score one candidate locus by splitting the read at the seed: tail
/// left-to-right, head right-to-left (which also yields the start-offset
/// correction), seed contributing (1 - SNP_PROB)^seed_len.
#[allow(clippy::too_many_arguments)]
fn score_location<G: GenomeView, O: ScoringOracle>(
    genome: &G,
    oracle: &mut O,
    prepared: &[PreparedRead; 2],
    seed_len: usize,
    slack: u64,
    which_read: usize,
    direction: Direction,
    locus: u64,
    seed_offset: u64,
    limit: i32,
    n_locations_scored: &mut u64,
) -> Option<ScoredLocation> {
    if limit < 0 {
        return None;
    }
    *n_locations_scored += 1;

    let read = &prepared[which_read];
    let dir = direction.index();
    let data = &read.data[dir];
    let quality = &read.quality[dir];
    let read_len = read.len;
    let seed_offset = seed_offset as usize;

    // Fetch lookback bases before the locus so head deletions can shift the
    // start left, and slack after the read for tail deletions.
    let fetch_start = locus.saturating_sub(slack);
    let lead = (locus - fetch_start) as usize;
    let text = genome.substring(fetch_start, lead + read_len + slack as usize)?;
    if text.len() < lead + read_len {
        return None;
    }

    let tail_start = seed_offset + seed_len;
    debug_assert_eq!(
        &text[lead + seed_offset..lead + tail_start],
        &data[seed_offset..tail_start],
        "candidate locus does not contain the seed that produced it"
    );

    let tail = oracle.score_forward(
        &text[lead + tail_start..],
        &data[tail_start..],
        &quality[tail_start..],
        limit,
    )?;

    // The head is scored right-to-left over the byte-reversed prefix; its
    // reversed quality view is the opposite direction's quality suffix.
    let pattern_rev = &read.reversed[dir][read_len - seed_offset..];
    let quality_rev = &read.quality[direction.opposite().index()][read_len - seed_offset..];
    let (head, genome_offset) = oracle.score_reverse(
        &text[..lead + seed_offset],
        pattern_rev,
        quality_rev,
        limit - tail.score,
    )?;

    Some(ScoredLocation {
        score: tail.score + head.score,
        probability: tail.probability
            * head.probability
            * (1.0 - SNP_PROB).powi(seed_len as i32),
        offset: genome_offset,
    })
}

/// Walk pool neighbors of `cand_idx` (same set pair, within the merge
/// window of the adjusted locus) and adopt the first anchor found.
fn adopt_neighbor_anchor(
    candidates: &[ScoringCandidate],
    cand_idx: usize,
    set_pair: usize,
    fewer_adjusted: u64,
) -> Option<u32> {
    let in_window = |c: &ScoringCandidate| {
        c.set_pair != set_pair
            || locations_within(c.locus, fewer_adjusted, CANDIDATE_MERGE_WINDOW)
    };
    for i in (0..cand_idx).rev() {
        let neighbor = &candidates[i];
        if !in_window(neighbor) {
            break;
        }
        if neighbor.set_pair == set_pair && neighbor.merge_anchor.is_some() {
            return neighbor.merge_anchor;
        }
    }
    for neighbor in &candidates[cand_idx + 1..] {
        if !in_window(neighbor) {
            break;
        }
        if neighbor.set_pair == set_pair && neighbor.merge_anchor.is_some() {
            return neighbor.merge_anchor;
        }
    }
    None
}

impl<G: GenomeView, I: SeedIndex, O: ScoringOracle> PairAligner<'_, G, I, O> {
    /// Score queued candidates in best-possible order, updating
    /// `best_compensated` and (unless Ukkonen pruning is off) tightening the
    /// score limit as better pairs appear.  In revise mode the limit is
    /// pinned to the caller's already-final best score and the best is left
    /// untouched.
    pub fn score_candidates(&mut self, best_compensated: &mut i32, revise: bool) {
        let comp = self.opt.cluster_ed_compensation;
        let extra = self.opt.extra_search_depth;
        let max_spacing = self.opt.max_spacing;
        let min_spacing = self.opt.min_spacing;
        let slack = self.opt.score_ceiling() as u64;

        let mut score_limit = if revise {
            *best_compensated + extra + comp
        } else {
            self.opt.max_k + extra + comp
        };

        let mut list = 0usize;
        while list <= self.pools.max_used_list && (list as i32) <= score_limit {
            let Some(head) = self.pools.score_lists[list] else {
                list += 1;
                continue;
            };
            let cand_idx = head as usize;
            self.pools.score_lists[list] = self.pools.candidates[cand_idx].next_in_list;

            let (c_locus, c_sp, c_seed_offset, c_cluster, c_highest_mate) = {
                let c = &self.pools.candidates[cand_idx];
                (c.locus, c.set_pair, c.seed_offset, c.cluster, c.highest_mate)
            };
            // The global limit carries the cluster compensation; astray
            // candidates must not spend it on raw edit distance.
            let astray_penalty = if c_cluster == UNCLUSTERED { comp } else { 0 };
            let compensated_limit = score_limit - astray_penalty;

            let fewer = score_location(
                self.genome,
                &mut self.oracle,
                &self.prepared,
                self.seed_len,
                slack,
                self.fewer_read,
                set_pair_direction(c_sp, self.fewer_read),
                c_locus,
                c_seed_offset,
                compensated_limit,
                &mut self.n_locations_scored,
            );
            self.pools.candidates[cand_idx].fewer_end = fewer;
            let Some(fewer) = fewer else {
                continue;
            };
            debug_assert!(fewer.score >= self.pools.candidates[cand_idx].best_possible_score);
            log::trace!(
                "scored fewer end {cand_idx} at {c_locus}: score {}, limit {compensated_limit}",
                fewer.score
            );

            let more_dir = set_pair_direction(c_sp, self.more_read);
            let mut mate_idx = c_highest_mate;
            loop {
                let mate = self.pools.mates[c_sp][mate_idx];
                debug_assert!(locations_within(mate.locus, c_locus, max_spacing));

                if !locations_within(mate.locus, c_locus, min_spacing)
                    && mate.best_possible_score <= score_limit - fewer.score
                {
                    let mate_limit = compensated_limit - fewer.score;
                    let needs_scoring = match mate.score {
                        MateScore::Unscored => true,
                        MateScore::Failed { limit } => limit < mate_limit,
                        MateScore::Scored(_) => false,
                    };
                    if needs_scoring {
                        let scored = score_location(
                            self.genome,
                            &mut self.oracle,
                            &self.prepared,
                            self.seed_len,
                            slack,
                            self.more_read,
                            more_dir,
                            mate.locus,
                            mate.seed_offset,
                            mate_limit,
                            &mut self.n_locations_scored,
                        );
                        self.pools.mates[c_sp][mate_idx].score = match scored {
                            Some(s) => MateScore::Scored(s),
                            None => MateScore::Failed { limit: mate_limit },
                        };
                    }

                    if let MateScore::Scored(mate_end) = self.pools.mates[c_sp][mate_idx].score {
                        let pair_score = fewer.score + mate_end.score;
                        let pair_probability = fewer.probability * mate_end.probability;
                        let more_adjusted = mate.locus.saturating_add_signed(mate_end.offset);
                        let fewer_adjusted = c_locus.saturating_add_signed(fewer.offset);

                        let mut anchor_idx = self.pools.candidates[cand_idx].merge_anchor;
                        if anchor_idx.is_none() {
                            anchor_idx = adopt_neighbor_anchor(
                                &self.pools.candidates,
                                cand_idx,
                                c_sp,
                                fewer_adjusted,
                            );
                            self.pools.candidates[cand_idx].merge_anchor = anchor_idx;
                        }

                        let accepted = match anchor_idx {
                            None => {
                                let idx = self.pools.alloc_anchor(MergeAnchor {
                                    more_locus: more_adjusted,
                                    fewer_locus: fewer_adjusted,
                                    pair_score,
                                    probability: pair_probability,
                                    cluster: c_cluster,
                                    candidate: cand_idx as u32,
                                    mate: mate_idx as u32,
                                });
                                self.pools.candidates[cand_idx].merge_anchor = Some(idx);
                                true
                            }
                            Some(a) => self.pools.anchors[a as usize].offer(
                                more_adjusted,
                                fewer_adjusted,
                                pair_probability,
                                pair_score,
                                c_cluster,
                                cand_idx as u32,
                                mate_idx as u32,
                            ),
                        };

                        let compensated_pair_score = pair_score + astray_penalty;
                        if !revise
                            && accepted
                            && compensated_pair_score <= self.opt.max_k + comp
                            && compensated_pair_score < *best_compensated
                        {
                            *best_compensated = compensated_pair_score;
                            if !self.opt.no_ukkonen {
                                score_limit = *best_compensated + extra;
                            }
                            log::trace!(
                                "new best compensated score {compensated_pair_score} at ({fewer_adjusted}, {more_adjusted}), limit now {score_limit}"
                            );
                        }
                    }
                }

                if mate_idx == 0
                    || !locations_within(
                        self.pools.mates[c_sp][mate_idx - 1].locus,
                        c_locus,
                        max_spacing,
                    )
                {
                    break;
                }
                mate_idx -= 1;
            }
        }
    }

    /// Bump the shared membership count of every cluster that produced at
    /// least one good-enough anchor for this pair.  The per-pair toggle
    /// keeps a pair that touches a cluster through several anchors from
    /// counting more than once.
    pub fn increment_clusters(&mut self, best_compensated: i32) {
        let cutoff = best_compensated + self.opt.extra_search_depth;
        for anchor in &self.pools.anchors {
            // Clustered anchors carry no astray penalty, so the cutoff is
            // against the raw pair score.
            if anchor.cluster == UNCLUSTERED || anchor.pair_score > cutoff {
                continue;
            }
            let cluster = anchor.cluster as usize;
            if !self.toggle.is_set(cluster) {
                self.clusters.saturating_increment(cluster);
                self.toggle.set(cluster);
            }
        }
    }

    /// Re-derive the best compensated score with the cluster decision
    /// frozen: clusters at or above `min_cluster_size` shed the astray
    /// penalty, all others keep it.  Returns whether the best changed.
    pub fn correct_best_score(&mut self, best_compensated: &mut i32, min_cluster_size: u8) -> bool {
        let comp = self.opt.cluster_ed_compensation;
        let mut new_best = self.opt.score_ceiling();
        for anchor in &self.pools.anchors {
            let clustered = anchor.cluster != UNCLUSTERED
                && self.clusters.count(anchor.cluster as usize) >= min_cluster_size;
            let astray_penalty = if clustered { 0 } else { comp };
            new_best = new_best.min(anchor.pair_score + astray_penalty);
        }
        if *best_compensated != new_best {
            log::debug!(
                "best compensated score corrected {} -> {}",
                best_compensated,
                new_best
            );
            *best_compensated = new_best;
            true
        } else {
            false
        }
    }

    /// Count qualifying anchors and sum the compensated probability mass,
    /// without emitting anything.  The caller compares `n_secondary`
    /// against its buffer before running the generate pass.
    pub fn count_results(
        &self,
        max_edit_distance_for_secondary: i32,
        best_compensated: i32,
        min_cluster_size: u8,
    ) -> ResultCounts {
        let comp = self.opt.cluster_ed_compensation;
        let mapq_cutoff = best_compensated + self.opt.extra_search_depth;
        let result_cutoff = best_compensated + max_edit_distance_for_secondary;

        let mut counts = ResultCounts {
            n_secondary: 0,
            probability_of_all_pairs: 0.0,
        };
        for anchor in &self.pools.anchors {
            let clustered = anchor.cluster != UNCLUSTERED
                && self.clusters.count(anchor.cluster as usize) >= min_cluster_size;
            let (astray_penalty, probability_penalty) = if clustered {
                (0, 1.0)
            } else {
                (comp, self.opt.unclustered_penalty)
            };
            let compensated_score = anchor.pair_score + astray_penalty;
            if compensated_score <= mapq_cutoff {
                counts.probability_of_all_pairs += anchor.probability * probability_penalty;
            }
            if compensated_score <= result_cutoff {
                counts.n_secondary += 1;
            }
        }
        counts
    }

    /// Emit every qualifying anchor into `secondaries`, pull the best one
    /// out (lowest compensated score, highest probability among ties), and
    /// return it.  Returns an unmapped result when nothing qualifies.
    pub fn generate_results(
        &self,
        min_cluster_size: u8,
        max_edit_distance_for_secondary: i32,
        best_compensated: &mut i32,
        secondaries: &mut Vec<PairedAlignmentResult>,
    ) -> PairedAlignmentResult {
        let comp = self.opt.cluster_ed_compensation;
        let result_cutoff = *best_compensated + max_edit_distance_for_secondary;

        secondaries.clear();
        let mut best_index: Option<usize> = None;
        let mut best_score = *best_compensated;
        let mut best_probability = 0.0f64;

        for anchor in &self.pools.anchors {
            let clustered = anchor.cluster != UNCLUSTERED
                && self.clusters.count(anchor.cluster as usize) >= min_cluster_size;
            let (effective_cluster, astray_penalty, probability_penalty) = if clustered {
                (anchor.cluster, 0, 1.0)
            } else {
                (UNCLUSTERED, comp, self.opt.unclustered_penalty)
            };
            let compensated_score = anchor.pair_score + astray_penalty;
            if compensated_score > result_cutoff {
                continue;
            }
            let probability = anchor.probability * probability_penalty;

            let candidate = &self.pools.candidates[anchor.candidate as usize];
            let mate = &self.pools.mates[candidate.set_pair][anchor.mate as usize];
            let (MateScore::Scored(mate_end), Some(fewer_end)) = (mate.score, candidate.fewer_end)
            else {
                debug_assert!(false, "anchor references an unscored candidate");
                continue;
            };

            let mut result = PairedAlignmentResult::unmapped();
            result.aligned_as_pair = true;
            result.from_align_together = true;
            result.compensated_score = compensated_score;
            result.probability = probability;
            result.cluster = effective_cluster;
            result.direction[self.more_read] =
                set_pair_direction(candidate.set_pair, self.more_read);
            result.direction[self.fewer_read] =
                set_pair_direction(candidate.set_pair, self.fewer_read);
            result.location[self.more_read] = anchor.more_locus;
            result.location[self.fewer_read] = anchor.fewer_locus;
            result.score[self.more_read] = mate_end.score;
            result.score[self.fewer_read] = fewer_end.score;
            result.score_prior_to_clipping = result.score;
            result.status = [AlignmentStatus::MultipleHits; 2];
            secondaries.push(result);

            if compensated_score <= best_score && probability >= best_probability {
                best_score = compensated_score;
                best_probability = probability;
                best_index = Some(secondaries.len() - 1);
            }
        }

        match best_index {
            Some(i) => {
                *best_compensated = best_score;
                secondaries.swap_remove(i)
            }
            None => {
                log::debug!("no sufficiently good pairs found");
                PairedAlignmentResult::unmapped()
            }
        }
    }
}
