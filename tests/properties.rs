//! Invariants, symmetry laws, and boundary behaviors of the pair engine.

mod common;

use common::{
    init_logging, rc_read_from, read_from, read_of, MismatchOracle, TestGenome, TestIndex,
};
use linked_align::{
    AlignOutcome, AlignerOpt, ClusterCounter, NoAdjustment, PairAligner, PairedAlignmentResult,
};
use std::sync::Arc;

const SEED_LEN: usize = 8;
const MAX_K: i32 = 5;
const EXTRA_SEARCH_DEPTH: i32 = 2;
const MIN_SPACING: u64 = 50;
const MAX_SPACING: u64 = 1000;

fn opt() -> AlignerOpt {
    AlignerOpt {
        max_k: MAX_K,
        extra_search_depth: EXTRA_SEARCH_DEPTH,
        min_spacing: MIN_SPACING,
        max_spacing: MAX_SPACING,
        max_big_hits: 32,
        num_seeds_from_command_line: 4,
        cluster_ed_compensation: 3,
        unclustered_penalty: 0.5,
        min_cluster_size: 1,
        ..AlignerOpt::default()
    }
}

fn aligner_with<'g>(
    opt: AlignerOpt,
    genome: &'g TestGenome,
    index: &'g TestIndex,
) -> PairAligner<'g, TestGenome, TestIndex, MismatchOracle> {
    PairAligner::new(
        opt,
        genome,
        index,
        MismatchOracle,
        Box::new(NoAdjustment),
        Arc::new(ClusterCounter::new(0)),
    )
    .expect("valid options")
}

fn align_once(
    genome: &TestGenome,
    index: &TestIndex,
    read0: &linked_align::Read,
    read1: &linked_align::Read,
) -> (PairedAlignmentResult, Vec<PairedAlignmentResult>) {
    let mut aligner = aligner_with(opt(), genome, index);
    let mut secondaries = Vec::new();
    match aligner.align(read0, read1, 2, 64, 64, &mut secondaries) {
        AlignOutcome::Aligned { best } => (best, secondaries),
        AlignOutcome::SecondaryBufferTooSmall { required } => {
            panic!("buffer of 64 too small, needed {required}")
        }
    }
}

#[test]
fn mate_at_exactly_max_spacing_is_accepted() {
    init_logging();
    let genome = TestGenome::random(10_000, 31);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "max/1");
    let read1 = rc_read_from(&genome, 100 + MAX_SPACING as usize, 100, "max/2");

    let (best, _) = align_once(&genome, &index, &read0, &read1);
    assert!(!best.is_unmapped());
    assert_eq!(best.location, [100, 100 + MAX_SPACING]);
}

#[test]
fn mate_just_past_max_spacing_is_rejected() {
    init_logging();
    let genome = TestGenome::random(10_000, 31);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "far/1");
    let read1 = rc_read_from(&genome, 100 + MAX_SPACING as usize + 1, 100, "far/2");

    let (best, _) = align_once(&genome, &index, &read0, &read1);
    assert!(best.is_unmapped());
}

#[test]
fn mate_at_exactly_min_spacing_is_rejected() {
    init_logging();
    let genome = TestGenome::random(10_000, 37);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "near/1");
    let read1 = rc_read_from(&genome, 100 + MIN_SPACING as usize, 100, "near/2");

    let (best, _) = align_once(&genome, &index, &read0, &read1);
    assert!(best.is_unmapped(), "min_spacing overlap is too tight");
}

#[test]
fn mate_just_past_min_spacing_is_accepted() {
    init_logging();
    let genome = TestGenome::random(10_000, 37);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "snug/1");
    let read1 = rc_read_from(&genome, 100 + MIN_SPACING as usize + 1, 100, "snug/2");

    let (best, _) = align_once(&genome, &index, &read0, &read1);
    assert!(!best.is_unmapped());
    assert_eq!(best.location, [100, 100 + MIN_SPACING + 1]);
}

#[test]
fn reported_pair_scores_stay_within_search_depth() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 41);
    genome.duplicate_segment(100, 5000, 100);
    genome.duplicate_segment(600, 5500, 100);
    // One mismatch on each side of the duplicate pair.
    genome.rotate_base(5010);
    genome.rotate_base(5510);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "depth/1");
    let read1 = rc_read_from(&genome, 600, 100, "depth/2");

    let (best, secondaries) = align_once(&genome, &index, &read0, &read1);
    assert_eq!(best.score, [0, 0]);
    for result in std::iter::once(&best).chain(&secondaries) {
        let raw = result.score[0] + result.score[1];
        assert!(
            raw <= MAX_K + EXTRA_SEARCH_DEPTH,
            "raw pair score {raw} exceeds max_k + extra_search_depth"
        );
    }
    // The mismatched duplicate is still within reach: 2 raw, 5 compensated.
    assert!(secondaries.iter().any(|s| s.score == [1, 1]));
}

#[test]
fn near_duplicate_starts_merge_into_one_result() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 43);
    // A period-10 stretch makes the read match at 100 and 110; both starts
    // fall within the merge window and must collapse to one anchor.
    genome.fill_period(100, 220, b"ACGTTGCAAT");
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_of("merge/1", genome.segment(100, 200));
    let read1 = rc_read_from(&genome, 600, 100, "merge/2");

    let (best, secondaries) = align_once(&genome, &index, &read0, &read1);
    assert!(!best.is_unmapped());
    assert!(
        best.location[0] == 100 || best.location[0] == 110,
        "best must sit in the repeat, got {}",
        best.location[0]
    );
    assert!(
        secondaries.is_empty(),
        "periodic shifts of one alignment must merge, got {} extras",
        secondaries.len()
    );
}

#[test]
fn worse_copy_within_merge_window_does_not_displace_best() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 83);
    // A period-40 stretch makes the read match at 100 and 140: farther apart
    // than the hit-witnessing distance but still inside the merge window.
    // One base flip gives the 140 copy a single mismatch, so the tie-break
    // must keep the exact alignment at 100 as the anchor's incumbent.
    genome.fill_period(100, 240, b"ACGTTGCAATGCATCGGATCCTAGAGTCAACTGTTACGGA");
    genome.rotate_base(236);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_of("gap/1", genome.segment(100, 200));
    let read1 = rc_read_from(&genome, 600, 100, "gap/2");

    let (best, secondaries) = align_once(&genome, &index, &read0, &read1);
    assert_eq!(best.location, [100, 600]);
    assert_eq!(best.score, [0, 0], "the exact copy must win the merge");
    assert!(
        secondaries.is_empty(),
        "a 40 bp shift of the same alignment must merge, got {} extras",
        secondaries.len()
    );
}

#[test]
fn swapping_reads_swaps_the_result() {
    init_logging();
    let genome = TestGenome::random(10_000, 47);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "swap/1");
    let read1 = rc_read_from(&genome, 600, 100, "swap/2");

    let (forward, _) = align_once(&genome, &index, &read0, &read1);
    let (swapped, _) = align_once(&genome, &index, &read1, &read0);

    assert_eq!(swapped.location, [forward.location[1], forward.location[0]]);
    assert_eq!(
        swapped.direction,
        [forward.direction[1], forward.direction[0]]
    );
    assert_eq!(swapped.score, [forward.score[1], forward.score[0]]);
    assert_eq!(swapped.mapq, [forward.mapq[1], forward.mapq[0]]);
    assert_eq!(swapped.compensated_score, forward.compensated_score);
    assert!((swapped.probability - forward.probability).abs() < 1e-12);
}

#[test]
fn revise_pass_reproduces_the_secondary_set() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 53);
    genome.duplicate_segment(100, 5000, 100);
    genome.duplicate_segment(600, 5500, 100);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "rev/1");
    let read1 = rc_read_from(&genome, 600, 100, "rev/2");

    let mut aligner = aligner_with(opt(), &genome, &index);
    assert!(aligner.prepare_pair(&read0, &read1));
    aligner.enumerate_candidates();

    let mut best_score = aligner.opt().score_ceiling();
    aligner.score_candidates(&mut best_score, false);
    aligner.increment_clusters(best_score);
    aligner.correct_best_score(&mut best_score, 1);

    let mut first = Vec::new();
    let best_first = aligner.generate_results(1, 3, &mut best_score, &mut first);

    // Re-running the scoring in revise mode with the just-emitted best must
    // not change what gets generated.
    aligner.score_candidates(&mut best_score, true);
    let mut second = Vec::new();
    let best_second = aligner.generate_results(1, 3, &mut best_score, &mut second);

    assert_eq!(best_first.location, best_second.location);
    assert_eq!(best_first.compensated_score, best_second.compensated_score);
    let key = |r: &PairedAlignmentResult| (r.location, r.compensated_score);
    let mut first_keys: Vec<_> = first.iter().map(key).collect();
    let mut second_keys: Vec<_> = second.iter().map(key).collect();
    first_keys.sort_unstable();
    second_keys.sort_unstable();
    assert_eq!(first_keys, second_keys);
}

#[test]
fn ukkonen_pruning_scores_no_more_locations() {
    init_logging();
    let mut genome = TestGenome::random(12_000, 59);
    // One exact pair plus duplicates of increasing badness.
    for (i, dst) in [4000usize, 7000, 9500].into_iter().enumerate() {
        genome.duplicate_segment(100, dst, 100);
        genome.duplicate_segment(600, dst + 500, 100);
        for m in 0..=i {
            genome.rotate_base(dst + 10 + 20 * m);
        }
    }
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "ukk/1");
    let read1 = rc_read_from(&genome, 600, 100, "ukk/2");

    let mut pruned = aligner_with(opt(), &genome, &index);
    let mut unpruned = aligner_with(
        AlignerOpt {
            no_ukkonen: true,
            ..opt()
        },
        &genome,
        &index,
    );

    let mut secondaries = Vec::new();
    let best_pruned = match pruned.align(&read0, &read1, 2, 64, 64, &mut secondaries) {
        AlignOutcome::Aligned { best } => best,
        _ => panic!("buffer was large enough"),
    };
    let mut secondaries_unpruned = Vec::new();
    let best_unpruned = match unpruned.align(&read0, &read1, 2, 64, 64, &mut secondaries_unpruned)
    {
        AlignOutcome::Aligned { best } => best,
        _ => panic!("buffer was large enough"),
    };

    assert_eq!(best_pruned.location, best_unpruned.location);
    assert_eq!(best_pruned.score, best_unpruned.score);
    assert!(
        pruned.n_locations_scored() <= unpruned.n_locations_scored(),
        "pruning may only reduce scoring work ({} vs {})",
        pruned.n_locations_scored(),
        unpruned.n_locations_scored()
    );
}

#[test]
fn reads_shorter_than_seed_reject_without_scoring() {
    init_logging();
    let genome = TestGenome::random(10_000, 61);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_of("short/1", genome.segment(100, 105));
    let read1 = rc_read_from(&genome, 600, 100, "short/2");

    let mut aligner = aligner_with(opt(), &genome, &index);
    let mut secondaries = Vec::new();
    let best = match aligner.align(&read0, &read1, 2, 8, 8, &mut secondaries) {
        AlignOutcome::Aligned { best } => best,
        _ => panic!("short read cannot need a bigger buffer"),
    };
    assert!(best.is_unmapped());
    assert_eq!(aligner.n_locations_scored(), 0);
    assert_eq!(index.lookups.get(), 0);
}

#[test]
fn all_popular_seeds_leave_pair_unaligned() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 67);
    // A low-complexity genome: every 8-mer in it occurs thousands of times,
    // far over max_big_hits.
    genome.fill_period(0, 10_000, b"ACGTACGT");
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 96, 100, "pop/1");
    let read1 = rc_read_from(&genome, 600, 100, "pop/2");

    let mut aligner = aligner_with(opt(), &genome, &index);
    let mut secondaries = Vec::new();
    let best = match aligner.align(&read0, &read1, 2, 8, 8, &mut secondaries) {
        AlignOutcome::Aligned { best } => best,
        _ => panic!("no candidates can exist"),
    };
    assert!(best.is_unmapped());
    // Four seeds tried per read, each skipped on both strands.
    assert_eq!(aligner.popular_seeds_skipped(), [8, 8]);
    assert_eq!(aligner.n_locations_scored(), 0);
}

#[test]
fn cluster_counter_increments_once_per_pair() {
    init_logging();
    let mut genome = TestGenome::random(10_000, 71);
    genome.duplicate_segment(100, 5000, 100);
    genome.duplicate_segment(600, 5500, 100);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&genome, 100, 100, "tog/1");
    let read1 = rc_read_from(&genome, 600, 100, "tog/2");

    let clusters = Arc::new(ClusterCounter::new(8));
    let mut aligner = PairAligner::new(
        opt(),
        &genome,
        &index,
        MismatchOracle,
        Box::new(NoAdjustment),
        clusters.clone(),
    )
    .unwrap();

    assert!(aligner.prepare_pair(&read0, &read1));
    assert!(aligner.init_descent());
    // Both neighborhoods belong to cluster 3: two anchors, one increment.
    aligner.descend_to_target(0, 3);

    let mut best_score = aligner.opt().score_ceiling();
    aligner.score_candidates(&mut best_score, false);
    aligner.increment_clusters(best_score);
    assert_eq!(clusters.count(3), 1, "one pair increments a cluster once");

    // Repeating the increment step must be a no-op for the same pair.
    aligner.increment_clusters(best_score);
    assert_eq!(clusters.count(3), 1);

    // A new pair toggles afresh.
    assert!(aligner.prepare_pair(&read0, &read1));
    assert!(aligner.init_descent());
    aligner.descend_to_target(0, 3);
    let mut best_score = aligner.opt().score_ceiling();
    aligner.score_candidates(&mut best_score, false);
    aligner.increment_clusters(best_score);
    assert_eq!(clusters.count(3), 2);
}

#[test]
fn unmapped_pair_when_reads_come_from_nowhere() {
    init_logging();
    let genome = TestGenome::random(10_000, 73);
    let other = TestGenome::random(10_000, 1073);
    let index = TestIndex::build(&genome, SEED_LEN);
    let read0 = read_from(&other, 100, 100, "none/1");
    let read1 = rc_read_from(&other, 600, 100, "none/2");

    let (best, secondaries) = align_once(&genome, &index, &read0, &read1);
    assert!(best.is_unmapped());
    assert!(secondaries.is_empty());
}
