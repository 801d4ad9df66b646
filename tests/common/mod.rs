//! Shared fixtures: a synthetic genome, a toy hash-map seed index, and a
//! bounded mismatch-counting oracle.

use linked_align::{GenomeView, Read, ScoredEnd, ScoringOracle, SeedHits, SeedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::cell::Cell;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub fn reverse_complement(data: &[u8]) -> Vec<u8> {
    data.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            _ => b'N',
        })
        .collect()
}

pub struct TestGenome {
    bases: Vec<u8>,
    /// Ascending start locus of each contig; contig i spans
    /// [starts[i], starts[i+1]).
    contig_starts: Vec<u64>,
}

impl TestGenome {
    pub fn random(len: usize, seed: u64) -> TestGenome {
        let mut rng = StdRng::seed_from_u64(seed);
        let bases = (0..len).map(|_| BASES[rng.gen_range(0..4)]).collect();
        TestGenome {
            bases,
            contig_starts: vec![0],
        }
    }

    pub fn with_contigs(mut self, starts: Vec<u64>) -> TestGenome {
        assert_eq!(starts.first(), Some(&0));
        self.contig_starts = starts;
        self
    }

    pub fn segment(&self, start: usize, end: usize) -> Vec<u8> {
        self.bases[start..end].to_vec()
    }

    /// Copy `src..src+len` over `dst..dst+len`, making an exact duplicate.
    pub fn duplicate_segment(&mut self, src: usize, dst: usize, len: usize) {
        let copy = self.bases[src..src + len].to_vec();
        self.bases[dst..dst + len].copy_from_slice(&copy);
    }

    /// Replace one base with the next one in A->C->G->T->A order,
    /// guaranteeing a mismatch against any copy of the original.
    pub fn rotate_base(&mut self, at: usize) {
        let i = BASES.iter().position(|&b| b == self.bases[at]).unwrap();
        self.bases[at] = BASES[(i + 1) % 4];
    }

    pub fn fill_period(&mut self, start: usize, end: usize, motif: &[u8]) {
        for i in start..end {
            self.bases[i] = motif[(i - start) % motif.len()];
        }
    }
}

impl GenomeView for TestGenome {
    fn substring(&self, locus: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(locus).ok()?;
        if start >= self.bases.len() {
            return None;
        }
        let end = (start + len).min(self.bases.len());
        Some(&self.bases[start..end])
    }

    fn contig_at(&self, locus: u64) -> usize {
        self.contig_starts.partition_point(|&s| s <= locus) - 1
    }

    fn contig_count(&self) -> usize {
        self.contig_starts.len()
    }

    fn len(&self) -> u64 {
        self.bases.len() as u64
    }
}

const NO_HITS: &[u64] = &[];

/// Hash-map seed index over a `TestGenome`; hit lists descending, as the
/// aligner requires.  Counts lookups so tests can assert fast-reject paths.
pub struct TestIndex {
    seed_len: usize,
    seeds: FxHashMap<Vec<u8>, Vec<u64>>,
    pub lookups: Cell<usize>,
}

impl TestIndex {
    pub fn build(genome: &TestGenome, seed_len: usize) -> TestIndex {
        let mut seeds: FxHashMap<Vec<u8>, Vec<u64>> = FxHashMap::default();
        let bases = genome.substring(0, genome.len() as usize).unwrap();
        for start in 0..=bases.len().saturating_sub(seed_len) {
            let window = &bases[start..start + seed_len];
            if window.iter().any(|&b| !BASES.contains(&b)) {
                continue;
            }
            seeds.entry(window.to_vec()).or_default().push(start as u64);
        }
        for hits in seeds.values_mut() {
            hits.sort_unstable_by(|a, b| b.cmp(a));
        }
        TestIndex {
            seed_len,
            seeds,
            lookups: Cell::new(0),
        }
    }
}

impl SeedIndex for TestIndex {
    fn seed_len(&self) -> usize {
        self.seed_len
    }

    fn lookup(&self, seed: &[u8]) -> SeedHits<'_> {
        self.lookups.set(self.lookups.get() + 1);
        let forward = self.seeds.get(seed).map_or(NO_HITS, Vec::as_slice);
        let reverse = self
            .seeds
            .get(&reverse_complement(seed))
            .map_or(NO_HITS, Vec::as_slice);
        SeedHits { forward, reverse }
    }
}

/// Substitution-only bounded scorer: score = Hamming distance, None past the
/// limit, probability decaying by a fixed factor per mismatch.
pub struct MismatchOracle;

const MATCH_PROB: f64 = 0.999;
const MISMATCH_PROB: f64 = 0.001;

fn segment_probability(len: usize, mismatches: i32) -> f64 {
    MATCH_PROB.powi(len as i32 - mismatches) * MISMATCH_PROB.powi(mismatches)
}

impl ScoringOracle for MismatchOracle {
    fn score_forward(
        &mut self,
        text: &[u8],
        pattern: &[u8],
        _quality: &[u8],
        limit: i32,
    ) -> Option<ScoredEnd> {
        if limit < 0 || text.len() < pattern.len() {
            return None;
        }
        let mut score = 0;
        for (&t, &p) in text.iter().zip(pattern) {
            if t != p {
                score += 1;
                if score > limit {
                    return None;
                }
            }
        }
        Some(ScoredEnd {
            score,
            probability: segment_probability(pattern.len(), score),
        })
    }

    fn score_reverse(
        &mut self,
        text: &[u8],
        pattern_rev: &[u8],
        _quality_rev: &[u8],
        limit: i32,
    ) -> Option<(ScoredEnd, i64)> {
        if limit < 0 || text.len() < pattern_rev.len() {
            return None;
        }
        let mut score = 0;
        for (i, &p) in pattern_rev.iter().enumerate() {
            if text[text.len() - 1 - i] != p {
                score += 1;
                if score > limit {
                    return None;
                }
            }
        }
        Some((
            ScoredEnd {
                score,
                probability: segment_probability(pattern_rev.len(), score),
            },
            0,
        ))
    }
}

pub fn read_of(id: &str, data: Vec<u8>) -> Read {
    let quality = vec![b'I'; data.len()];
    Read::new(id, data, quality)
}

/// Forward read copied from the genome.
pub fn read_from(genome: &TestGenome, start: usize, len: usize, id: &str) -> Read {
    read_of(id, genome.segment(start, start + len))
}

/// Read whose reverse complement matches the genome at `start` (an RC-strand
/// fragment of the template).
pub fn rc_read_from(genome: &TestGenome, start: usize, len: usize, id: &str) -> Read {
    read_of(id, reverse_complement(&genome.segment(start, start + len)))
}
