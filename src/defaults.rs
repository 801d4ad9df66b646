// src/defaults.rs

// Seeding / candidate enumeration
pub const DEFAULT_MAX_READ_LEN: usize = 400;
pub const DEFAULT_MAX_HITS: usize = 300;
pub const DEFAULT_MAX_BIG_HITS: usize = 16_000;
pub const DEFAULT_SEED_COVERAGE: f64 = 4.0;
pub const DEFAULT_MAX_CANDIDATE_POOL_SIZE: usize = 1_000_000;

// Pair geometry
pub const DEFAULT_MIN_SPACING: u64 = 50;
pub const DEFAULT_MAX_SPACING: u64 = 1000;

// Scoring
pub const DEFAULT_MAX_K: i32 = 8;
pub const DEFAULT_EXTRA_SEARCH_DEPTH: i32 = 2;

// Linked-read cluster compensation
pub const DEFAULT_CLUSTER_ED_COMPENSATION: i32 = 3;
pub const DEFAULT_UNCLUSTERED_PENALTY: f64 = 0.5;
pub const DEFAULT_MIN_CLUSTER_SIZE: u8 = 2;

/// How close a lookup's current (or previous) hit must land to the cursor's
/// implied start to witness it in the lower-bound computation.  Used only by
/// `HitSet`.
pub const MAX_MERGE_DISTANCE: u64 = 31;

/// Radius of the neighborhood one merge anchor represents: candidates are
/// scanned for an anchor to adopt within this window of the adjusted locus,
/// and an anchor treats scored pairs inside it as duplicates subject to the
/// tie-break rather than new locations.
pub const CANDIDATE_MERGE_WINDOW: u64 = 50;

/// Prior probability that any reference base is a SNP; the seed region of a
/// scored alignment contributes (1 - SNP_PROB)^seed_len to match probability.
pub const SNP_PROB: f64 = 0.001;

// Mapping quality
pub const MAPQ_MAX: u8 = 70;
pub const DEFAULT_PRINT_STATS_MAPQ_LIMIT: u8 = 9;
