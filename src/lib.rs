//! Core of an intersection-based paired-end short-read aligner specialized
//! for linked-read (10x-style) chemistry, where pairs from one molecule
//! share a cluster identity and clustered alignments are favored.
//!
//! The crate owns the four-phase pair engine: seed sampling into hit sets,
//! coordinated descent over both hit streams, bounded scoring with
//! merge-anchor dedup and cluster compensation, and finalization (MAPQ,
//! adjustment, secondary pruning).  FASTQ/SAM handling, index construction,
//! and the edit-distance primitives live with the caller, behind the
//! `SeedIndex`, `GenomeView`, `ScoringOracle`, and `AlignmentAdjuster`
//! traits.

pub mod adjust;
pub mod aligner;
pub mod cluster;
pub mod defaults;
pub mod genome;
pub mod index;
pub mod mapq;
pub mod read;
pub mod result;
pub mod scoring;
pub mod utils;

pub use adjust::{AlignmentAdjuster, NoAdjustment};
pub use aligner::{AlignerOpt, OptError, PairAligner, ResultCounts};
pub use cluster::{ClusterCounter, UNCLUSTERED};
pub use genome::{Direction, GenomeView, INVALID_LOCATION};
pub use index::{SeedHits, SeedIndex};
pub use read::Read;
pub use result::{AlignOutcome, AlignmentStatus, PairedAlignmentResult};
pub use scoring::{ScoredEnd, ScoringOracle};
