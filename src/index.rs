//! Seed index interface.
//!
//! The index maps a fixed-length seed to every genome location where it (or
//! its reverse complement) occurs.  Hit lists are sorted descending by locus;
//! the candidate-enumeration phase depends on that ordering for its binary
//! searches and coordinated merge.

/// Hit lists for one seed lookup.
///
/// `forward` holds the loci where the seed itself occurs; `reverse` holds the
/// loci where its reverse complement occurs.  Both are descending-sorted.
pub struct SeedHits<'a> {
    pub forward: &'a [u64],
    pub reverse: &'a [u64],
}

pub trait SeedIndex {
    /// Length of the seeds this index was built with.
    fn seed_len(&self) -> usize;

    /// Look up one seed.  `seed` must be exactly `seed_len()` bases over
    /// {A,C,G,T}; seeds containing N are never looked up.
    fn lookup(&self, seed: &[u8]) -> SeedHits<'_>;
}
