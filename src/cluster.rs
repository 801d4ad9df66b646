//! Shared linked-read cluster membership counts.
//!
//! Every read pair carries a cluster identifier assigned by the upstream
//! molecule-clustering pass (-1 when unclustered).  Aligner instances bump a
//! shared per-cluster count when a pair produces a good-enough anchor in that
//! cluster; the count later decides whether the cluster's edit-distance
//! compensation applies.  Counts saturate at 255.  Instances may run
//! concurrently, so the counts are atomics; the clustered/unclustered
//! decision tolerates the relaxed ordering.

use std::sync::atomic::{AtomicU8, Ordering};

/// Cluster identifier of a pair; `UNCLUSTERED` when the upstream pass did not
/// assign one.
pub const UNCLUSTERED: i32 = -1;

/// Shared saturating per-cluster membership counts.
pub struct ClusterCounter {
    counts: Vec<AtomicU8>,
}

impl ClusterCounter {
    pub fn new(num_clusters: usize) -> ClusterCounter {
        let mut counts = Vec::with_capacity(num_clusters);
        counts.resize_with(num_clusters, || AtomicU8::new(0));
        ClusterCounter { counts }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, cluster: usize) -> u8 {
        self.counts[cluster].load(Ordering::Relaxed)
    }

    /// Add one to the cluster's count, sticking at 255.
    pub fn saturating_increment(&self, cluster: usize) {
        let slot = &self.counts[cluster];
        let mut current = slot.load(Ordering::Relaxed);
        while current != u8::MAX {
            match slot.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(seen) => current = seen,
            }
        }
    }
}

/// Per-aligner record of which clusters the current pair has already
/// incremented, so one pair touching a cluster through several anchors counts
/// once.  Epoch-stamped so the per-pair reset is O(1).
pub struct ClusterToggle {
    epochs: Vec<u32>,
    epoch: u32,
}

impl ClusterToggle {
    pub fn new(num_clusters: usize) -> ClusterToggle {
        ClusterToggle {
            epochs: vec![0; num_clusters],
            epoch: 0,
        }
    }

    /// Start a new pair.  All toggles read as unset afterwards.
    pub fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Wrapped; stale stamps could alias the new epoch.
            self.epochs.iter_mut().for_each(|e| *e = 0);
            self.epoch = 1;
        }
    }

    pub fn is_set(&self, cluster: usize) -> bool {
        self.epochs[cluster] == self.epoch
    }

    pub fn set(&mut self, cluster: usize) {
        self.epochs[cluster] = self.epoch;
    }
}
