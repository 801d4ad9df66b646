//! Hit bookkeeping for one (read, direction).
//!
//! Each recorded seed lookup keeps its descending-sorted hit list and a
//! cursor into it.  The set answers "highest implied alignment start",
//! "next lower", and "next at or below a bound", and computes a lower bound
//! on mismatches at the current cursor from the disjoint-set structure of
//! the lookups.  All of the search logic leans on the descending sort.

use crate::defaults::MAX_MERGE_DISTANCE;
use crate::utils::locations_within;

struct HitLookup {
    /// Descending loci, trimmed so every entry is >= seed_offset.
    hits: Vec<u64>,
    seed_offset: u64,
    /// Cursor into `hits`; == hits.len() when exhausted.
    current: usize,
    disjoint_set: usize,
}

struct DisjointSet {
    /// Lookups in this set that returned no hits at all.
    exhausted: u32,
}

/// All seed lookups for one (read, direction).
pub struct HitSet {
    lookups: Vec<HitLookup>,
    n_used: usize,
    disjoint_sets: Vec<DisjointSet>,
    miss_counts: Vec<u32>,
    /// Capacity reserved for each new hit-list buffer.
    capacity_hint: usize,
    /// Most recent locus handed out by first_hit / next_lower_hit /
    /// next_hit_leq.
    cursor: u64,
}

impl HitSet {
    pub fn new(capacity_hint: usize) -> HitSet {
        HitSet {
            lookups: Vec::new(),
            n_used: 0,
            disjoint_sets: Vec::new(),
            miss_counts: Vec::new(),
            capacity_hint,
            cursor: 0,
        }
    }

    /// Forget the previous pair.  Hit-list capacity is retained.
    pub fn reset(&mut self) {
        self.n_used = 0;
        self.disjoint_sets.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.n_used == 0
    }

    /// Record one lookup.  `hits` must be sorted descending.  An empty list
    /// still counts against the current disjoint set's lower bound.
    pub fn record_lookup(&mut self, seed_offset: u64, hits: &[u64], begins_disjoint_set: bool) {
        if begins_disjoint_set {
            self.disjoint_sets.push(DisjointSet { exhausted: 0 });
        }
        debug_assert!(
            !self.disjoint_sets.is_empty(),
            "first record_lookup must begin a disjoint set"
        );

        if hits.is_empty() {
            if let Some(set) = self.disjoint_sets.last_mut() {
                set.exhausted += 1;
            }
            return;
        }

        if self.n_used == self.lookups.len() {
            self.lookups.push(HitLookup {
                hits: Vec::with_capacity(self.capacity_hint),
                seed_offset: 0,
                current: 0,
                disjoint_set: 0,
            });
        }
        let lookup = &mut self.lookups[self.n_used];
        lookup.hits.clear();
        lookup.hits.extend_from_slice(hits);
        // Hits below the seed offset would imply an alignment starting
        // before the genome; they sort to the tail.
        while lookup.hits.last().is_some_and(|&h| h < seed_offset) {
            lookup.hits.pop();
        }
        lookup.seed_offset = seed_offset;
        lookup.current = 0;
        lookup.disjoint_set = self.disjoint_sets.len() - 1;
        self.n_used += 1;
    }

    fn active(&self) -> &[HitLookup] {
        &self.lookups[..self.n_used]
    }

    /// Highest implied alignment start across all lookups, or None when no
    /// lookup has hits.  Sets the cursor.
    pub fn first_hit(&mut self) -> Option<(u64, u64)> {
        let mut best = 0u64;
        let mut offset = 0u64;
        let mut found = false;
        for lookup in self.active() {
            if let Some(&head) = lookup.hits.first() {
                if head - lookup.seed_offset > best {
                    best = head - lookup.seed_offset;
                    offset = lookup.seed_offset;
                    found = true;
                }
            }
        }
        if found {
            self.cursor = best;
            Some((best, offset))
        } else {
            None
        }
    }

    /// Highest implied start strictly below the cursor.  Lookups whose head
    /// equals the cursor advance past it first.
    pub fn next_lower_hit(&mut self) -> Option<(u64, u64)> {
        let cursor = self.cursor;
        let mut best = 0u64;
        let mut offset = 0u64;
        let mut found = false;
        for lookup in &mut self.lookups[..self.n_used] {
            if lookup.current < lookup.hits.len()
                && lookup.hits[lookup.current] - lookup.seed_offset == cursor
            {
                lookup.current += 1;
            }
            if let Some(&head) = lookup.hits.get(lookup.current) {
                let implied = head - lookup.seed_offset;
                if implied > best {
                    best = implied;
                    offset = lookup.seed_offset;
                    found = true;
                }
            }
        }
        if found {
            self.cursor = best;
            Some((best, offset))
        } else {
            None
        }
    }

    /// Highest implied start <= `bound`, binary-searching each lookup from
    /// its cursor.  Advances every lookup's cursor to its own answer.
    pub fn next_hit_leq(&mut self, bound: u64) -> Option<(u64, u64)> {
        let mut best = 0u64;
        let mut offset = 0u64;
        let mut found = false;
        for lookup in &mut self.lookups[..self.n_used] {
            let target = bound.saturating_add(lookup.seed_offset);
            let tail = &lookup.hits[lookup.current..];
            // Descending sort: the first entry <= target is the largest one.
            let pos = tail.partition_point(|&h| h > target);
            if pos == tail.len() {
                lookup.current = lookup.hits.len();
                continue;
            }
            lookup.current += pos;
            let implied = lookup.hits[lookup.current] - lookup.seed_offset;
            if implied > best {
                best = implied;
                offset = lookup.seed_offset;
                found = true;
            }
        }
        if found {
            debug_assert!(best <= bound);
            self.cursor = best;
            Some((best, offset))
        } else {
            None
        }
    }

    /// Lower bound on mismatches of any alignment starting at the cursor:
    /// the largest number of misses in any one disjoint set.  A lookup
    /// witnesses the cursor when its current or previous hit lands within
    /// the merge distance of cursor + seed_offset.
    pub fn best_possible_score_for_cursor(&mut self) -> i32 {
        let cursor = self.cursor;
        self.miss_counts.clear();
        self.miss_counts
            .extend(self.disjoint_sets.iter().map(|s| s.exhausted));

        for lookup in &self.lookups[..self.n_used] {
            let target = cursor.saturating_add(lookup.seed_offset);
            let near_current = lookup.current < lookup.hits.len()
                && locations_within(lookup.hits[lookup.current], target, MAX_MERGE_DISTANCE);
            let near_previous = lookup.current > 0
                && locations_within(lookup.hits[lookup.current - 1], target, MAX_MERGE_DISTANCE);
            if !(near_current || near_previous) {
                self.miss_counts[lookup.disjoint_set] += 1;
            }
        }

        self.miss_counts.iter().copied().max().unwrap_or(0) as i32
    }
}
