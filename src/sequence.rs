//! Update id gap detection
//!
//! Producers bump `id` by one for every update of a pair. A jump means
//! updates were lost in transit and the consumer's view of that pair is stale
//! until the next full book arrives.

use std::collections::{HashMap, VecDeque};

/// Gaps kept per pair for inspection; older ones only survive in the totals
pub const RECENT_GAPS: usize = 32;

/// Pairs tracked by default before new pairs are ignored
pub const DEFAULT_MAX_PAIRS: usize = 1024;

/// An inclusive range of missing ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub first_missing: i32,
    pub last_missing: i32,
}

impl Gap {
    /// Number of missing ids
    pub fn size(&self) -> u32 {
        self.last_missing.wrapping_sub(self.first_missing) as u32 + 1
    }

    pub fn contains(&self, id: i32) -> bool {
        id >= self.first_missing && id <= self.last_missing
    }
}

#[derive(Debug, Clone, Default)]
pub struct GapDetector {
    last_id: Option<i32>,
    recent: VecDeque<Gap>,
    gap_count: u64,
    total_missing: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an id; returns the gap it reveals, if any
    pub fn process(&mut self, id: i32) -> Option<Gap> {
        let last = self.last_id.replace(id)?;
        let expected = last.wrapping_add(1);
        if id == expected {
            return None;
        }
        // Older or repeated ids restart the count instead of reporting ~2^32 missing
        if id.wrapping_sub(expected) < 0 {
            return None;
        }
        let gap = Gap {
            first_missing: expected,
            last_missing: id.wrapping_sub(1),
        };
        self.gap_count += 1;
        self.total_missing += u64::from(gap.size());
        if self.recent.len() == RECENT_GAPS {
            self.recent.pop_front();
        }
        self.recent.push_back(gap);
        Some(gap)
    }

    /// Up to [`RECENT_GAPS`] most recent gaps, oldest first
    pub fn recent_gaps(&self) -> impl Iterator<Item = &Gap> + '_ {
        self.recent.iter()
    }

    /// Gaps seen since the last reset, including those no longer retained
    pub fn gap_count(&self) -> u64 {
        self.gap_count
    }

    /// Get total number of missing ids
    pub fn total_missing(&self) -> u64 {
        self.total_missing
    }

    pub fn last_id(&self) -> Option<i32> {
        self.last_id
    }

    pub fn reset(&mut self) {
        *self = GapDetector::new();
    }
}

/// One [`GapDetector`] per trading pair, for at most `max_pairs` pairs.
///
/// Pair names come off the network, so once the limit is reached updates
/// for unseen pairs are counted but not tracked.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    pairs: HashMap<String, GapDetector>,
    max_pairs: usize,
    untracked: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::with_max_pairs(DEFAULT_MAX_PAIRS)
    }

    pub fn with_max_pairs(max_pairs: usize) -> Self {
        SequenceTracker {
            pairs: HashMap::new(),
            max_pairs,
            untracked: 0,
        }
    }

    pub fn observe(&mut self, pair: &str, id: i32) -> Option<Gap> {
        if let Some(detector) = self.pairs.get_mut(pair) {
            return detector.process(id);
        }
        if self.pairs.len() >= self.max_pairs {
            self.untracked += 1;
            return None;
        }
        let mut detector = GapDetector::new();
        detector.process(id);
        self.pairs.insert(pair.to_owned(), detector);
        None
    }

    pub fn detector(&self, pair: &str) -> Option<&GapDetector> {
        self.pairs.get(pair)
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn max_pairs(&self) -> usize {
        self.max_pairs
    }

    /// Updates skipped because the pair limit was reached
    pub fn untracked(&self) -> u64 {
        self.untracked
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
