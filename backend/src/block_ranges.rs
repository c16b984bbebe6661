//! Reverse map from guest-memory ranges to the blocks whose
//! translation read them, used for range invalidation.
//!
//! A sorted interval list with multiset semantics: overlapping blocks
//! keep independent entries, so removing the descriptors that intersect
//! an invalidated range never disturbs neighbours.

use std::collections::HashSet;

use dbt_ir::LocationDescriptor;

#[derive(Debug)]
struct RangeEntry {
    start: u64,
    end: u64,
    location: LocationDescriptor,
}

#[derive(Default)]
pub struct BlockRanges {
    entries: Vec<RangeEntry>,
}

impl BlockRanges {
    pub fn new() -> BlockRanges {
        BlockRanges::default()
    }

    /// Record that `location`'s translation read `[start, end)`.
    pub fn add_range(&mut self, start: u64, end: u64, location: LocationDescriptor) {
        debug_assert!(start < end, "empty guest range for {location:?}");
        self.entries.push(RangeEntry {
            start,
            end,
            location,
        });
    }

    /// Remove and return every descriptor whose recorded range
    /// intersects `[start, start + length)`.
    pub fn invalidate_range(&mut self, start: u64, length: u64) -> HashSet<LocationDescriptor> {
        let end = start.saturating_add(length);
        let mut hit = HashSet::new();
        self.entries.retain(|entry| {
            if entry.start < end && start < entry.end {
                hit.insert(entry.location);
                false
            } else {
                true
            }
        });
        // A descriptor may also have entries outside the invalidated
        // range; they are stale now and must go too.
        self.entries.retain(|entry| !hit.contains(&entry.location));
        hit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
