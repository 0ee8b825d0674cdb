//! Page-range arithmetic and the chunk-size shrink state machine.
//!
//! The controller never plans a whole pass up front. It computes one range at
//! a time from `(current_start, chunk_size)`, so a mid-pass shrink only
//! affects the failed range's retry and everything after it — ranges already
//! completed are never re-split.

/// Compute the next contiguous page range starting at `start`.
///
/// Ranges are 1-based and inclusive: `end = min(start + chunk_size - 1,
/// total_pages)`. Pure function of its inputs.
pub fn next_range(start: u32, chunk_size: u32, total_pages: u32) -> (u32, u32) {
    debug_assert!(start >= 1, "page numbers are 1-based");
    debug_assert!(chunk_size >= 1);
    debug_assert!(start <= total_pages);
    (start, (start + chunk_size - 1).min(total_pages))
}

/// Chunk-size state for one pass: starts at a default, only ever shrinks,
/// and never drops below the floor.
///
/// Modelled as an explicit little state machine rather than loop-local
/// mutation so the two invariants — monotone non-increasing, floor-clamped —
/// hold by construction.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSizer {
    current: u32,
    floor: u32,
}

impl ChunkSizer {
    /// Create a sizer starting at `default` with the given `floor`.
    ///
    /// Both are clamped to at least 1; the start value is clamped to at
    /// least the floor.
    pub fn new(default: u32, floor: u32) -> Self {
        let floor = floor.max(1);
        Self {
            current: default.max(floor),
            floor,
        }
    }

    /// The chunk size currently in effect.
    pub fn get(&self) -> u32 {
        self.current
    }

    /// Whether a further shrink is possible.
    pub fn can_shrink(&self) -> bool {
        self.current > self.floor
    }

    /// Halve the chunk size, clamped to the floor. Returns the new size, or
    /// `None` if the sizer was already at the floor (no transition taken).
    pub fn shrink(&mut self) -> Option<u32> {
        if !self.can_shrink() {
            return None;
        }
        self.current = (self.current / 2).max(self.floor);
        Some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Repeatedly applying `next_range` from page 1 must partition
    /// `[1, total_pages]` exactly: contiguous, non-overlapping, covering.
    #[test]
    fn ranges_partition_document() {
        for total_pages in 1..=40u32 {
            for chunk_size in 1..=15u32 {
                let mut covered: Vec<u32> = Vec::new();
                let mut start = 1;
                while start <= total_pages {
                    let (s, e) = next_range(start, chunk_size, total_pages);
                    assert_eq!(s, start);
                    assert!(e >= s && e <= total_pages);
                    covered.extend(s..=e);
                    start = e + 1;
                }
                let expected: Vec<u32> = (1..=total_pages).collect();
                assert_eq!(
                    covered, expected,
                    "partition broken for total={total_pages} chunk={chunk_size}"
                );
            }
        }
    }

    #[test]
    fn last_range_is_clamped() {
        assert_eq!(next_range(1, 10, 12), (1, 10));
        assert_eq!(next_range(11, 10, 12), (11, 12));
        assert_eq!(next_range(1, 10, 3), (1, 3));
        assert_eq!(next_range(5, 1, 5), (5, 5));
    }

    #[test]
    fn shrink_halves_and_clamps_at_floor() {
        let mut sizer = ChunkSizer::new(10, 5);
        assert_eq!(sizer.get(), 10);
        assert_eq!(sizer.shrink(), Some(5));
        assert_eq!(sizer.get(), 5);
        // At the floor: no further transition.
        assert_eq!(sizer.shrink(), None);
        assert_eq!(sizer.get(), 5);
    }

    #[test]
    fn shrink_never_goes_below_floor() {
        let mut sizer = ChunkSizer::new(12, 5);
        assert_eq!(sizer.shrink(), Some(6));
        // 6 / 2 = 3 would undershoot; clamp to 5.
        assert_eq!(sizer.shrink(), Some(5));
        assert_eq!(sizer.shrink(), None);
    }

    #[test]
    fn shrink_is_monotone_non_increasing() {
        let mut sizer = ChunkSizer::new(64, 1);
        let mut prev = sizer.get();
        while let Some(next) = sizer.shrink() {
            assert!(next < prev);
            prev = next;
        }
        assert_eq!(sizer.get(), 1);
    }

    #[test]
    fn degenerate_defaults_are_clamped() {
        let sizer = ChunkSizer::new(0, 0);
        assert_eq!(sizer.get(), 1);
        assert!(!sizer.can_shrink());

        // Default below floor snaps up to the floor.
        let sizer = ChunkSizer::new(3, 5);
        assert_eq!(sizer.get(), 5);
    }
}
