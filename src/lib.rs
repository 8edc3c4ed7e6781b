//! # bwa-rs
//!
//! A cache-friendly ordered container based on the Black-White Array.
//!
//! Based on "The Black-White Array: A New Data Structure for Dynamic Data
//! Sets" (arXiv:2004.09051). The container keeps its elements in a handful
//! of sorted runs whose sizes mirror the set bits of a binary counter, so
//! N insertions perform only O(log N) heap allocations and every operation
//! runs in O(log N) amortized time. Compared to a balanced search tree it
//! trades pointer chasing for contiguous buffers.
//!
//! Duplicates are allowed; lookups and removals target the oldest of equal
//! elements first (FIFO).
//!
//! ## Example
//!
//! ```rust
//! use bwa_rs::BwArray;
//!
//! let mut arr = BwArray::new(i64::cmp);
//! arr.insert(23);
//! arr.insert(42);
//! arr.insert(23);
//!
//! assert_eq!(arr.len(), 3);
//! assert_eq!(arr.min(), Some(&23));
//! assert_eq!(arr.delete(&23), Some(23));
//! assert!(arr.has(&42));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

mod iter;
mod segment;

pub use iter::Iter;

use std::cmp::Ordering;
use std::fmt;

use crate::iter::merge_cursors;
use crate::segment::{demote_into, merge_for_delete, merge_into, Segment};

// =============================================================================
// Container
// =============================================================================

/// An ordered container of comparator-sorted elements.
///
/// Elements live in segments of capacity 2^k, one per set bit of an internal
/// counter; insertion increments the counter and folds smaller segments into
/// the freshly activated one, deletion tombstones a slot and consolidates a
/// segment once half its slots are tombstones.
///
/// The comparator is stored by value and must be a pure total order; a
/// comparator that violates transitivity leaves the container in an
/// unspecified (but memory-safe) state.
///
/// The container is single-owner and expects exclusive access for every
/// mutating call; it provides no internal locking.
pub struct BwArray<T, F> {
    segments: Vec<Segment<T>>,
    /// Binary counter over stored slots, tombstones included. Bit k set
    /// means segment k is active and logically holds 2^k slots.
    total: usize,
    cmp: F,
}

impl<T, F> BwArray<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty container. No segments are allocated until the
    /// first insert.
    pub fn new(cmp: F) -> Self {
        Self::with_capacity(cmp, 0)
    }

    /// Creates an empty container pre-sized for roughly `capacity` elements.
    ///
    /// All segment buffers up to rank `floor(log2(capacity))` are allocated
    /// up front, so inserts stay allocation-free until the element count
    /// outgrows them. A capacity of 0 means "unknown" and allocates nothing.
    pub fn with_capacity(cmp: F, capacity: usize) -> Self {
        let mut segments = Vec::new();
        if capacity > 0 {
            let ranks = capacity.ilog2() as usize + 1;
            segments = Vec::with_capacity(ranks);
            for rank in 0..ranks {
                segments.push(Segment::with_rank(rank));
            }
        }
        BwArray {
            segments,
            total: 0,
            cmp,
        }
    }

    /// Builds a container from an unsorted slice in one pass.
    ///
    /// Only the segments dictated by the binary decomposition of
    /// `slice.len()` are allocated; each takes a consecutive chunk of the
    /// input and sorts it in place. This is cheaper than inserting the
    /// elements one by one. The slice is not modified.
    pub fn from_slice(cmp: F, slice: &[T]) -> Self
    where
        T: Clone,
    {
        let len = slice.len();
        if len == 0 {
            return Self::new(cmp);
        }
        let ranks = len.ilog2() as usize + 1;
        let mut segments = Vec::with_capacity(ranks);
        let mut copy_from = 0;
        for rank in 0..ranks {
            let size = 1usize << rank;
            if len & size == 0 {
                segments.push(Segment::unallocated());
                continue;
            }
            let mut seg = Segment::with_rank(rank);
            for (slot, v) in seg.elems.iter_mut().zip(&slice[copy_from..copy_from + size]) {
                *slot = Some(v.clone());
            }
            seg.sort_full(&cmp);
            copy_from += size;
            segments.push(seg);
        }
        BwArray {
            segments,
            total: len,
            cmp,
        }
    }

    /// Number of stored elements, tombstones excluded. O(log N).
    pub fn len(&self) -> usize {
        let mut dead = 0;
        for (rank, seg) in self.segments.iter().enumerate() {
            if self.total & (1 << rank) != 0 {
                dead += seg.deleted_num;
            }
        }
        self.total - dead
    }

    /// Whether the container holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds an element, keeping duplicates. O(log N) amortized; one insert
    /// in every N pays O(N) for the full segment carry, and a new buffer is
    /// allocated only the first time a rank is reached.
    pub fn insert(&mut self, element: T) {
        let dest_rank = (self.total + 1).trailing_zeros() as usize;
        self.ensure_segment(dest_rank);
        let cap = 1usize << dest_rank;

        let dest = &mut self.segments[dest_rank];
        dest.reset();
        dest.elems[cap - 1] = Some(element);

        // Fold every lower rank in, mirroring the carry chain of total + 1.
        // The occupied part of the destination is always a suffix starting
        // at read_ptr, with exactly the next segment's worth of free slots
        // below it.
        let mut read_ptr = cap - 1;
        for rank in 0..dest_rank {
            let (lower, upper) = self.segments.split_at_mut(dest_rank);
            merge_into(&mut lower[rank], &mut upper[0], &self.cmp, read_ptr);
            read_ptr -= 1 << rank;
        }
        self.total += 1;
    }

    /// Replaces the oldest element equal to `element` in place, returning
    /// the prior value, or inserts when no equal element exists.
    /// O(log N) amortized.
    pub fn replace_or_insert(&mut self, element: T) -> Option<T> {
        match self.search(&element) {
            Some((rank, idx)) => self.segments[rank].elems[idx].replace(element),
            None => {
                self.insert(element);
                None
            }
        }
    }

    /// Whether an element equal to `element` is present. O(log N).
    pub fn has(&self, element: &T) -> bool {
        self.search(element).is_some()
    }

    /// A reference to the stored element equal to `element`, if any; the
    /// oldest one when duplicates exist. Useful when `element` is only the
    /// key part of a larger record. O(log N).
    pub fn get(&self, element: &T) -> Option<&T> {
        let (rank, idx) = self.search(element)?;
        Some(self.segments[rank].elem(idx))
    }

    /// Removes the oldest element equal to `element` and returns it.
    /// O(log N) amortized: removal tombstones the slot, and a segment that
    /// falls to half occupancy is consolidated into the rank below.
    pub fn delete(&mut self, element: &T) -> Option<T>
    where
        T: Clone,
    {
        let (rank, idx) = self.search(element)?;
        Some(self.remove_at(rank, idx))
    }

    /// Removes and returns the minimum element; the oldest one when equal
    /// minima exist. O(log N) amortized.
    pub fn delete_min(&mut self) -> Option<T>
    where
        T: Clone,
    {
        let (rank, idx) = self.locate_min()?;
        Some(self.remove_at(rank, idx))
    }

    /// Removes and returns the maximum element; the oldest one when equal
    /// maxima exist. O(log N) amortized.
    pub fn delete_max(&mut self) -> Option<T>
    where
        T: Clone,
    {
        let (rank, idx) = self.locate_max()?;
        Some(self.remove_at(rank, idx))
    }

    /// The minimum element; the oldest one when equal minima exist.
    /// O(log N).
    pub fn min(&self) -> Option<&T> {
        let (rank, idx) = self.locate_min()?;
        Some(self.segments[rank].elem(idx))
    }

    /// The maximum element; the oldest one when equal maxima exist.
    /// O(log N).
    pub fn max(&self) -> Option<&T> {
        let (rank, idx) = self.locate_max()?;
        Some(self.segments[rank].elem(idx))
    }

    /// Removes every element. With `drop_segments` the buffers are released
    /// too; without it they are kept for reuse, which is cheaper when the
    /// container is about to be refilled.
    pub fn clear(&mut self, drop_segments: bool) {
        self.total = 0;
        if drop_segments {
            self.segments.clear();
        }
    }

    /// Releases the buffers of every inactive segment. Useful after heavy
    /// deletion; never required for correctness.
    pub fn compact(&mut self) {
        for rank in 0..self.segments.len() {
            if self.total & (1 << rank) == 0 && self.segments[rank].is_allocated() {
                self.segments[rank] = Segment::unallocated();
            }
        }
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Calls `f` for every element in ascending order; `false` stops the
    /// walk. A whole walk allocates at most twice, whatever the element
    /// count.
    pub fn ascend(&self, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, false, |seg| {
            Some((seg.first_live()?, seg.last_live()?))
        })
        .drive(f);
    }

    /// Ascending walk over elements `>= pivot`.
    pub fn ascend_greater_or_equal(&self, pivot: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, false, |seg| {
            let start = seg.find_gtoe(&self.cmp, pivot)?;
            Some((start, seg.last_live()?))
        })
        .drive(f);
    }

    /// Ascending walk over elements `< pivot`.
    pub fn ascend_less_than(&self, pivot: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, false, |seg| {
            Some((seg.first_live()?, seg.find_less(&self.cmp, pivot)?))
        })
        .drive(f);
    }

    /// Ascending walk over elements in `[greater_or_equal, less_than)`.
    pub fn ascend_range(&self, greater_or_equal: &T, less_than: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, false, |seg| {
            let start = seg.find_gtoe(&self.cmp, greater_or_equal)?;
            let stop = seg.find_less(&self.cmp, less_than)?;
            (start <= stop).then_some((start, stop))
        })
        .drive(f);
    }

    /// Calls `f` for every element in descending order; `false` stops the
    /// walk. Same allocation bound as [`ascend`](Self::ascend).
    pub fn descend(&self, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, true, |seg| {
            Some((seg.last_live()?, seg.first_live()?))
        })
        .drive(f);
    }

    /// Descending walk over elements `>= pivot`.
    pub fn descend_greater_or_equal(&self, pivot: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, true, |seg| {
            let stop = seg.find_gtoe(&self.cmp, pivot)?;
            Some((seg.last_live()?, stop))
        })
        .drive(f);
    }

    /// Descending walk over elements `< pivot`.
    pub fn descend_less_than(&self, pivot: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, true, |seg| {
            Some((seg.find_less(&self.cmp, pivot)?, seg.first_live()?))
        })
        .drive(f);
    }

    /// Descending walk over elements in `[greater_or_equal, less_than)`.
    pub fn descend_range(&self, greater_or_equal: &T, less_than: &T, f: impl FnMut(&T) -> bool) {
        merge_cursors(&self.segments, self.total, &self.cmp, true, |seg| {
            let start = seg.find_less(&self.cmp, less_than)?;
            let stop = seg.find_gtoe(&self.cmp, greater_or_equal)?;
            (start >= stop).then_some((start, stop))
        })
        .drive(f);
    }

    /// Calls `f` for every element in segment order, not sorted order;
    /// `false` stops the walk. Faster than the ordered walks and performs
    /// no allocation at all.
    pub fn unordered_walk(&self, mut f: impl FnMut(&T) -> bool) {
        for (rank, seg) in self.segments.iter().enumerate() {
            if self.total & (1 << rank) == 0 {
                continue;
            }
            for i in 0..seg.capacity() {
                if seg.deleted[i] {
                    continue;
                }
                if !f(seg.elem(i)) {
                    return;
                }
            }
        }
    }

    /// An ascending iterator over the elements.
    ///
    /// The iterator borrows the container, so mutating the container while
    /// it is alive is rejected at compile time.
    pub fn iter(&self) -> Iter<'_, T, F> {
        Iter::new(merge_cursors(
            &self.segments,
            self.total,
            &self.cmp,
            false,
            |seg| Some((seg.first_live()?, seg.last_live()?)),
        ))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Locates the oldest element equal to `element`: scans active ranks
    /// from highest to lowest (older duplicates live higher) and takes the
    /// rightmost live equal within the hit segment.
    fn search(&self, element: &T) -> Option<(usize, usize)> {
        for rank in (0..self.segments.len()).rev() {
            if self.total & (1 << rank) == 0 {
                continue;
            }
            if let Some(idx) = self.segments[rank].find_rightmost_live(&self.cmp, element) {
                return Some((rank, idx));
            }
        }
        None
    }

    fn locate_min(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (rank, seg) in self.segments.iter().enumerate() {
            if self.total & (1 << rank) == 0 {
                continue;
            }
            let first = match seg.first_live() {
                Some(i) => i,
                None => continue,
            };
            // Of equal minima inside a segment the rightmost is the oldest.
            let idx = seg
                .find_rightmost_live(&self.cmp, seg.elem(first))
                .unwrap_or(first);
            match best {
                Some((brank, bidx))
                    if (self.cmp)(seg.elem(idx), self.segments[brank].elem(bidx))
                        == Ordering::Greater => {}
                // On ties the higher rank wins: that copy is older.
                _ => best = Some((rank, idx)),
            }
        }
        best
    }

    fn locate_max(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (rank, seg) in self.segments.iter().enumerate() {
            if self.total & (1 << rank) == 0 {
                continue;
            }
            // The rightmost live slot is already the oldest of equal maxima.
            let idx = match seg.last_live() {
                Some(i) => i,
                None => continue,
            };
            match best {
                Some((brank, bidx))
                    if (self.cmp)(seg.elem(idx), self.segments[brank].elem(bidx))
                        == Ordering::Less => {}
                _ => best = Some((rank, idx)),
            }
        }
        best
    }

    /// Tombstones `(rank, index)`, returns a copy of the element, and
    /// consolidates the segment if it reached half occupancy.
    fn remove_at(&mut self, rank: usize, index: usize) -> T
    where
        T: Clone,
    {
        let removed = self.segments[rank].elem(index).clone();
        let seg = &mut self.segments[rank];
        seg.mark_deleted(index);

        let cap = seg.capacity();
        let half = cap >> 1;
        if seg.deleted_num < half {
            return removed;
        }
        if rank == 0 {
            seg.elems[0] = None;
            seg.reset();
            self.total -= 1;
            return removed;
        }
        if self.total & half == 0 {
            // The rank below is inactive: demote the live half down into it.
            self.ensure_segment(rank - 1);
            let (lower, upper) = self.segments.split_at_mut(rank);
            demote_into(&mut upper[0], &mut lower[rank - 1]);
        } else {
            // The rank below is active: pack the live half to the top and
            // absorb the neighbour; the merged segment replaces both.
            let (lower, upper) = self.segments.split_at_mut(rank);
            let cur = &mut upper[0];
            cur.pack_live_to_end();
            merge_for_delete(&mut lower[rank - 1], cur, &self.cmp, half);
            cur.min_live_idx = 0;
            cur.max_live_idx = cap - 1;
        }
        // Either way the population drops by half this segment's capacity:
        // demotion trades bit k for bit k-1, absorption clears bit k-1.
        self.total -= half;
        removed
    }

    fn ensure_segment(&mut self, rank: usize) {
        if rank >= self.segments.len() {
            self.segments.resize_with(rank + 1, Segment::unallocated);
        }
        if !self.segments[rank].is_allocated() {
            self.segments[rank] = Segment::with_rank(rank);
        }
    }
}

impl<T: Clone, F: Clone> Clone for BwArray<T, F> {
    /// Deep copy. Only active segments are copied; inactive ranks come back
    /// unallocated. O(N).
    fn clone(&self) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len());
        for (rank, seg) in self.segments.iter().enumerate() {
            if self.total & (1 << rank) != 0 {
                segments.push(seg.clone());
            } else {
                segments.push(Segment::unallocated());
            }
        }
        BwArray {
            segments,
            total: self.total,
            cmp: self.cmp.clone(),
        }
    }
}

impl<T, F> fmt::Debug for BwArray<T, F>
where
    T: fmt::Debug,
    F: Fn(&T, &T) -> Ordering,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}


#[cfg(test)]
mod proptests;
