//! Sorted runs with lazy deletion.
//!
//! A segment of rank `k` is a fixed buffer of `2^k` slots holding a sorted
//! run plus a per-slot tombstone bitmap. Deleted slots keep their element so
//! binary search stays valid; the value is only dropped when a consolidation
//! overwrites the slot or the buffer itself is dropped.

use std::cmp::Ordering;

/// A sorted run of `2^rank` slots with a tombstone bitmap.
///
/// Slot occupancy follows the container's activity bit: while the segment is
/// active every slot is `Some` (tombstoned slots included); an inactive
/// segment has had its values moved out and holds `None` (or stale leftovers
/// that the next activation overwrites).
///
/// Invariants while active:
/// - non-deleted elements are non-decreasing under the comparator;
/// - among equal elements, newer-inserted ones sit at lower indices;
/// - among equal elements, non-deleted ones sit below deleted ones.
#[derive(Clone)]
pub(crate) struct Segment<T> {
    pub(crate) elems: Vec<Option<T>>,
    pub(crate) deleted: Vec<bool>,
    pub(crate) deleted_num: usize,
    /// Lower bound hint: no live slot below this index. Only moves right.
    pub(crate) min_live_idx: usize,
    /// Upper bound hint: no live slot above this index. Only moves left.
    pub(crate) max_live_idx: usize,
}

impl<T> Segment<T> {
    /// An unallocated placeholder occupying a rank slot in the container.
    pub(crate) fn unallocated() -> Self {
        Segment {
            elems: Vec::new(),
            deleted: Vec::new(),
            deleted_num: 0,
            min_live_idx: 0,
            max_live_idx: 0,
        }
    }

    /// Allocates buffers for a segment of the given rank (`2^rank` slots).
    pub(crate) fn with_rank(rank: usize) -> Self {
        let cap = 1usize << rank;
        let mut elems = Vec::with_capacity(cap);
        elems.resize_with(cap, || None);
        Segment {
            elems,
            deleted: vec![false; cap],
            deleted_num: 0,
            min_live_idx: 0,
            max_live_idx: cap - 1,
        }
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.elems.is_empty()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.elems.len()
    }

    /// Clears tombstone state before the segment is repopulated.
    pub(crate) fn reset(&mut self) {
        self.deleted.fill(false);
        self.deleted_num = 0;
        self.min_live_idx = 0;
        self.max_live_idx = self.elems.len() - 1;
    }

    /// The element in slot `i`. Valid for any slot of an active segment.
    #[inline]
    pub(crate) fn elem(&self, i: usize) -> &T {
        self.elems[i].as_ref().expect("slot of an active segment")
    }

    /// Smallest live index `>= from`, if any.
    pub(crate) fn next_live(&self, from: usize) -> Option<usize> {
        (from..self.deleted.len()).find(|&i| !self.deleted[i])
    }

    /// Largest live index `<= from`, if any.
    pub(crate) fn prev_live(&self, from: usize) -> Option<usize> {
        (0..=from.min(self.deleted.len() - 1))
            .rev()
            .find(|&i| !self.deleted[i])
    }

    /// First live index, scanning from the lower bound hint.
    #[inline]
    pub(crate) fn first_live(&self) -> Option<usize> {
        self.next_live(self.min_live_idx)
    }

    /// Last live index, scanning from the upper bound hint.
    #[inline]
    pub(crate) fn last_live(&self) -> Option<usize> {
        self.prev_live(self.max_live_idx)
    }

    /// Rightmost live index holding an element equal to `val`, if any.
    ///
    /// On an equal probe the search goes right past live slots and left past
    /// tombstones: live equals sit below deleted equals, so the boundary the
    /// search converges on is exactly one past the oldest live copy.
    pub(crate) fn find_rightmost_live<F>(&self, cmp: &F, val: &T) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let mut b = self.min_live_idx;
        let mut e = self.max_live_idx + 1;
        while b < e {
            let m = (b + e) >> 1;
            match cmp(val, self.elem(m)) {
                Ordering::Less => e = m,
                Ordering::Greater => b = m + 1,
                Ordering::Equal => {
                    if self.deleted[m] {
                        e = m;
                    } else {
                        b = m + 1;
                    }
                }
            }
        }
        let idx = b.checked_sub(1)?;
        if self.deleted[idx] || cmp(self.elem(idx), val) != Ordering::Equal {
            return None;
        }
        Some(idx)
    }

    /// Leftmost live index whose element is `>= val`, if any.
    pub(crate) fn find_gtoe<F>(&self, cmp: &F, val: &T) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let mut b = self.min_live_idx;
        let mut e = self.max_live_idx + 1;
        while b < e {
            let m = (b + e) >> 1;
            if cmp(val, self.elem(m)) != Ordering::Greater {
                e = m;
            } else {
                b = m + 1;
            }
        }
        if b > self.max_live_idx {
            return None;
        }
        self.next_live(b)
    }

    /// Rightmost live index whose element is `< val`, if any.
    pub(crate) fn find_less<F>(&self, cmp: &F, val: &T) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let mut b = self.min_live_idx;
        let mut e = self.max_live_idx + 1;
        while b < e {
            let m = (b + e) >> 1;
            if cmp(val, self.elem(m)) == Ordering::Greater {
                b = m + 1;
            } else {
                e = m;
            }
        }
        // b is the first index with an element >= val.
        self.prev_live(b.checked_sub(1)?)
    }

    /// Tombstones slot `index` and nudges the bound hints.
    pub(crate) fn mark_deleted(&mut self, index: usize) {
        debug_assert!(!self.deleted[index]);
        self.deleted[index] = true;
        self.deleted_num += 1;
        if index == self.min_live_idx {
            self.min_live_idx += 1;
        }
        if index == self.max_live_idx && self.max_live_idx > 0 {
            self.max_live_idx -= 1;
        }
    }

    /// Packs all live elements into the right half of the buffer, preserving
    /// order, and drops the tombstoned values. The left half becomes free
    /// space for a merge from the rank below. Requires half occupancy.
    pub(crate) fn pack_live_to_end(&mut self) {
        let cap = self.elems.len();
        debug_assert_eq!(self.deleted_num, cap / 2);
        let mut w = cap;
        for r in (0..cap).rev() {
            if self.deleted[r] {
                self.elems[r] = None;
                continue;
            }
            w -= 1;
            if w != r {
                self.elems[w] = self.elems[r].take();
            }
        }
        debug_assert_eq!(w, cap / 2);
        self.deleted[w..cap].fill(false);
        self.deleted_num = 0;
        self.min_live_idx = w;
        self.max_live_idx = cap - 1;
    }

    /// In-place unstable sort of the whole buffer; used by bulk construction
    /// where every slot is live.
    pub(crate) fn sort_full<F>(&mut self, cmp: &F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        debug_assert_eq!(self.deleted_num, 0);
        self.elems.sort_unstable_by(|a, b| {
            match (a, b) {
                (Some(a), Some(b)) => cmp(a, b),
                // All slots are Some here; the arms below are unreachable.
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }
}

/// Merges `low` (the rank below) into `high` during an insert carry.
///
/// `high` already holds `low.capacity()` elements in
/// `[read_ptr, read_ptr + low.capacity())` and has free slots in
/// `[read_ptr - low.capacity(), read_ptr)`; the merged run is written left
/// to right starting at the free region, so writes never overtake reads.
///
/// On equal keys the high side goes first unless its slot is tombstoned:
/// during an insert carry the high side holds the newer copies, and newer
/// equals must end up leftmost with live equals below deleted ones.
pub(crate) fn merge_into<T, F>(low: &mut Segment<T>, high: &mut Segment<T>, cmp: &F, read_ptr: usize)
where
    F: Fn(&T, &T) -> Ordering,
{
    merge(low, high, cmp, read_ptr, false);
}

/// Merges `low` into `high` during a delete consolidation.
///
/// Same shape as [`merge_into`] with the tie-break reversed: here the low
/// side holds the copies that must end up leftmost, so on equal keys the low
/// side goes first unless its slot is tombstoned.
pub(crate) fn merge_for_delete<T, F>(
    low: &mut Segment<T>,
    high: &mut Segment<T>,
    cmp: &F,
    read_ptr: usize,
) where
    F: Fn(&T, &T) -> Ordering,
{
    merge(low, high, cmp, read_ptr, true);
}

fn merge<T, F>(
    low: &mut Segment<T>,
    high: &mut Segment<T>,
    cmp: &F,
    read_ptr: usize,
    low_first_on_tie: bool,
) where
    F: Fn(&T, &T) -> Ordering,
{
    let low_len = low.capacity();
    let cap = high.capacity();
    debug_assert!(read_ptr >= low_len && read_ptr + low_len <= cap);

    let mut w = read_ptr - low_len;
    let mut i = 0; // next unread slot of low
    let mut j = read_ptr; // next unread slot of high
    while i < low_len && j < cap {
        let take_low = match cmp(low.elem(i), high.elem(j)) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                if low_first_on_tie {
                    !low.deleted[i]
                } else {
                    high.deleted[j]
                }
            }
        };
        if take_low {
            high.elems[w] = low.elems[i].take();
            high.deleted[w] = low.deleted[i];
            i += 1;
        } else {
            high.elems[w] = high.elems[j].take();
            high.deleted[w] = high.deleted[j];
            j += 1;
        }
        w += 1;
    }
    // Once low runs out the rest of high is already in its final position
    // (w has caught up with j); only a low remainder needs moving.
    while i < low_len {
        high.elems[w] = low.elems[i].take();
        high.deleted[w] = low.deleted[i];
        i += 1;
        w += 1;
    }

    high.deleted_num += low.deleted_num;
    low.deleted_num = 0;
}

/// Moves the live elements of `from` into `to`, in order, dropping the
/// tombstoned values left behind. `from` must hold exactly `to.capacity()`
/// live elements; `to` comes out fully live.
pub(crate) fn demote_into<T>(from: &mut Segment<T>, to: &mut Segment<T>) {
    let mut w = 0;
    for r in 0..from.elems.len() {
        if from.deleted[r] {
            from.elems[r] = None;
            continue;
        }
        to.elems[w] = from.elems[r].take();
        to.deleted[w] = false;
        w += 1;
    }
    debug_assert_eq!(w, to.capacity());
    to.deleted_num = 0;
    to.min_live_idx = 0;
    to.max_live_idx = to.elems.len() - 1;
    from.deleted_num = 0;
}
