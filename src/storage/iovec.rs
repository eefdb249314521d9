//! Scatter/gather planning.
//!
//! A region of a power-of-two ring either fits before the end of the backing
//! store or wraps around to its start. [`plan`] turns a logical region into at
//! most two physical index ranges, and [`Spans`] lends them out as slices so a
//! single vectored transfer can cover the whole region.

use core::ops::Range;

/// Physical ranges of a logical ring region, in logical order.
///
/// Every range is non-empty and lies inside the store. In the two-range case
/// the first range runs to the end of the store, the second starts at index 0
/// and ends at or before the first range's start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Spans {
    Empty,
    One(Range<usize>),
    Two(Range<usize>, Range<usize>),
}

/// Plan the region of `len` bytes that starts `skip` bytes after `offset`.
///
/// `capacity` must be a power of two and `skip + len` must not exceed it.
pub(crate) fn plan(capacity: usize, offset: usize, skip: usize, len: usize) -> Spans {
    if len == 0 {
        return Spans::Empty;
    }

    debug_assert!(capacity.is_power_of_two());
    debug_assert!(skip + len <= capacity);

    let start = (offset + skip) & (capacity - 1);
    if start + len <= capacity {
        Spans::One(start..start + len)
    } else {
        let first = start..capacity;
        let second = 0..len - first.len();
        Spans::Two(first, second)
    }
}

impl Spans {
    /// Total number of bytes covered.
    pub(crate) fn len(&self) -> usize {
        match self {
            Spans::Empty => 0,
            Spans::One(a) => a.len(),
            Spans::Two(a, b) => a.len() + b.len(),
        }
    }

    /// Borrow the ranges out of `store`.
    pub(crate) fn slices<'s>(&self, store: &'s [u8]) -> heapless::Vec<&'s [u8], 2> {
        match self {
            Spans::Empty => heapless::Vec::new(),
            Spans::One(a) => core::iter::once(&store[a.clone()]).collect(),
            Spans::Two(a, b) => [&store[a.clone()], &store[b.clone()]].into_iter().collect(),
        }
    }

    /// Mutably borrow the ranges out of `store`.
    pub(crate) fn slices_mut<'s>(&self, store: &'s mut [u8]) -> heapless::Vec<&'s mut [u8], 2> {
        match self {
            Spans::Empty => heapless::Vec::new(),
            Spans::One(a) => core::iter::once(&mut store[a.clone()]).collect(),
            Spans::Two(a, b) => {
                let (low, high) = store.split_at_mut(a.start);
                [&mut high[..a.len()], &mut low[b.clone()]].into_iter().collect()
            }
        }
    }

    /// Copy the covered bytes into the front of `dst`.
    ///
    /// `dst` must be at least `self.len()` bytes long.
    pub(crate) fn copy_out(&self, store: &[u8], dst: &mut [u8]) {
        let mut at = 0;
        for span in self.slices(store) {
            dst[at..at + span.len()].copy_from_slice(span);
            at += span.len();
        }
    }

    /// Fill the covered bytes from the front of `src`.
    ///
    /// `src` must be at least `self.len()` bytes long.
    pub(crate) fn copy_in(&self, store: &mut [u8], src: &[u8]) {
        let mut at = 0;
        for span in self.slices_mut(store) {
            let n = span.len();
            span.copy_from_slice(&src[at..at + n]);
            at += n;
        }
    }
}
