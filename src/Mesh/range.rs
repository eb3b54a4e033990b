//! # N-dimensional index ranges
//!
//! Half-open boxes of integer indices `[start, end)` used to describe which part of a
//! structured mesh a field can read (accessible range), which part the current worker
//! owns (local range) and which part the solver writes (local writable range).
//!
//! ```
//! use GhostFlow::Mesh::range::{Range, common_range, in_range};
//! let a = Range::new([0, 0], [8, 8]);
//! let b = Range::new([4, -1], [12, 6]);
//! let c = common_range(&a, &b);
//! assert_eq!(c, Range::new([4, 0], [8, 6]));
//! assert!(in_range(&c, &[4, 5]));
//! assert!(!in_range(&c, &[8, 5]));
//! ```

use std::fmt;

/// multi-dimensional mesh index
pub type MDIndex<const D: usize> = [i64; D];

/// Half-open N-dimensional range of integer indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range<const D: usize> {
    pub start: MDIndex<D>,
    pub end: MDIndex<D>,
}

impl<const D: usize> Range<D> {
    pub fn new(start: MDIndex<D>, end: MDIndex<D>) -> Self {
        Self { start, end }
    }

    /// range with the same extent in every dimension
    pub fn cube(start: i64, end: i64) -> Self {
        Self {
            start: [start; D],
            end: [end; D],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..D).any(|d| self.end[d] <= self.start[d])
    }

    /// number of indices in the given dimension (0 if the range is inverted there)
    pub fn extent(&self, dim: usize) -> usize {
        (self.end[dim] - self.start[dim]).max(0) as usize
    }

    /// total number of indices covered by the range
    pub fn count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (0..D).map(|d| self.extent(d)).product()
    }

    /// position of `index` inside the range in row-major order (last dimension fastest)
    pub fn linear_offset(&self, index: &MDIndex<D>) -> Option<usize> {
        if !in_range(self, index) {
            return None;
        }
        let mut offset = 0usize;
        for d in 0..D {
            offset = offset * self.extent(d) + (index[d] - self.start[d]) as usize;
        }
        Some(offset)
    }

    /// iterate over every index of the range in row-major order
    pub fn iter(&self) -> RangeIter<D> {
        RangeIter {
            range: *self,
            next: if self.is_empty() {
                None
            } else {
                Some(self.start)
            },
        }
    }
}

/// Per-dimension intersection of two ranges. The result may be empty.
pub fn common_range<const D: usize>(a: &Range<D>, b: &Range<D>) -> Range<D> {
    let mut ret = *a;
    for d in 0..D {
        ret.start[d] = a.start[d].max(b.start[d]);
        ret.end[d] = a.end[d].min(b.end[d]);
    }
    ret
}

pub fn in_range<const D: usize>(range: &Range<D>, index: &MDIndex<D>) -> bool {
    (0..D).all(|d| range.start[d] <= index[d] && index[d] < range.end[d])
}

/// formats an index as `(i, j, k)`
pub fn index_to_string<const D: usize>(index: &MDIndex<D>) -> String {
    let parts: Vec<String> = index.iter().map(|i| i.to_string()).collect();
    format!("({})", parts.join(", "))
}

impl<const D: usize> fmt::Display for Range<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            index_to_string(&self.start),
            index_to_string(&self.end)
        )
    }
}

impl<'a, const D: usize> IntoIterator for &'a Range<D> {
    type Item = MDIndex<D>;
    type IntoIter = RangeIter<D>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Row-major iterator over a [`Range`]
#[derive(Debug, Clone)]
pub struct RangeIter<const D: usize> {
    range: Range<D>,
    next: Option<MDIndex<D>>,
}

impl<const D: usize> Iterator for RangeIter<D> {
    type Item = MDIndex<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut following = current;
        let mut dim = D;
        loop {
            if dim == 0 {
                self.next = None;
                break;
            }
            dim -= 1;
            following[dim] += 1;
            if following[dim] < self.range.end[dim] {
                self.next = Some(following);
                break;
            }
            following[dim] = self.range.start[dim];
        }
        Some(current)
    }
}
