// eos_core/src/indices.rs

use crate::errors::StateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, duplicate-free set of offsets into the shared state vector.
///
/// An `IndexSet` names which rows/columns of the shared mean and covariance a
/// quantity occupies. It is built once (from a contiguous range, or as the
/// union of two sets) and never mutated afterwards; the indices stay valid
/// for as long as the entity owning the underlying slice is alive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSet(Vec<usize>);

impl IndexSet {
    /// The empty index set (a quantity that touches no shared state).
    pub fn empty() -> Self {
        IndexSet(Vec::new())
    }

    /// Builds the contiguous range `{start, start+1, ..., start+len-1}`.
    ///
    /// Lengths are unsigned, so the malformed-range case left to reject is
    /// a range whose end does not fit in the index space.
    pub fn range(start: usize, len: usize) -> Result<Self, StateError> {
        let end = start
            .checked_add(len)
            .ok_or(StateError::InvalidRange { start, len })?;
        Ok(IndexSet((start..end).collect()))
    }

    /// Merges two index sets, ascending, duplicates removed.
    ///
    /// Symmetric: `a.union(&b) == b.union(&a)` for all inputs.
    pub fn union(&self, other: &IndexSet) -> IndexSet {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let next = match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    i += 1;
                    a[i - 1]
                }
                std::cmp::Ordering::Greater => {
                    j += 1;
                    b[j - 1]
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                    a[i - 1]
                }
            };
            out.push(next);
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        IndexSet(out)
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// True when the indices form one unbroken run `{s, s+1, ..., s+n-1}`.
    ///
    /// The 7x14 global-pose Jacobian layout relies on the robot's pose
    /// occupying such a run; see `Sensor`.
    pub fn is_contiguous(&self) -> bool {
        self.0
            .windows(2)
            .all(|w| w[1] == w[0] + 1)
    }

    /// Ascending iteration over the indices.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, usize>> {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Position of `index` within the set, when present.
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.0.binary_search(&index).ok()
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (k, i) in self.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, "]")
    }
}
