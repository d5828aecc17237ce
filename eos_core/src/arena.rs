// eos_core/src/arena.rs

use crate::errors::StateError;
use crate::indices::IndexSet;
use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A reserved run of contiguous state cells.
///
/// Handles are created by `StateArena::reserve` and given back through
/// `StateArena::release`; whoever holds the handle owns the slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceHandle {
    offset: usize,
    len: usize,
}

impl SliceHandle {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The index set covering this slice.
    pub fn indices(&self) -> IndexSet {
        // A handle's range was validated at reservation time.
        IndexSet::range(self.offset, self.len)
            .unwrap_or_else(|_| IndexSet::empty())
    }
}

/// The shared filter state: one mean vector, one covariance matrix, and the
/// free-space bookkeeping that parcels them out to map entities.
///
/// Allocation is first-fit over a sorted free list of `(offset, len)` runs;
/// `release` coalesces adjacent runs so fragmentation stays bounded by the
/// entity churn, not by its history.
#[derive(Debug)]
pub struct StateArena {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    free: Vec<(usize, usize)>,
}

/// Shared handle to the arena. One writer (the estimation thread) at a
/// time; read-only consumers such as global-pose queries may overlap.
pub type SharedArena = Arc<RwLock<StateArena>>;

/// Locks the arena for reading, absorbing lock poisoning: a panicking
/// reader cannot have left the free list half-edited.
pub fn read_arena(arena: &SharedArena) -> RwLockReadGuard<'_, StateArena> {
    arena.read().unwrap_or_else(PoisonError::into_inner)
}

/// Locks the arena for writing, absorbing lock poisoning.
pub fn write_arena(arena: &SharedArena) -> RwLockWriteGuard<'_, StateArena> {
    arena.write().unwrap_or_else(PoisonError::into_inner)
}

impl StateArena {
    /// Creates an arena with `capacity` state cells, all free, mean zeroed
    /// and covariance zeroed.
    pub fn new(capacity: usize) -> Self {
        StateArena {
            mean: DVector::zeros(capacity),
            covariance: DMatrix::zeros(capacity, capacity),
            free: if capacity > 0 { vec![(0, capacity)] } else { Vec::new() },
        }
    }

    /// Convenience constructor for the shared form every entity consumes.
    pub fn new_shared(capacity: usize) -> SharedArena {
        Arc::new(RwLock::new(StateArena::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.mean.len()
    }

    /// Total free cells, over all runs.
    pub fn free_cells(&self) -> usize {
        self.free.iter().map(|&(_, len)| len).sum()
    }

    fn largest_free_run(&self) -> usize {
        self.free.iter().map(|&(_, len)| len).max().unwrap_or(0)
    }

    /// True when `n` contiguous free cells exist somewhere in the arena.
    ///
    /// Callers that intend to reserve on a positive answer must hold the
    /// write lock across both calls; see `SlamMap::process_raw`.
    pub fn unused_states(&self, n: usize) -> bool {
        self.largest_free_run() >= n
    }

    /// Reserves the first free run that fits `n` cells.
    pub fn reserve(&mut self, n: usize) -> Result<SliceHandle, StateError> {
        let slot = self
            .free
            .iter()
            .position(|&(_, len)| len >= n)
            .ok_or(StateError::ArenaExhausted {
                requested: n,
                largest_free: self.largest_free_run(),
            })?;
        let (offset, len) = self.free[slot];
        if len == n {
            self.free.remove(slot);
        } else {
            self.free[slot] = (offset + n, len - n);
        }
        trace!("arena: reserved {n} cells at offset {offset}");
        Ok(SliceHandle { offset, len: n })
    }

    /// Returns a slice to the free pool, coalescing with its neighbours.
    ///
    /// The freed cells are not cleared; any Remote view still pointing at
    /// them is dangling (a documented precondition violation, detected in
    /// debug builds only).
    pub fn release(&mut self, handle: SliceHandle) {
        if handle.len == 0 {
            return;
        }
        let at = self
            .free
            .partition_point(|&(offset, _)| offset < handle.offset);
        self.free.insert(at, (handle.offset, handle.len));
        // Merge left and right where runs touch.
        if at + 1 < self.free.len()
            && self.free[at].0 + self.free[at].1 == self.free[at + 1].0
        {
            self.free[at].1 += self.free[at + 1].1;
            self.free.remove(at + 1);
        }
        if at > 0 && self.free[at - 1].0 + self.free[at - 1].1 == self.free[at].0 {
            self.free[at - 1].1 += self.free[at].1;
            self.free.remove(at);
        }
        debug!(
            "arena: released {} cells at offset {}, {} free",
            handle.len,
            handle.offset,
            self.free_cells()
        );
    }

    /// True when every index of `ia` is currently allocated. Used by the
    /// debug-mode dangling-view checks.
    pub fn is_live(&self, ia: &IndexSet) -> bool {
        ia.iter().all(|i| {
            i < self.capacity()
                && !self
                    .free
                    .iter()
                    .any(|&(offset, len)| (offset..offset + len).contains(&i))
        })
    }

    /// Gathers the mean entries named by `ia`.
    pub fn mean_at(&self, ia: &IndexSet) -> DVector<f64> {
        debug_assert!(self.is_live(ia), "mean_at through a dangling view");
        DVector::from_iterator(ia.size(), ia.iter().map(|i| self.mean[i]))
    }

    /// Scatters `values` into the mean entries named by `ia`.
    ///
    /// Debug builds reject a write through released cells with
    /// `DanglingView`; release builds skip the liveness scan.
    pub fn set_mean_at(&mut self, ia: &IndexSet, values: &DVector<f64>) -> Result<(), StateError> {
        if values.len() != ia.size() {
            return Err(StateError::DimensionMismatch {
                expected: ia.size(),
                got: values.len(),
            });
        }
        #[cfg(debug_assertions)]
        if !self.is_live(ia) {
            return Err(StateError::DanglingView);
        }
        for (k, i) in ia.iter().enumerate() {
            self.mean[i] = values[k];
        }
        Ok(())
    }

    /// Gathers the covariance block with rows `rows` and columns `cols`.
    pub fn covariance_at(&self, rows: &IndexSet, cols: &IndexSet) -> DMatrix<f64> {
        debug_assert!(
            self.is_live(rows) && self.is_live(cols),
            "covariance_at through a dangling view"
        );
        DMatrix::from_fn(rows.size(), cols.size(), |r, c| {
            self.covariance[(rows.as_slice()[r], cols.as_slice()[c])]
        })
    }

    /// Scatters `block` into the covariance rows/columns named by the sets.
    pub fn set_covariance_at(
        &mut self,
        rows: &IndexSet,
        cols: &IndexSet,
        block: &DMatrix<f64>,
    ) -> Result<(), StateError> {
        if block.nrows() != rows.size() {
            return Err(StateError::DimensionMismatch {
                expected: rows.size(),
                got: block.nrows(),
            });
        }
        if block.ncols() != cols.size() {
            return Err(StateError::DimensionMismatch {
                expected: cols.size(),
                got: block.ncols(),
            });
        }
        #[cfg(debug_assertions)]
        if !(self.is_live(rows) && self.is_live(cols)) {
            return Err(StateError::DanglingView);
        }
        for (r, i) in rows.iter().enumerate() {
            for (c, j) in cols.iter().enumerate() {
                self.covariance[(i, j)] = block[(r, c)];
            }
        }
        Ok(())
    }
}
