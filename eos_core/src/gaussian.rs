// eos_core/src/gaussian.rs

use crate::arena::{read_arena, write_arena, SharedArena};
use crate::errors::StateError;
use crate::indices::IndexSet;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// How a `Gaussian` keeps its numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// The quantity owns an independent value outside the filter.
    Local,
    /// The quantity is a live view into the shared filter state.
    Remote,
}

enum Storage {
    Local {
        mean: DVector<f64>,
        covariance: Option<DMatrix<f64>>,
    },
    Remote {
        arena: SharedArena,
        indices: IndexSet,
    },
}

/// A mean + optional-covariance estimation quantity.
///
/// Storage mode is fixed at construction. Local quantities own their data;
/// Remote quantities read and write through an `IndexSet` view into the
/// shared arena, so a Remote write mutates the filter state in place.
///
/// A Remote quantity must not outlive the arena slice it views. The
/// `MapObject` lifecycle upholds this (entities drop their views and their
/// slice together); it is not re-checked per access in release builds.
pub struct Gaussian {
    storage: Storage,
    writable: bool,
}

impl Gaussian {
    /// Local quantity from a bare mean; uncertainty treated as absent.
    pub fn from_mean(mean: DVector<f64>) -> Self {
        Gaussian {
            storage: Storage::Local {
                mean,
                covariance: None,
            },
            writable: true,
        }
    }

    /// Local quantity from full first and second moments.
    pub fn from_moments(mean: DVector<f64>, covariance: DMatrix<f64>) -> Result<Self, StateError> {
        if covariance.nrows() != mean.len() || covariance.ncols() != mean.len() {
            return Err(StateError::DimensionMismatch {
                expected: mean.len(),
                got: covariance.nrows(),
            });
        }
        Ok(Gaussian {
            storage: Storage::Local {
                mean,
                covariance: Some(covariance),
            },
            writable: true,
        })
    }

    /// Remote quantity viewing the arena cells named by `indices`.
    pub fn remote(arena: SharedArena, indices: IndexSet) -> Self {
        Gaussian {
            storage: Storage::Remote { arena, indices },
            writable: true,
        }
    }

    /// Freezes the quantity; every write thereafter fails with
    /// `ReadOnlyViolation`.
    pub fn into_read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn storage_mode(&self) -> StorageMode {
        match self.storage {
            Storage::Local { .. } => StorageMode::Local,
            Storage::Remote { .. } => StorageMode::Remote,
        }
    }

    pub fn dim(&self) -> usize {
        match &self.storage {
            Storage::Local { mean, .. } => mean.len(),
            Storage::Remote { indices, .. } => indices.size(),
        }
    }

    /// The state indices this quantity occupies. Empty for Local storage.
    pub fn indices(&self) -> IndexSet {
        match &self.storage {
            Storage::Local { .. } => IndexSet::empty(),
            Storage::Remote { indices, .. } => indices.clone(),
        }
    }

    /// Current mean. Remote storage gathers from the arena.
    pub fn mean(&self) -> DVector<f64> {
        match &self.storage {
            Storage::Local { mean, .. } => mean.clone(),
            Storage::Remote { arena, indices } => read_arena(arena).mean_at(indices),
        }
    }

    /// Writes the mean. A Remote write lands in the shared arena.
    pub fn set_mean(&mut self, value: &DVector<f64>) -> Result<(), StateError> {
        if !self.writable {
            return Err(StateError::ReadOnlyViolation);
        }
        match &mut self.storage {
            Storage::Local { mean, .. } => {
                if value.len() != mean.len() {
                    return Err(StateError::DimensionMismatch {
                        expected: mean.len(),
                        got: value.len(),
                    });
                }
                mean.copy_from(value);
                Ok(())
            }
            Storage::Remote { arena, indices } => {
                write_arena(arena).set_mean_at(indices, value)
            }
        }
    }

    /// Current covariance. `None` for a Local quantity built without one.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        match &self.storage {
            Storage::Local { covariance, .. } => covariance.clone(),
            Storage::Remote { arena, indices } => {
                Some(read_arena(arena).covariance_at(indices, indices))
            }
        }
    }

    /// Writes the covariance block of this quantity.
    pub fn set_covariance(&mut self, value: &DMatrix<f64>) -> Result<(), StateError> {
        if !self.writable {
            return Err(StateError::ReadOnlyViolation);
        }
        let d = self.dim();
        if value.nrows() != d || value.ncols() != d {
            return Err(StateError::DimensionMismatch {
                expected: d,
                got: value.nrows(),
            });
        }
        match &mut self.storage {
            Storage::Local { covariance, .. } => {
                *covariance = Some(value.clone());
                Ok(())
            }
            Storage::Remote { arena, indices } => {
                write_arena(arena).set_covariance_at(indices, indices, value)
            }
        }
    }
}

impl fmt::Debug for Gaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gaussian")
            .field("mode", &self.storage_mode())
            .field("dim", &self.dim())
            .field("writable", &self.writable)
            .finish()
    }
}

impl fmt::Display for Gaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = self.mean();
        write!(f, "{:?} ", self.storage_mode())?;
        write!(f, "[")?;
        for (k, x) in mean.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{x:.4}")?;
        }
        write!(f, "]")
    }
}
