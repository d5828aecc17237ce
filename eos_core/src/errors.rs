// eos_core/src/errors.rs

use crate::types::{LandmarkId, RobotId, SensorId};
use thiserror::Error;

/// Every fallible operation in this core returns one of these.
///
/// `ArenaExhausted` is a normal outcome only when a caller skipped the
/// `unused_states` budget check; inside the landmark-discovery path it
/// indicates a broken critical section and is propagated, never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid index range: start {start} + length {len} overflows the index space")]
    InvalidRange { start: usize, len: usize },

    #[error("state arena exhausted: requested {requested} contiguous cells, largest free block is {largest_free}")]
    ArenaExhausted {
        requested: usize,
        largest_free: usize,
    },

    #[error("write attempted on a read-only estimate")]
    ReadOnlyViolation,

    #[error("remote view references state cells that are no longer allocated")]
    DanglingView,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("robot pose does not occupy a contiguous state slice")]
    FragmentedPose,

    #[error("robot pose cells must precede the sensor pose cells in the shared state")]
    MisorderedPose,

    #[error("unknown robot id {0}")]
    UnknownRobot(RobotId),

    #[error("unknown sensor id {0}")]
    UnknownSensor(SensorId),

    #[error("unknown landmark id {0}")]
    UnknownLandmark(LandmarkId),
}
