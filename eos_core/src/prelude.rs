// eos_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::errors::StateError;
pub use crate::landmark::LandmarkModel;
pub use crate::types::{LandmarkId, ObjectCategory, PoseMatrix, PoseVector, RobotId, SensorId, POSE_DIM};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::arena::{SharedArena, SliceHandle, StateArena};
pub use crate::gaussian::{Gaussian, StorageMode};
pub use crate::indices::IndexSet;
pub use crate::landmark::{Landmark, Observation};
pub use crate::map::SlamMap;
pub use crate::robot::Robot;
pub use crate::sensor::{Sensor, SensorMounting};

// --- Frame math ---
pub use crate::frames::{compose_frames, compose_frames_with_jacobians, identity_pose};
