// eos_core/src/types.rs

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension of every pose in this core: 3 position + 4 quaternion.
pub const POSE_DIM: usize = 7;

// --- Core Type Aliases ---
/// A pose expressed as [px, py, pz, qw, qx, qy, qz].
pub type PoseVector = SVector<f64, 7>;
/// A square Jacobian block over one pose.
pub type PoseMatrix = SMatrix<f64, 7, 7>;

// --- Core Identifiers ---
// Each entity category draws from its own id space; a RobotId and a
// SensorId with the same numeric value are unrelated.

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
            Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifies one robot within a map.
    RobotId
);
entity_id!(
    /// Identifies one sensor within a map.
    SensorId
);
entity_id!(
    /// Identifies one landmark within a map. Never reused, even after eviction.
    LandmarkId
);

/// Category tag carried by every map entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Robot,
    Sensor,
    Landmark,
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectCategory::Robot => "ROBOT",
            ObjectCategory::Sensor => "SENSOR",
            ObjectCategory::Landmark => "LANDMARK",
        };
        write!(f, "{s}")
    }
}
