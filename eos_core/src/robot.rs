// eos_core/src/robot.rs

use crate::arena::SharedArena;
use crate::entity::MapObject;
use crate::errors::StateError;
use crate::frames::identity_pose;
use crate::gaussian::Gaussian;
use crate::indices::IndexSet;
use crate::types::{ObjectCategory, RobotId, POSE_DIM};
use nalgebra::DVector;

/// A robot whose pose is always estimated: its 7 state cells are reserved
/// at construction and its pose `Gaussian` views them remotely.
#[derive(Debug)]
pub struct Robot {
    base: MapObject,
    pose: Gaussian,
}

impl Robot {
    pub(crate) fn new(id: RobotId, arena: SharedArena) -> Result<Self, StateError> {
        let base = MapObject::reserved(id.0, ObjectCategory::Robot, arena.clone(), POSE_DIM)?;
        let mut pose = Gaussian::remote(arena, base.state_indices());
        // Start at the identity so the orientation quaternion is valid
        // before the first filter update.
        pose.set_mean(&DVector::from_column_slice(identity_pose().as_slice()))?;
        Ok(Robot { base, pose })
    }

    pub fn id(&self) -> RobotId {
        RobotId(self.base.id())
    }

    pub fn name(&self) -> Option<&str> {
        self.base.name()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.base.set_name(name);
    }

    pub fn pose(&self) -> &Gaussian {
        &self.pose
    }

    pub fn pose_mut(&mut self) -> &mut Gaussian {
        &mut self.pose
    }

    /// The state indices holding this robot's pose.
    pub fn pose_indices(&self) -> IndexSet {
        self.base.state_indices()
    }
}
