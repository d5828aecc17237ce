// eos_core/src/sensor.rs

use crate::arena::SharedArena;
use crate::entity::MapObject;
use crate::errors::StateError;
use crate::frames::compose_frames_with_jacobians;
use crate::gaussian::{Gaussian, StorageMode};
use crate::indices::IndexSet;
use crate::landmark::{LandmarkModel, Observation};
use crate::robot::Robot;
use crate::types::{LandmarkId, ObjectCategory, PoseMatrix, PoseVector, RobotId, SensorId, POSE_DIM};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a sensor's mounting pose (sensor frame in the robot frame) is held.
///
/// The two Jacobian shapes of `global_pose` (7x7 vs 7x14) follow directly
/// from this choice, so call sites spell it out instead of defaulting a
/// boolean flag.
#[derive(Debug, Clone)]
pub enum SensorMounting {
    /// Rigidly mounted, pre-calibrated: a bare pose, no uncertainty.
    Fixed(PoseVector),
    /// Fixed mean with a calibration covariance carried alongside, outside
    /// the filter.
    Calibrated {
        pose: PoseVector,
        covariance: PoseMatrix,
    },
    /// The mounting pose is estimated: 7 state cells are reserved and the
    /// pose becomes a remote view into the filter.
    EstimatedInFilter { initial: PoseVector },
}

/// A sensor installed on a robot.
///
/// Holds the mounting pose (local or in-filter), the index set its global
/// pose spans in the shared state, and one observation per tracked
/// landmark. The parent robot must outlive its sensors; relations go
/// through ids and the map registry, so a stale `RobotId` surfaces as
/// `UnknownRobot` rather than a dangling pointer.
#[derive(Debug)]
pub struct Sensor {
    base: MapObject,
    robot: RobotId,
    pose: Gaussian,
    global_pose_indices: IndexSet,
    observations: BTreeMap<LandmarkId, Observation>,
    landmark_model: Arc<dyn LandmarkModel>,
}

/// Guards the 7x14 Jacobian column convention: columns 0..7 map onto the
/// robot's pose cells, columns 7..14 onto the sensor's, through the union
/// index set. That only holds when the robot pose is one unbroken run of
/// cells and that run sits entirely before the sensor's slice, so the
/// union lists it first.
fn check_union_layout(robot_ia: &IndexSet, sensor_ia: &IndexSet) -> Result<(), StateError> {
    if !robot_ia.is_contiguous() {
        return Err(StateError::FragmentedPose);
    }
    match (robot_ia.as_slice().last(), sensor_ia.as_slice().first()) {
        (Some(last), Some(first)) if last < first => Ok(()),
        _ => Err(StateError::MisorderedPose),
    }
}

fn pose7(mean: DVector<f64>) -> Result<PoseVector, StateError> {
    if mean.len() != POSE_DIM {
        return Err(StateError::DimensionMismatch {
            expected: POSE_DIM,
            got: mean.len(),
        });
    }
    Ok(PoseVector::from_column_slice(mean.as_slice()))
}

impl Sensor {
    pub(crate) fn new(
        id: SensorId,
        robot: &Robot,
        mounting: SensorMounting,
        landmark_model: Arc<dyn LandmarkModel>,
        arena: &SharedArena,
    ) -> Result<Self, StateError> {
        let (base, pose) = match &mounting {
            SensorMounting::Fixed(p) => (
                MapObject::local(id.0, ObjectCategory::Sensor),
                Gaussian::from_mean(DVector::from_column_slice(p.as_slice())),
            ),
            SensorMounting::Calibrated { pose, covariance } => (
                MapObject::local(id.0, ObjectCategory::Sensor),
                Gaussian::from_moments(
                    DVector::from_column_slice(pose.as_slice()),
                    DMatrix::from_column_slice(POSE_DIM, POSE_DIM, covariance.as_slice()),
                )?,
            ),
            SensorMounting::EstimatedInFilter { initial } => {
                let base = MapObject::reserved(
                    id.0,
                    ObjectCategory::Sensor,
                    arena.clone(),
                    POSE_DIM,
                )?;
                let mut pose = Gaussian::remote(arena.clone(), base.state_indices());
                pose.set_mean(&DVector::from_column_slice(initial.as_slice()))?;
                (base, pose)
            }
        };

        let global_pose_indices = match pose.storage_mode() {
            StorageMode::Local => robot.pose_indices(),
            StorageMode::Remote => {
                check_union_layout(&robot.pose_indices(), &base.state_indices())?;
                robot.pose_indices().union(&base.state_indices())
            }
        };

        Ok(Sensor {
            base,
            robot: robot.id(),
            pose,
            global_pose_indices,
            observations: BTreeMap::new(),
            landmark_model,
        })
    }

    pub fn id(&self) -> SensorId {
        SensorId(self.base.id())
    }

    pub fn name(&self) -> Option<&str> {
        self.base.name()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.base.set_name(name);
    }

    pub fn robot_id(&self) -> RobotId {
        self.robot
    }

    /// Mounting pose of the sensor in the robot frame.
    pub fn pose(&self) -> &Gaussian {
        &self.pose
    }

    pub fn pose_mut(&mut self) -> &mut Gaussian {
        &mut self.pose
    }

    /// State rows participating in this sensor's global-pose Jacobian:
    /// the robot's pose indices, unioned with the sensor's own when the
    /// mounting pose is estimated.
    pub fn global_pose_indices(&self) -> &IndexSet {
        &self.global_pose_indices
    }

    pub fn landmark_model(&self) -> &Arc<dyn LandmarkModel> {
        &self.landmark_model
    }

    pub fn observations(&self) -> &BTreeMap<LandmarkId, Observation> {
        &self.observations
    }

    pub(crate) fn observations_mut(&mut self) -> &mut BTreeMap<LandmarkId, Observation> {
        &mut self.observations
    }

    /// Registers the tracking record for one landmark, keyed by its id.
    pub fn link_to_observation(&mut self, observation: Observation) {
        self.observations.insert(observation.landmark(), observation);
    }

    /// Re-points the parent backref and rebuilds the global-pose index set
    /// against the new robot's pose slice. Rejected (leaving the sensor
    /// untouched) when the new robot's pose cells would not lead the
    /// union, since the Jacobian column layout depends on that order.
    pub fn link_to_robot(&mut self, robot: &Robot) -> Result<(), StateError> {
        self.global_pose_indices = match self.pose.storage_mode() {
            StorageMode::Local => robot.pose_indices(),
            StorageMode::Remote => {
                check_union_layout(&robot.pose_indices(), &self.pose.indices())?;
                robot.pose_indices().union(&self.pose.indices())
            }
        };
        self.robot = robot.id();
        Ok(())
    }

    /// Sensor pose in the world frame, with the Jacobian of that pose with
    /// respect to every mapped state variable it depends on.
    ///
    /// Local mounting: only the robot pose is mapped; the Jacobian is one
    /// 7x7 block. In-filter mounting: 7x14, columns 0..7 with respect to
    /// the robot pose, columns 7..14 with respect to the sensor pose; the
    /// caller scatters the block against the full covariance through
    /// `global_pose_indices`. Pure with respect to the current state.
    pub fn global_pose(&self, robot: &Robot) -> Result<(PoseVector, DMatrix<f64>), StateError> {
        if robot.id() != self.robot {
            return Err(StateError::UnknownRobot(robot.id()));
        }
        let robot_pose = pose7(robot.pose().mean())?;
        let sensor_pose = pose7(self.pose.mean())?;
        let (global, j_robot, j_sensor) =
            compose_frames_with_jacobians(&robot_pose, &sensor_pose);

        let jacobian = match self.pose.storage_mode() {
            StorageMode::Local => {
                let mut j = DMatrix::zeros(POSE_DIM, POSE_DIM);
                j.view_mut((0, 0), (POSE_DIM, POSE_DIM)).copy_from(&j_robot);
                j
            }
            StorageMode::Remote => {
                let mut j = DMatrix::zeros(POSE_DIM, 2 * POSE_DIM);
                j.view_mut((0, 0), (POSE_DIM, POSE_DIM)).copy_from(&j_robot);
                j.view_mut((0, POSE_DIM), (POSE_DIM, POSE_DIM))
                    .copy_from(&j_sensor);
                j
            }
        };
        Ok((global, jacobian))
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.base.category(), self.base.id())?;
        if let Some(name) = self.name() {
            write!(f, "{name}, ")?;
        }
        writeln!(f, "tracking {}", self.landmark_model.kind())?;
        writeln!(f, ".pose :  {}", self.pose)?;
        write!(f, ".robot: [ {} ]", self.robot)?;
        if self.pose.storage_mode() == StorageMode::Remote {
            write!(f, "\n ia_globalPose: {}", self.global_pose_indices)?;
        }
        Ok(())
    }
}
