// eos_core/src/map.rs

use crate::arena::{read_arena, write_arena, SharedArena, StateArena};
use crate::entity::IdPool;
use crate::errors::StateError;
use crate::landmark::{Landmark, LandmarkModel, Observation};
use crate::robot::Robot;
use crate::sensor::{Sensor, SensorMounting};
use crate::types::{LandmarkId, PoseVector, RobotId, SensorId};
use log::{debug, trace};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The map: one shared state arena plus the registry of every entity
/// estimated against it.
///
/// Entities relate through ids looked up in these tables, never through
/// owned pointers, so destruction order cannot dangle: evicting a landmark
/// removes its table entry (releasing its state slice) and strips the
/// matching observation from every sensor in the same call.
#[derive(Debug)]
pub struct SlamMap {
    arena: SharedArena,
    robots: BTreeMap<RobotId, Robot>,
    sensors: BTreeMap<SensorId, Sensor>,
    landmarks: BTreeMap<LandmarkId, Landmark>,
    robot_ids: IdPool,
    sensor_ids: IdPool,
    landmark_ids: IdPool,
}

impl SlamMap {
    /// A map whose shared state holds `state_capacity` cells.
    pub fn new(state_capacity: usize) -> Self {
        SlamMap {
            arena: StateArena::new_shared(state_capacity),
            robots: BTreeMap::new(),
            sensors: BTreeMap::new(),
            landmarks: BTreeMap::new(),
            robot_ids: IdPool::new(),
            sensor_ids: IdPool::new(),
            landmark_ids: IdPool::new(),
        }
    }

    pub fn arena(&self) -> &SharedArena {
        &self.arena
    }

    /// Whether `n` contiguous free state cells remain.
    pub fn unused_states(&self, n: usize) -> bool {
        read_arena(&self.arena).unused_states(n)
    }

    /// Creates a robot, reserving its 7 pose cells.
    pub fn add_robot(&mut self, name: impl Into<String>) -> Result<RobotId, StateError> {
        let id = RobotId(self.robot_ids.next_id());
        let mut robot = Robot::new(id, self.arena.clone())?;
        robot.set_name(name);
        debug!("map: added robot {id} at {}", robot.pose_indices());
        self.robots.insert(id, robot);
        Ok(id)
    }

    /// Installs a sensor on `robot`. Whether its mounting pose joins the
    /// filter is decided here, once, by `mounting`.
    pub fn add_sensor(
        &mut self,
        robot: RobotId,
        name: impl Into<String>,
        mounting: SensorMounting,
        landmark_model: Arc<dyn LandmarkModel>,
    ) -> Result<SensorId, StateError> {
        let parent = self
            .robots
            .get(&robot)
            .ok_or(StateError::UnknownRobot(robot))?;
        let id = SensorId(self.sensor_ids.next_id());
        let mut sensor = Sensor::new(id, parent, mounting, landmark_model, &self.arena)?;
        sensor.set_name(name);
        debug!(
            "map: added sensor {id} on robot {robot}, global pose over {}",
            sensor.global_pose_indices()
        );
        self.sensors.insert(id, sensor);
        Ok(id)
    }

    pub fn robot(&self, id: RobotId) -> Result<&Robot, StateError> {
        self.robots.get(&id).ok_or(StateError::UnknownRobot(id))
    }

    pub fn robot_mut(&mut self, id: RobotId) -> Result<&mut Robot, StateError> {
        self.robots.get_mut(&id).ok_or(StateError::UnknownRobot(id))
    }

    pub fn sensor(&self, id: SensorId) -> Result<&Sensor, StateError> {
        self.sensors.get(&id).ok_or(StateError::UnknownSensor(id))
    }

    pub fn sensor_mut(&mut self, id: SensorId) -> Result<&mut Sensor, StateError> {
        self.sensors
            .get_mut(&id)
            .ok_or(StateError::UnknownSensor(id))
    }

    pub fn landmark(&self, id: LandmarkId) -> Result<&Landmark, StateError> {
        self.landmarks
            .get(&id)
            .ok_or(StateError::UnknownLandmark(id))
    }

    pub fn landmarks(&self) -> &BTreeMap<LandmarkId, Landmark> {
        &self.landmarks
    }

    /// Moves a sensor onto another robot, rebuilding its global-pose
    /// index set against the new parent's pose slice.
    pub fn relink_sensor(&mut self, sensor: SensorId, robot: RobotId) -> Result<(), StateError> {
        let parent = self
            .robots
            .get(&robot)
            .ok_or(StateError::UnknownRobot(robot))?;
        self.sensors
            .get_mut(&sensor)
            .ok_or(StateError::UnknownSensor(sensor))?
            .link_to_robot(parent)
    }

    /// Global pose of a sensor, resolving the parent robot through the
    /// registry. See `Sensor::global_pose` for the Jacobian contract.
    pub fn sensor_global_pose(
        &self,
        id: SensorId,
    ) -> Result<(PoseVector, DMatrix<f64>), StateError> {
        let sensor = self.sensor(id)?;
        let robot = self.robot(sensor.robot_id())?;
        sensor.global_pose(robot)
    }

    /// One processing cycle for `sensor`: revisit every known observation,
    /// then discover at most one new landmark if the state budget allows.
    ///
    /// Returns the id of the landmark created this cycle, if any. Running
    /// out of state is not an error; the next cycle simply retries.
    pub fn process_raw(&mut self, sensor_id: SensorId) -> Result<Option<LandmarkId>, StateError> {
        let sensor = self
            .sensors
            .get_mut(&sensor_id)
            .ok_or(StateError::UnknownSensor(sensor_id))?;
        for observation in sensor.observations_mut().values_mut() {
            observation.revisit();
            trace!(
                "sensor {sensor_id}: revisiting landmark {} (revisit {})",
                observation.landmark(),
                observation.revisits()
            );
        }
        self.discover_new_landmark(sensor_id)
    }

    /// The discovery half of the cycle. Budget check and reservation run
    /// under a single arena write guard; a reservation failure after a
    /// positive budget check cannot happen and would propagate as the bug
    /// it is.
    fn discover_new_landmark(
        &mut self,
        sensor_id: SensorId,
    ) -> Result<Option<LandmarkId>, StateError> {
        let model = Arc::clone(
            self.sensors
                .get(&sensor_id)
                .ok_or(StateError::UnknownSensor(sensor_id))?
                .landmark_model(),
        );
        let size = model.state_size();

        let handle = {
            let mut arena = write_arena(&self.arena);
            if !arena.unused_states(size) {
                trace!("sensor {sensor_id}: no room for a new {} landmark", model.kind());
                return Ok(None);
            }
            arena.reserve(size)?
        };

        let id = LandmarkId(self.landmark_ids.next_id());
        let landmark = Landmark::new(id, sensor_id, self.arena.clone(), handle, &model);
        debug!(
            "sensor {sensor_id}: added landmark {id} ({}, {} cells at {})",
            model.kind(),
            size,
            handle.offset()
        );
        self.landmarks.insert(id, landmark);

        self.sensors
            .get_mut(&sensor_id)
            .ok_or(StateError::UnknownSensor(sensor_id))?
            .link_to_observation(Observation::new(id, sensor_id));
        Ok(Some(id))
    }

    /// Evicts a landmark: drops it from the registry (releasing its state
    /// slice) and removes the matching observation from every sensor.
    /// Which landmark to evict, and when, is the caller's policy.
    pub fn remove_landmark(&mut self, id: LandmarkId) -> Result<(), StateError> {
        let landmark = self
            .landmarks
            .remove(&id)
            .ok_or(StateError::UnknownLandmark(id))?;
        // Strip the views before the slice is released so no observation
        // can outlive the state it refers to.
        for sensor in self.sensors.values_mut() {
            sensor.observations_mut().remove(&id);
        }
        debug!(
            "map: evicted landmark {id} ({} cells)",
            landmark.state_indices().size()
        );
        drop(landmark);
        Ok(())
    }
}
