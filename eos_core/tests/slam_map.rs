// eos_core/tests/slam_map.rs
//
// Scenario tests for the map registry, sensor binding, and landmark
// discovery cycle.

use approx::assert_relative_eq;
use eos_core::prelude::*;
use nalgebra::{DVector, Vector3};
use std::sync::Arc;

/// Six-cell point parametrization standing in for a real landmark geometry.
#[derive(Debug)]
struct PointLandmark;

impl LandmarkModel for PointLandmark {
    fn state_size(&self) -> usize {
        6
    }

    fn kind(&self) -> &'static str {
        "point6"
    }
}

fn point_model() -> Arc<dyn LandmarkModel> {
    Arc::new(PointLandmark)
}

fn tilted_pose() -> PoseVector {
    let axis = Vector3::new(0.2, 1.0, -0.4).normalize();
    let half = 0.3_f64;
    PoseVector::from_column_slice(&[
        2.0,
        -1.0,
        0.5,
        half.cos(),
        half.sin() * axis[0],
        half.sin() * axis[1],
        half.sin() * axis[2],
    ])
}

fn mounting_pose() -> PoseVector {
    PoseVector::from_column_slice(&[0.1, 0.0, 0.3, 1.0, 0.0, 0.0, 0.0])
}

#[test]
fn local_mounting_yields_a_7x7_jacobian_over_the_robot_indices() {
    let mut map = SlamMap::new(20);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    let (_, jacobian) = map.sensor_global_pose(sensor).unwrap();
    assert_eq!((jacobian.nrows(), jacobian.ncols()), (7, 7));

    let sen = map.sensor(sensor).unwrap();
    assert_eq!(sen.pose().storage_mode(), StorageMode::Local);
    assert_eq!(
        sen.global_pose_indices(),
        &map.robot(robot).unwrap().pose_indices()
    );
}

#[test]
fn in_filter_mounting_yields_a_7x14_jacobian_with_the_same_robot_block() {
    let mut map = SlamMap::new(40);
    let robot = map.add_robot("rover").unwrap();
    let fixed = map
        .add_sensor(robot, "cam_fixed", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();
    let estimated = map
        .add_sensor(
            robot,
            "cam_estimated",
            SensorMounting::EstimatedInFilter {
                initial: mounting_pose(),
            },
            point_model(),
        )
        .unwrap();

    // Put the robot somewhere non-trivial so the Jacobians have structure.
    map.robot_mut(robot)
        .unwrap()
        .pose_mut()
        .set_mean(&DVector::from_column_slice(tilted_pose().as_slice()))
        .unwrap();

    let (pose_fixed, j_fixed) = map.sensor_global_pose(fixed).unwrap();
    let (pose_estimated, j_estimated) = map.sensor_global_pose(estimated).unwrap();

    assert_eq!((j_estimated.nrows(), j_estimated.ncols()), (7, 14));
    assert_relative_eq!(pose_fixed, pose_estimated, epsilon = 1e-12);
    // Same robot pose, same mounting pose: the robot block must agree
    // between the two storage modes.
    assert_relative_eq!(
        j_estimated.view((0, 0), (7, 7)).into_owned(),
        j_fixed,
        epsilon = 1e-12
    );

    // The estimated sensor's global pose spans robot and sensor slices.
    let sen = map.sensor(estimated).unwrap();
    assert_eq!(sen.pose().storage_mode(), StorageMode::Remote);
    let expected = map
        .robot(robot)
        .unwrap()
        .pose_indices()
        .union(&sen.pose().indices());
    assert_eq!(sen.global_pose_indices(), &expected);
    assert_eq!(sen.global_pose_indices().size(), 14);
}

#[test]
fn discovery_consumes_the_budget_one_landmark_per_cycle() {
    // Room for the robot pose plus exactly two 6-cell landmarks.
    let mut map = SlamMap::new(7 + 12);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    let first = map.process_raw(sensor).unwrap();
    assert!(first.is_some());
    assert_eq!(map.landmarks().len(), 1);
    assert!(map.unused_states(6));

    let second = map.process_raw(sensor).unwrap();
    assert!(second.is_some());
    assert_eq!(map.landmarks().len(), 2);
    assert!(!map.unused_states(6));

    // Third cycle: no room, no landmark, no error.
    let third = map.process_raw(sensor).unwrap();
    assert_eq!(third, None);
    assert_eq!(map.landmarks().len(), 2);
}

#[test]
fn one_landmark_per_cycle_even_with_plenty_of_room() {
    let mut map = SlamMap::new(100);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    map.process_raw(sensor).unwrap();
    assert_eq!(map.landmarks().len(), 1);
}

#[test]
fn discovery_links_sensor_map_and_observation() {
    let mut map = SlamMap::new(20);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    let id = map.process_raw(sensor).unwrap().expect("budget available");
    let landmark = map.landmark(id).unwrap();
    assert_eq!(landmark.origin_sensor(), sensor);
    assert_eq!(landmark.kind(), "point6");
    assert_eq!(landmark.state_indices().size(), 6);

    let observation = map.sensor(sensor).unwrap().observations()[&id];
    assert_eq!(observation.landmark(), id);
    assert_eq!(observation.sensor(), sensor);
    assert_eq!(observation.revisits(), 0);
}

#[test]
fn known_observations_are_revisited_every_cycle() {
    let mut map = SlamMap::new(7 + 12);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    let first = map.process_raw(sensor).unwrap().unwrap();
    map.process_raw(sensor).unwrap().unwrap();
    map.process_raw(sensor).unwrap();

    // First landmark was revisited in cycles 2 and 3, second in cycle 3.
    let observations = map.sensor(sensor).unwrap().observations();
    assert_eq!(observations[&first].revisits(), 2);
    let second = observations.keys().copied().find(|&k| k != first).unwrap();
    assert_eq!(observations[&second].revisits(), 1);
}

#[test]
fn eviction_frees_the_budget_but_never_the_id() {
    let mut map = SlamMap::new(7 + 12);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();

    let a = map.process_raw(sensor).unwrap().unwrap();
    let b = map.process_raw(sensor).unwrap().unwrap();
    assert!(!map.unused_states(6));

    map.remove_landmark(a).unwrap();
    assert!(map.unused_states(6));
    assert!(map.landmark(a).is_err());
    assert!(!map.sensor(sensor).unwrap().observations().contains_key(&a));

    // The freed cells are reusable, the freed id is not.
    let c = map.process_raw(sensor).unwrap().unwrap();
    assert_ne!(c, a);
    assert_ne!(c, b);
    assert!(c > b);

    let err = map.remove_landmark(a).unwrap_err();
    assert_eq!(err, StateError::UnknownLandmark(a));
}

#[test]
fn landmark_state_is_a_live_view_into_the_arena() {
    let mut map = SlamMap::new(20);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();
    let id = map.process_raw(sensor).unwrap().unwrap();

    let ia = map.landmark(id).unwrap().state_indices();
    let values = DVector::from_row_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    eos_core::arena::write_arena(map.arena())
        .set_mean_at(&ia, &values)
        .unwrap();
    assert_eq!(map.landmark(id).unwrap().state().mean(), values);
}

#[test]
fn calibrated_mounting_carries_covariance_outside_the_filter() {
    let mut map = SlamMap::new(20);
    let robot = map.add_robot("rover").unwrap();
    let covariance = PoseMatrix::identity() * 1e-4;
    let sensor = map
        .add_sensor(
            robot,
            "cam",
            SensorMounting::Calibrated {
                pose: mounting_pose(),
                covariance,
            },
            point_model(),
        )
        .unwrap();

    let sen = map.sensor(sensor).unwrap();
    assert_eq!(sen.pose().storage_mode(), StorageMode::Local);
    let cov = sen.pose().covariance().expect("calibration covariance");
    assert_relative_eq!(cov[(0, 0)], 1e-4, epsilon = 1e-15);
    // Local storage: nothing of this sensor lives in the arena.
    assert!(sen.pose().indices().is_empty());
}

#[test]
fn sensor_dump_names_identity_pose_and_parent() {
    let mut map = SlamMap::new(40);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(
            robot,
            "cam_left",
            SensorMounting::EstimatedInFilter {
                initial: mounting_pose(),
            },
            point_model(),
        )
        .unwrap();

    let dump = map.sensor(sensor).unwrap().to_string();
    assert!(dump.contains("SENSOR"), "{dump}");
    assert!(dump.contains("cam_left"), "{dump}");
    assert!(dump.contains(&format!(".robot: [ {robot} ]")), "{dump}");
    assert!(dump.contains("ia_globalPose"), "{dump}");
    assert!(dump.contains(".pose"), "{dump}");
}

#[test]
fn ids_are_independent_per_category() {
    let mut map = SlamMap::new(40);
    let robot = map.add_robot("rover").unwrap();
    let sensor = map
        .add_sensor(robot, "cam", SensorMounting::Fixed(mounting_pose()), point_model())
        .unwrap();
    let landmark = map.process_raw(sensor).unwrap().unwrap();

    // All three start their own id space at zero.
    assert_eq!(robot, RobotId(0));
    assert_eq!(sensor, SensorId(0));
    assert_eq!(landmark, LandmarkId(0));
}

#[test]
fn relinking_a_sensor_rebuilds_its_index_set() {
    let mut map = SlamMap::new(40);
    let first = map.add_robot("rover_a").unwrap();
    let second = map.add_robot("rover_b").unwrap();
    let sensor = map
        .add_sensor(
            first,
            "cam",
            SensorMounting::EstimatedInFilter {
                initial: mounting_pose(),
            },
            point_model(),
        )
        .unwrap();

    let before = map.sensor(sensor).unwrap().global_pose_indices().clone();

    // Move the sensor to the second robot; the union must now span the
    // second robot's pose cells instead of the first's.
    map.relink_sensor(sensor, second).unwrap();

    let sen = map.sensor(sensor).unwrap();
    assert_eq!(sen.robot_id(), second);
    let expected = map
        .robot(second)
        .unwrap()
        .pose_indices()
        .union(&sen.pose().indices());
    assert_eq!(sen.global_pose_indices(), &expected);
    assert_ne!(sen.global_pose_indices(), &before);
    // Column convention: the first 7 union entries are the parent robot's
    // pose cells, matching the robot block of the 7x14 Jacobian.
    assert_eq!(
        &sen.global_pose_indices().as_slice()[..7],
        map.robot(second).unwrap().pose_indices().as_slice()
    );
}

#[test]
fn relink_rejects_a_robot_allocated_after_the_sensor() {
    let mut map = SlamMap::new(40);
    let first = map.add_robot("rover_a").unwrap();
    let sensor = map
        .add_sensor(
            first,
            "cam",
            SensorMounting::EstimatedInFilter {
                initial: mounting_pose(),
            },
            point_model(),
        )
        .unwrap();
    // Allocated after the sensor, so its pose cells sit above the
    // sensor's slice and can never lead the union.
    let second = map.add_robot("rover_b").unwrap();

    let err = map.relink_sensor(sensor, second).unwrap_err();
    assert_eq!(err, StateError::MisorderedPose);

    // The rejected relink leaves the sensor on its original robot with
    // its original index set.
    let sen = map.sensor(sensor).unwrap();
    assert_eq!(sen.robot_id(), first);
    assert_eq!(
        &sen.global_pose_indices().as_slice()[..7],
        map.robot(first).unwrap().pose_indices().as_slice()
    );
}

#[test]
fn unknown_ids_surface_as_errors() {
    let mut map = SlamMap::new(10);
    assert_eq!(
        map.process_raw(SensorId(9)).unwrap_err(),
        StateError::UnknownSensor(SensorId(9))
    );
    assert_eq!(
        map.sensor_global_pose(SensorId(9)).unwrap_err(),
        StateError::UnknownSensor(SensorId(9))
    );
    assert_eq!(
        map.robot(RobotId(4)).unwrap_err(),
        StateError::UnknownRobot(RobotId(4))
    );
}
