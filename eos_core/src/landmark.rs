// eos_core/src/landmark.rs

use crate::arena::{SharedArena, SliceHandle};
use crate::entity::MapObject;
use crate::gaussian::Gaussian;
use crate::indices::IndexSet;
use crate::types::{LandmarkId, ObjectCategory, SensorId};
use std::fmt::Debug;
use std::sync::Arc;

/// Size/identity contract of a concrete landmark parametrization.
///
/// The geometry itself (anchored homogeneous point, inverse depth, ...)
/// lives outside this core; discovery only needs to know how many state
/// cells one instance occupies.
pub trait LandmarkModel: Debug + Send + Sync {
    /// State cells required by one landmark instance.
    fn state_size(&self) -> usize;

    /// Short tag naming the parametrization, for logs and dumps.
    fn kind(&self) -> &'static str;
}

/// An estimated map feature. Its state lives entirely in the shared arena;
/// dropping the landmark (map eviction) releases the slice.
#[derive(Debug)]
pub struct Landmark {
    base: MapObject,
    state: Gaussian,
    kind: &'static str,
    /// Sensor whose discovery cycle created this landmark.
    origin: SensorId,
}

impl Landmark {
    pub(crate) fn new(
        id: LandmarkId,
        origin: SensorId,
        arena: SharedArena,
        handle: SliceHandle,
        model: &Arc<dyn LandmarkModel>,
    ) -> Self {
        let base = MapObject::with_slice(id.0, ObjectCategory::Landmark, arena.clone(), handle);
        let state = Gaussian::remote(arena, base.state_indices());
        Landmark {
            base,
            state,
            kind: model.kind(),
            origin,
        }
    }

    pub fn id(&self) -> LandmarkId {
        LandmarkId(self.base.id())
    }

    pub fn name(&self) -> Option<&str> {
        self.base.name()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.base.set_name(name);
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn origin_sensor(&self) -> SensorId {
        self.origin
    }

    pub fn state(&self) -> &Gaussian {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Gaussian {
        &mut self.state
    }

    pub fn state_indices(&self) -> IndexSet {
        self.base.state_indices()
    }
}

/// Per-(sensor, landmark) tracking record, keyed by landmark id in the
/// sensor's observation table. The matching/update logic that fills it is
/// an external collaborator; this core only tracks identity and revisits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    landmark: LandmarkId,
    sensor: SensorId,
    revisits: u64,
}

impl Observation {
    pub fn new(landmark: LandmarkId, sensor: SensorId) -> Self {
        Observation {
            landmark,
            sensor,
            revisits: 0,
        }
    }

    pub fn landmark(&self) -> LandmarkId {
        self.landmark
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    /// Times this observation was revisited by `process_raw`.
    pub fn revisits(&self) -> u64 {
        self.revisits
    }

    pub(crate) fn revisit(&mut self) {
        self.revisits += 1;
    }
}
