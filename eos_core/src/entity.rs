// eos_core/src/entity.rs

use crate::arena::{write_arena, SharedArena, SliceHandle};
use crate::errors::StateError;
use crate::indices::IndexSet;
use crate::types::ObjectCategory;
use log::trace;

/// Monotone id source, one per entity category. Ids are never reused, so a
/// released landmark's id can keep identifying it in downstream logs and
/// association tables without ambiguity.
#[derive(Debug, Default)]
pub struct IdPool {
    next: u64,
}

impl IdPool {
    pub fn new() -> Self {
        IdPool::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Shared identity and arena bookkeeping for every map entity.
///
/// An entity that estimates in the filter reserves its slice here at
/// construction; the slice goes back to the arena's free pool when the
/// entity is dropped. An entity built with `local` never touches the arena.
#[derive(Debug)]
pub struct MapObject {
    id: u64,
    name: Option<String>,
    category: ObjectCategory,
    arena: Option<SharedArena>,
    slice: Option<SliceHandle>,
}

impl MapObject {
    /// An entity with no filter-state reservation.
    pub fn local(id: u64, category: ObjectCategory) -> Self {
        MapObject {
            id,
            name: None,
            category,
            arena: None,
            slice: None,
        }
    }

    /// Reserves `size` contiguous cells for this entity.
    ///
    /// Single allocation attempt; callers gate on `unused_states` first
    /// when "no space" is an expected outcome rather than a bug.
    pub fn reserved(
        id: u64,
        category: ObjectCategory,
        arena: SharedArena,
        size: usize,
    ) -> Result<Self, StateError> {
        let handle = write_arena(&arena).reserve(size)?;
        Ok(MapObject::with_slice(id, category, arena, handle))
    }

    /// Wraps an already-reserved slice. Used where the budget check and the
    /// reservation had to happen under one arena lock (landmark discovery).
    pub fn with_slice(
        id: u64,
        category: ObjectCategory,
        arena: SharedArena,
        handle: SliceHandle,
    ) -> Self {
        MapObject {
            id,
            name: None,
            category,
            arena: Some(arena),
            slice: Some(handle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn category(&self) -> ObjectCategory {
        self.category
    }

    /// Cells reserved in the arena; zero for a purely local entity.
    pub fn reservation_size(&self) -> usize {
        self.slice.map_or(0, |s| s.len())
    }

    /// The state indices this entity occupies. Empty if none reserved.
    pub fn state_indices(&self) -> IndexSet {
        self.slice.map_or_else(IndexSet::empty, |s| s.indices())
    }
}

impl Drop for MapObject {
    fn drop(&mut self) {
        // Unconditional release; remaining Remote views into this slice are
        // the caller's responsibility (documented precondition).
        if let (Some(arena), Some(slice)) = (self.arena.take(), self.slice.take()) {
            trace!(
                "{} {}: releasing {} state cells",
                self.category,
                self.id,
                slice.len()
            );
            write_arena(&arena).release(slice);
        }
    }
}
