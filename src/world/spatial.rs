use thiserror::Error;

use crate::world::entity::EntityId;
use crate::world::topology::{Bounds, Coord};

/// Why an entity could not be put on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("coordinate {0} is outside the grid")]
    OutOfBounds(Coord),
    #[error("coordinate {coord} is already occupied by entity {occupant}")]
    Occupied { coord: Coord, occupant: EntityId },
}

/// Direct-addressed coordinate → occupant map. One slot per tile, so every
/// lookup is a single index computation; nothing ever scans the grid.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    bounds: Bounds,
    slots: Vec<Option<EntityId>>,
}

impl SpatialIndex {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            slots: vec![None; bounds.area()],
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn occupant_at(&self, coord: Coord) -> Option<EntityId> {
        self.bounds.slot(coord).and_then(|i| self.slots[i])
    }

    /// True for an in-bounds tile with no occupant.
    pub fn is_vacant(&self, coord: Coord) -> bool {
        matches!(self.bounds.slot(coord), Some(i) if self.slots[i].is_none())
    }

    /// The slot for `coord`, if it is on the grid and empty.
    pub fn check_vacant(&self, coord: Coord) -> Result<usize, PlacementError> {
        let slot = self
            .bounds
            .slot(coord)
            .ok_or(PlacementError::OutOfBounds(coord))?;
        match self.slots[slot] {
            Some(occupant) => Err(PlacementError::Occupied { coord, occupant }),
            None => Ok(slot),
        }
    }

    pub fn place(&mut self, coord: Coord, id: EntityId) -> Result<(), PlacementError> {
        let slot = self.check_vacant(coord)?;
        self.slots[slot] = Some(id);
        Ok(())
    }

    /// Clears a tile, returning whoever was there.
    pub fn vacate(&mut self, coord: Coord) -> Option<EntityId> {
        let slot = self.bounds.slot(coord)?;
        self.slots[slot].take()
    }

    /// Moves the occupant of `from` onto the empty tile `to`.
    pub fn relocate(&mut self, from: Coord, to: Coord) -> Result<EntityId, PlacementError> {
        let id = self
            .occupant_at(from)
            .ok_or(PlacementError::OutOfBounds(from))?;
        self.place(to, id)?;
        self.vacate(from);
        Ok(id)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
