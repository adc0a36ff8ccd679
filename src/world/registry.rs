use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::world::entity::{Entity, EntityId};
use crate::world::events::WorldEvent;
use crate::world::spatial::{PlacementError, SpatialIndex};
use crate::world::topology::{Bounds, Coord};

/// Arena of every live entity, keyed by identifier, plus the coordinate index.
///
/// Removal is two-phase: `mark_removed` flags the entity inactive and frees
/// its tile at once, so later lookups in the same sweep see nothing there;
/// `reconcile` purges the flagged records after the sweep.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, Entity>,
    /// Registered identifiers in ascending order; the scheduler's scan order.
    order: Vec<EntityId>,
    index: SpatialIndex,
    next_id: EntityId,
    pending_removal: Vec<EntityId>,
    events: Vec<WorldEvent>,
}

impl EntityRegistry {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            index: SpatialIndex::new(bounds),
            next_id: 0,
            pending_removal: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.index.bounds()
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Raises the id counter so restored identifiers are never handed out again.
    pub fn reserve_ids_below(&mut self, next_id: EntityId) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Adds an entity to the live set and places it on the grid.
    pub fn register(&mut self, entity: Entity) -> Result<EntityId, PlacementError> {
        let id = entity.id;
        self.index.place(entity.coord, id)?;
        self.reserve_ids_below(id + 1);
        match self.order.last() {
            Some(&last) if last > id => {
                let at = self.order.binary_search(&id).unwrap_or_else(|i| i);
                self.order.insert(at, id);
            }
            _ => self.order.push(id),
        }
        self.events.push(WorldEvent::Spawned {
            id,
            kind: entity.kind(),
            coord: entity.coord,
            color: entity.color(),
        });
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Flags an entity inactive and vacates its tile. Returns false if it was
    /// unknown or already removed.
    pub fn mark_removed(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.inactive {
            return false;
        }
        entity.inactive = true;
        let coord = entity.coord;
        if self.index.occupant_at(coord) == Some(id) {
            self.index.vacate(coord);
        }
        self.pending_removal.push(id);
        self.events.push(WorldEvent::Removed { id, coord });
        true
    }

    /// Purges everything marked since the last call. Returns how many went.
    pub fn reconcile(&mut self) -> usize {
        if self.pending_removal.is_empty() {
            return 0;
        }
        let purged: HashSet<EntityId> = self.pending_removal.drain(..).collect();
        for id in &purged {
            self.entities.remove(id);
        }
        self.order.retain(|id| !purged.contains(id));
        debug!(purged = purged.len(), "Reconciled removals");
        purged.len()
    }

    pub fn pending_removals(&self) -> usize {
        self.pending_removal.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Snapshot of registered identifiers in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    pub fn occupant_at(&self, coord: Coord) -> Option<EntityId> {
        self.index.occupant_at(coord)
    }

    pub fn entity_at(&self, coord: Coord) -> Option<&Entity> {
        self.occupant_at(coord).and_then(|id| self.entities.get(&id))
    }

    pub fn is_vacant(&self, coord: Coord) -> bool {
        self.index.is_vacant(coord)
    }

    pub fn check_vacant(&self, coord: Coord) -> Result<(), PlacementError> {
        self.index.check_vacant(coord).map(|_| ())
    }

    /// Moves an occupant to an empty tile, keeping its record in step.
    pub fn relocate(&mut self, from: Coord, to: Coord) -> Result<EntityId, PlacementError> {
        let id = self.index.relocate(from, to)?;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.coord = to;
        }
        self.events.push(WorldEvent::Moved { id, from, to });
        Ok(id)
    }

    /// Takes an entity out of the arena while it acts. Its tile stays
    /// occupied; `checkin` must follow before the sweep ends.
    pub fn checkout(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn checkin(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    /// Entities in identifier order, including ones marked but not yet purged.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Entities that are not marked for removal.
    pub fn active(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.iter().filter(|e| !e.inactive)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn occupied_tiles(&self) -> usize {
        self.index.occupied_count()
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }
}
