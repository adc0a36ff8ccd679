use std::collections::HashSet;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::generation::WorldParams;
use crate::world::cell::Cell;
use crate::world::entity::{Body, Entity, EntityId, EntityKind};
use crate::world::genome::{Color, Genome, GenomeError, LAST_ADDRESS};
use crate::world::registry::EntityRegistry;
use crate::world::topology::{Bounds, Coord, Orientation};
use crate::world::{Environment, TickCounters, World};

/// Why a persisted world or entity was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("invalid world parameters: {0}")]
    Params(String),
    #[error("entity {id}: invalid genome: {source}")]
    Genome { id: EntityId, source: GenomeError },
    #[error("entity {id}: {kind} record is missing {field}")]
    MissingField {
        id: EntityId,
        kind: EntityKind,
        field: &'static str,
    },
    #[error("entity {id}: orientation {value} must be 0-7")]
    Orientation { id: EntityId, value: u8 },
    #[error("entity {id}: start address {value} must be 0-100")]
    StartAddress { id: EntityId, value: u8 },
    #[error("entity {id} at {coord} lies outside the {width}x{height} grid")]
    OutOfBounds {
        id: EntityId,
        coord: Coord,
        width: u32,
        height: u32,
    },
    #[error("entity {id} at {coord} overlaps entity {occupant}")]
    DuplicateCoord {
        id: EntityId,
        coord: Coord,
        occupant: EntityId,
    },
    #[error("duplicate entity id {0}")]
    DuplicateId(EntityId),
    #[error("entity id {id} is not below the next id {next_id}")]
    IdBeyondCounter { id: EntityId, next_id: EntityId },
}

/// Persisted form of one entity. Optional fields apply only to the kinds
/// that carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub coord: Coord,
    pub energy: Option<u32>,
    pub color: Option<Color>,
    pub orientation: Option<u8>,
    pub genome_start: Option<u8>,
    /// Ordered genes; position is identity.
    pub genome: Option<Vec<u8>>,
    pub ttl: Option<u32>,
    pub internal_counter: Option<u32>,
    pub internal_counter_criteria: Option<u32>,
}

impl EntityRecord {
    pub fn from_entity(entity: &Entity) -> Self {
        let mut record = EntityRecord {
            id: entity.id,
            kind: entity.kind(),
            coord: entity.coord,
            energy: entity.energy_level(),
            color: None,
            orientation: None,
            genome_start: None,
            genome: None,
            ttl: None,
            internal_counter: None,
            internal_counter_criteria: None,
        };
        if let Some(cell) = entity.as_cell() {
            record.color = Some(cell.color);
            record.orientation = Some(cell.orientation.index() as u8);
            record.genome_start = Some(cell.genome_start);
            record.genome = Some(cell.genome.genes().to_vec());
            record.ttl = Some(cell.ttl);
            record.internal_counter = Some(cell.internal_counter);
            record.internal_counter_criteria = Some(cell.internal_counter_criteria);
        }
        record
    }

    /// Validates the record and builds the entity. Grid placement is checked
    /// by the caller.
    pub fn into_entity(self) -> Result<Entity, LoadError> {
        let id = self.id;
        let body = match self.kind {
            EntityKind::Rock => Body::Rock,
            EntityKind::Energy => Body::Energy {
                energy: self.energy.ok_or(LoadError::MissingField {
                    id,
                    kind: self.kind,
                    field: "energy",
                })?,
            },
            EntityKind::Geyser => Body::Geyser {
                energy: self.energy.unwrap_or(0),
            },
            EntityKind::Cell => Body::Cell(Box::new(self.build_cell()?)),
        };
        Ok(Entity {
            id,
            coord: self.coord,
            inactive: false,
            body,
        })
    }

    fn build_cell(&self) -> Result<Cell, LoadError> {
        let id = self.id;
        let missing = |field| LoadError::MissingField {
            id,
            kind: EntityKind::Cell,
            field,
        };
        let genes = self.genome.as_ref().ok_or_else(|| missing("genome"))?;
        let widened: Vec<i64> = genes.iter().map(|&g| i64::from(g)).collect();
        let genome = Genome::from_genes(&widened)
            .map_err(|source| LoadError::Genome { id, source })?;
        let color = self.color.ok_or_else(|| missing("color"))?;
        let raw_orientation = self.orientation.ok_or_else(|| missing("orientation"))?;
        let orientation = Orientation::try_from(raw_orientation).map_err(|_| {
            LoadError::Orientation {
                id,
                value: raw_orientation,
            }
        })?;
        match self.genome_start {
            Some(start) if start > LAST_ADDRESS => {
                return Err(LoadError::StartAddress { id, value: start });
            }
            _ => {}
        }

        let mut cell = Cell::new(genome, color, self.energy, orientation, self.genome_start);
        if let Some(ttl) = self.ttl {
            cell.ttl = ttl;
        }
        if let Some(counter) = self.internal_counter {
            cell.internal_counter = counter;
        }
        if let Some(criteria) = self.internal_counter_criteria {
            cell.internal_counter_criteria = criteria;
        }
        Ok(cell)
    }
}

/// Persisted form of a whole world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub tick_count: u64,
    pub params: WorldParams,
    pub environment: Environment,
    pub next_entity_id: EntityId,
    pub entities: Vec<EntityRecord>,
}

impl World {
    /// Captures every active entity. Entities marked for removal are skipped.
    pub fn to_record(&self) -> WorldRecord {
        WorldRecord {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            tick_count: self.tick_count,
            params: self.params.clone(),
            environment: self.environment,
            next_entity_id: self.registry.next_id(),
            entities: self.registry.active().map(EntityRecord::from_entity).collect(),
        }
    }

    /// Builds a world from a record, rejecting anything malformed. The random
    /// source is reseeded from entropy.
    pub fn from_record(record: WorldRecord) -> Result<World, LoadError> {
        record.params.validate().map_err(LoadError::Params)?;
        let bounds = Bounds::new(record.params.width, record.params.height);
        let mut registry = EntityRegistry::new(bounds);
        let mut seen = HashSet::new();

        for entity_record in record.entities {
            let id = entity_record.id;
            if id >= record.next_entity_id {
                return Err(LoadError::IdBeyondCounter {
                    id,
                    next_id: record.next_entity_id,
                });
            }
            if !seen.insert(id) {
                return Err(LoadError::DuplicateId(id));
            }
            let entity = entity_record.into_entity()?;
            check_placement(&registry, &entity, bounds)?;
            registry
                .register(entity)
                .map_err(|_| LoadError::DuplicateId(id))?;
        }
        registry.reserve_ids_below(record.next_entity_id);
        registry.drain_events();

        Ok(World {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            tick_count: record.tick_count,
            params: record.params,
            environment: record.environment,
            registry,
            rng: ChaCha8Rng::seed_from_u64(rand::thread_rng().r#gen()),
            counters: TickCounters::default(),
        })
    }
}

fn check_placement(
    registry: &EntityRegistry,
    entity: &Entity,
    bounds: Bounds,
) -> Result<(), LoadError> {
    if !bounds.contains(entity.coord) {
        return Err(LoadError::OutOfBounds {
            id: entity.id,
            coord: entity.coord,
            width: bounds.width,
            height: bounds.height,
        });
    }
    if let Some(occupant) = registry.occupant_at(entity.coord) {
        return Err(LoadError::DuplicateCoord {
            id: entity.id,
            coord: entity.coord,
            occupant,
        });
    }
    Ok(())
}
