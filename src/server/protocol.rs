use serde::Serialize;
use std::collections::HashMap;

use crate::simulation::statistics::TickStatistics;
use crate::world::{Color, Coord, Entity, EntityId, EntityKind, Environment, World, WorldEvent};

/// Complete world state sent to a client on connect.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub message_type: &'static str,
    pub world_id: String,
    pub name: String,
    pub tick: u64,
    pub width: u32,
    pub height: u32,
    pub environment: Environment,
    pub entities: Vec<EntitySnapshot>,
}

/// What a viewer needs to draw one entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub coord: Coord,
    pub color: Color,
}

/// Per-tick diff sent after each simulation tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickDiff {
    pub message_type: &'static str,
    pub tick: u64,
    pub events: Vec<WorldEvent>,
    pub statistics: TickStatSummary,
}

/// Summary statistics included in tick diffs.
#[derive(Debug, Clone, Serialize)]
pub struct TickStatSummary {
    pub tick: u64,
    pub kind_counts: HashMap<String, u32>,
    pub live_cells: u32,
    pub total_energy: u64,
    pub births: u64,
    pub deaths: u64,
    pub mean_cell_energy: f32,
    pub lineage_diversity: f32,
    pub tick_duration_ms: f32,
}

/// Health endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub tick: u64,
    pub tick_rate: f32,
    pub live_cells: u32,
    pub lineage_diversity: f32,
    pub snapshot_age_ticks: u64,
}

impl WorldSnapshot {
    pub fn from_world(world: &World) -> Self {
        WorldSnapshot {
            message_type: "WorldSnapshot",
            world_id: world.id.to_string(),
            name: world.name.clone(),
            tick: world.tick_count,
            width: world.params.width,
            height: world.params.height,
            environment: world.environment,
            entities: world.registry.active().map(EntitySnapshot::from_entity).collect(),
        }
    }
}

impl EntitySnapshot {
    pub fn from_entity(entity: &Entity) -> Self {
        EntitySnapshot {
            id: entity.id,
            kind: entity.kind(),
            coord: entity.coord,
            color: entity.color(),
        }
    }
}

impl TickDiff {
    pub fn new(statistics: &TickStatistics, events: Vec<WorldEvent>) -> Self {
        TickDiff {
            message_type: "TickDiff",
            tick: statistics.tick,
            events,
            statistics: TickStatSummary::from_statistics(statistics),
        }
    }
}

impl TickStatSummary {
    pub fn from_statistics(stats: &TickStatistics) -> Self {
        TickStatSummary {
            tick: stats.tick,
            kind_counts: stats
                .kind_counts
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            live_cells: stats.live_cells,
            total_energy: stats.total_energy,
            births: stats.births,
            deaths: stats.deaths,
            mean_cell_energy: stats.mean_cell_energy,
            lineage_diversity: stats.lineage_diversity,
            tick_duration_ms: stats.tick_duration_ms,
        }
    }
}
