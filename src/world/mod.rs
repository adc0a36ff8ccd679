pub mod cell;
pub mod entity;
pub mod events;
pub mod generation;
pub mod genome;
pub mod record;
pub mod registry;
pub mod spatial;
pub mod topology;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::generation::WorldParams;
pub use cell::Cell;
pub use entity::{Body, Entity, EntityId, EntityKind};
pub use events::WorldEvent;
pub use genome::{Color, Genome};
pub use record::{EntityRecord, LoadError, WorldRecord};
pub use registry::EntityRegistry;
pub use spatial::PlacementError;
pub use topology::{Bounds, Coord, Orientation};

/// Global environment switches and constants, adjustable while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub sun: bool,
    pub entropy: bool,
    pub geyser: bool,
    pub rain: bool,
    pub sun_level: u32,
    pub energy_cap: u32,
    pub rain_energy: u32,
    pub geyser_production: u32,
}

impl Environment {
    pub fn from_params(params: &WorldParams) -> Self {
        Environment {
            sun: params.sun,
            entropy: params.entropy,
            geyser: params.geyser,
            rain: params.rain,
            sun_level: params.sun_level,
            energy_cap: params.energy_cap,
            rain_energy: params.rain_energy,
            geyser_production: params.geyser_production,
        }
    }
}

/// Births and deaths since the counters were last taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounters {
    pub births: u64,
    pub deaths: u64,
}

/// The single authoritative world: entity arena, spatial index, environment,
/// and the random source every draw goes through.
#[derive(Debug, Clone)]
pub struct World {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub tick_count: u64,
    pub params: WorldParams,
    pub environment: Environment,
    pub registry: EntityRegistry,
    pub rng: ChaCha8Rng,
    pub counters: TickCounters,
}

impl World {
    /// An empty world with the given bounds and environment.
    ///
    /// If `params.seed` is 0, a random seed is chosen and stored back in
    /// `params` so the run can be reproduced.
    pub fn new(params: &WorldParams) -> World {
        let seed = if params.seed == 0 {
            rand::thread_rng().r#gen()
        } else {
            params.seed
        };
        let params = WorldParams {
            seed,
            ..params.clone()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let id = Uuid::from_bytes(rng.r#gen());

        World {
            id,
            name: format!("World-{}", seed),
            created_at: unix_timestamp(),
            tick_count: 0,
            environment: Environment::from_params(&params),
            registry: EntityRegistry::new(Bounds::new(params.width, params.height)),
            params,
            rng,
            counters: TickCounters::default(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.registry.bounds()
    }

    /// Allocates an id only once `coord` is known to be free, so a refused
    /// spawn never leaves a gap in the id sequence.
    fn spawn(
        &mut self,
        coord: Coord,
        build: impl FnOnce(EntityId) -> Entity,
    ) -> Result<EntityId, PlacementError> {
        self.registry.check_vacant(coord)?;
        let id = self.registry.allocate_id();
        self.registry.register(build(id))
    }

    pub fn spawn_rock(&mut self, coord: Coord) -> Result<EntityId, PlacementError> {
        self.spawn(coord, |id| Entity::rock(id, coord))
    }

    pub fn spawn_energy(&mut self, coord: Coord, energy: u32) -> Result<EntityId, PlacementError> {
        self.spawn(coord, |id| Entity::energy(id, coord, energy))
    }

    pub fn spawn_geyser(&mut self, coord: Coord) -> Result<EntityId, PlacementError> {
        self.spawn(coord, |id| Entity::geyser(id, coord, 0))
    }

    pub fn spawn_cell(&mut self, coord: Coord, cell: Cell) -> Result<EntityId, PlacementError> {
        self.spawn(coord, |id| Entity::cell(id, coord, cell))
    }

    /// Marks an entity removed; see [`EntityRegistry::mark_removed`].
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.registry.mark_removed(id)
    }

    pub fn random_coord(&mut self) -> Coord {
        let max = self.bounds().max_coord();
        Coord::new(
            self.rng.gen_range(0..=max.x),
            self.rng.gen_range(0..=max.y),
        )
    }

    /// A cell with a fully random genome, color and orientation.
    pub fn random_cell(&mut self) -> Cell {
        let genome = Genome::random(&mut self.rng);
        let color = Color::random(&mut self.rng);
        let orientation = Orientation::wrapping(self.rng.gen_range(0..Orientation::COUNT));
        Cell::new(
            genome,
            color,
            self.params.initial_cell_energy,
            orientation,
            None,
        )
    }

    pub fn toggle_sun(&mut self) -> bool {
        self.environment.sun = !self.environment.sun;
        self.environment.sun
    }

    pub fn toggle_entropy(&mut self) -> bool {
        self.environment.entropy = !self.environment.entropy;
        self.environment.entropy
    }

    pub fn toggle_geyser(&mut self) -> bool {
        self.environment.geyser = !self.environment.geyser;
        self.environment.geyser
    }

    pub fn toggle_rain(&mut self) -> bool {
        self.environment.rain = !self.environment.rain;
        self.environment.rain
    }

    /// Tries `attempts` random tiles, placing a geyser on each empty one.
    /// Returns how many were placed.
    pub fn add_geysers(&mut self, attempts: u32) -> usize {
        let mut placed = 0;
        for _ in 0..attempts {
            let coord = self.random_coord();
            if self.registry.is_vacant(coord) && self.spawn_geyser(coord).is_ok() {
                placed += 1;
            }
        }
        debug!(attempts, placed, "Added geysers");
        placed
    }

    /// Tries `attempts` random tiles, seeding a random cell on each empty one.
    pub fn add_life(&mut self, attempts: u32) -> usize {
        let mut placed = 0;
        for _ in 0..attempts {
            let coord = self.random_coord();
            if !self.registry.is_vacant(coord) {
                continue;
            }
            let cell = self.random_cell();
            if self.spawn_cell(coord, cell).is_ok() {
                placed += 1;
            }
        }
        debug!(attempts, placed, "Added life");
        placed
    }

    pub fn remove_geysers(&mut self) -> usize {
        self.remove_where(|entity| entity.kind() == EntityKind::Geyser)
    }

    /// Removes everything except rocks.
    pub fn clear(&mut self) -> usize {
        self.remove_where(|entity| entity.kind() != EntityKind::Rock)
    }

    fn remove_where(&mut self, predicate: impl Fn(&Entity) -> bool) -> usize {
        let doomed: Vec<EntityId> = self
            .registry
            .active()
            .filter(|entity| predicate(entity))
            .map(|entity| entity.id)
            .collect();
        let removed = doomed.iter().filter(|&&id| self.registry.mark_removed(id)).count();
        self.registry.reconcile();
        removed
    }

    /// Places a cell built from a saved sample: random orientation, full energy.
    pub fn place_sample(
        &mut self,
        coord: Coord,
        color: Color,
        genome: Genome,
    ) -> Result<EntityId, PlacementError> {
        let orientation = Orientation::wrapping(self.rng.gen_range(0..Orientation::COUNT));
        let cell = Cell::new(genome, color, None, orientation, None);
        self.spawn_cell(coord, cell)
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.registry.drain_events()
    }

    /// Returns and resets the birth/death counters.
    pub fn take_counters(&mut self) -> TickCounters {
        std::mem::take(&mut self.counters)
    }

    pub fn live_cells(&self) -> usize {
        self.registry
            .active()
            .filter(|entity| entity.kind() == EntityKind::Cell)
            .count()
    }

    /// Energy held by every active cell, packet and geyser.
    pub fn total_energy(&self) -> u64 {
        self.registry
            .active()
            .filter_map(|entity| entity.energy_level())
            .map(u64::from)
            .sum()
    }

    /// Replaces this world with one loaded from `record`. On error the
    /// current state is left untouched.
    pub fn restore(&mut self, record: WorldRecord) -> Result<(), LoadError> {
        let restored = World::from_record(record)?;
        *self = restored;
        Ok(())
    }
}

pub(crate) fn unix_timestamp() -> String {
    format!(
        "{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    )
}
