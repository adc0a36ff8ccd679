use std::collections::HashMap;

use tracing::debug;

use crate::config::generation::WorldParams;
use crate::world::entity::EntityKind;
use crate::world::World;

/// Generate a new world from the given parameters.
///
/// Every boundary tile gets a rock, then `geyser_count` geysers and
/// `initial_cells` random cells are placed on distinct empty tiles. If the
/// interior fills up, placement stops early. If `params.seed` is 0, a random
/// seed is chosen and stored in the returned world's `params`.
pub fn generate_world(params: &WorldParams) -> World {
    let mut world = World::new(params);

    for coord in world.bounds().perimeter() {
        // The ring has no duplicates and the grid starts empty.
        let _ = world.spawn_rock(coord);
    }

    let interior = world.bounds().area().saturating_sub(world.registry.len());
    let geysers = (params.geyser_count as usize).min(interior);
    let cells = (params.initial_cells as usize).min(interior - geysers);

    let mut placed_geysers = 0;
    while placed_geysers < geysers {
        let coord = world.random_coord();
        if world.registry.is_vacant(coord) && world.spawn_geyser(coord).is_ok() {
            placed_geysers += 1;
        }
    }

    let mut placed_cells = 0;
    while placed_cells < cells {
        let coord = world.random_coord();
        if !world.registry.is_vacant(coord) {
            continue;
        }
        let cell = world.random_cell();
        if world.spawn_cell(coord, cell).is_ok() {
            placed_cells += 1;
        }
    }

    debug!(
        seed = world.params.seed,
        geysers = placed_geysers,
        cells = placed_cells,
        "World generated"
    );
    world.drain_events();
    world
}

/// Print a summary of the generated world.
pub fn print_world_summary(world: &World) {
    println!("=== World Summary ===");
    println!("Name: {}", world.name);
    println!("Size: {}x{}", world.params.width, world.params.height);
    println!("Seed: {}", world.params.seed);
    println!("Tick: {}", world.tick_count);

    let mut counts: HashMap<EntityKind, u32> = HashMap::new();
    for entity in world.registry.active() {
        *counts.entry(entity.kind()).or_insert(0) += 1;
    }
    let area = world.bounds().area().max(1) as f32;
    println!("\nEntities:");
    for kind in EntityKind::all() {
        let count = counts.get(kind).copied().unwrap_or(0);
        let pct = count as f32 / area * 100.0;
        println!("  {:<8} {:>7} ({:.1}%)", kind.to_string(), count, pct);
    }

    println!("\nTotal energy: {}", world.total_energy());
    let env = &world.environment;
    println!(
        "Environment: sun={} (level {}), entropy={}, geyser={}, rain={}, cap={}",
        env.sun, env.sun_level, env.entropy, env.geyser, env.rain, env.energy_cap
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::topology::Coord;

    fn default_params() -> WorldParams {
        WorldParams {
            seed: 42,
            width: 30,
            height: 20,
            initial_cells: 100,
            geyser_count: 5,
            ..WorldParams::default()
        }
    }

    fn count(world: &World, kind: EntityKind) -> usize {
        world.registry.active().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn perimeter_is_walled() {
        let world = generate_world(&default_params());
        for coord in world.bounds().perimeter() {
            assert_eq!(
                world.registry.entity_at(coord).map(|e| e.kind()),
                Some(EntityKind::Rock),
                "no rock at {coord}"
            );
        }
        assert_eq!(count(&world, EntityKind::Rock), 2 * 30 + 2 * 20 - 4);
    }

    #[test]
    fn seeds_requested_population() {
        let world = generate_world(&default_params());
        assert_eq!(count(&world, EntityKind::Cell), 100);
        assert_eq!(count(&world, EntityKind::Geyser), 5);
        assert_eq!(world.registry.occupied_tiles(), world.registry.len());
    }

    #[test]
    fn seeded_cells_are_in_range() {
        let world = generate_world(&default_params());
        for entity in world.registry.active() {
            if let Some(cell) = entity.as_cell() {
                assert!(cell.color.r >= 80 && cell.color.g >= 80 && cell.color.b >= 80);
                assert!(cell.genome.gene(100) < 100);
                assert_eq!(cell.energy, cell.max_energy);
            }
        }
    }

    #[test]
    fn initial_energy_override() {
        let params = WorldParams {
            initial_cell_energy: Some(321),
            ..default_params()
        };
        let world = generate_world(&params);
        assert!(world
            .registry
            .active()
            .filter_map(|e| e.as_cell())
            .all(|c| c.energy == 321));
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_world(&default_params());
        let b = generate_world(&default_params());
        let coords = |w: &World| -> Vec<Coord> {
            w.registry
                .active()
                .filter(|e| e.kind() == EntityKind::Cell)
                .map(|e| e.coord)
                .collect()
        };
        assert_eq!(coords(&a), coords(&b));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn crowded_grid_stops_when_full() {
        let params = WorldParams {
            seed: 1,
            width: 4,
            height: 4,
            initial_cells: 16,
            geyser_count: 0,
            ..WorldParams::default()
        };
        let world = generate_world(&params);
        assert_eq!(count(&world, EntityKind::Cell), 4);
    }

    #[test]
    fn seed_zero_generates_random() {
        let params = WorldParams {
            seed: 0,
            ..default_params()
        };
        let world = generate_world(&params);
        assert_ne!(world.params.seed, 0);
    }

    #[test]
    fn generated_world_has_no_pending_events() {
        let mut world = generate_world(&default_params());
        assert!(world.drain_events().is_empty());
    }
}
