pub mod environment;
pub mod interpreter;
pub mod statistics;

use std::time::Instant;

use tracing::warn;

use crate::simulation::interpreter::CellOutcome;
use crate::simulation::statistics::TickStatistics;
use crate::world::entity::EntityKind;
use crate::world::{World, WorldEvent};

/// Result of executing a single tick.
#[derive(Debug)]
pub struct TickResult {
    pub statistics: TickStatistics,
    /// Visible changes made during the tick, in the order they happened.
    pub events: Vec<WorldEvent>,
}

/// Execute a single simulation tick on the world.
///
/// Every entity registered when the tick starts acts once, in identifier
/// order; offspring and packets spawned during the sweep wait for the next
/// tick. Then rain falls, deferred removals are purged, and statistics are
/// computed.
pub fn execute_tick(world: &mut World) -> TickResult {
    let tick_start = Instant::now();
    world.tick_count += 1;

    let mut live_cells = 0_u32;
    let mut inert_objects = 0_u32;

    for id in world.registry.ids() {
        let Some(entity) = world.registry.get(id) else {
            continue;
        };
        if entity.inactive {
            continue;
        }
        match entity.kind() {
            EntityKind::Cell => {
                if !matches!(
                    interpreter::tick_cell(world, id),
                    CellOutcome::Died | CellOutcome::Idle
                ) {
                    live_cells += 1;
                }
            }
            EntityKind::Energy => {
                inert_objects += 1;
                environment::tick_energy(world, id);
            }
            EntityKind::Geyser => {
                inert_objects += 1;
                environment::tick_geyser(world, id);
            }
            EntityKind::Rock => {}
        }
    }

    if world.environment.rain {
        environment::rain(world);
    }
    world.registry.reconcile();

    let counters = world.take_counters();
    let tick_duration = tick_start.elapsed().as_secs_f32() * 1000.0;
    let statistics = statistics::compute_statistics(
        world,
        live_cells,
        inert_objects,
        counters,
        tick_duration,
    );

    if counters.deaths > 0 && statistics.kind_counts.get(&EntityKind::Cell).is_none() {
        warn!(
            tick = world.tick_count,
            deaths = counters.deaths,
            "Population extinct"
        );
    }

    TickResult {
        statistics,
        events: world.drain_events(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::WorldParams;
    use crate::world::cell::Cell;
    use crate::world::genome::*;
    use crate::world::topology::{Coord, Orientation};

    fn quiet_world(width: u32, height: u32) -> World {
        let mut world = World::new(&WorldParams {
            seed: 9,
            width,
            height,
            initial_cells: 0,
            geyser_count: 0,
            ..WorldParams::default()
        });
        world.environment.rain = false;
        world
    }

    fn mover(energy: u32) -> Cell {
        let genome = Genome::filled(99)
            .with_gene(0, 0)
            .with_gene(START_GENE, 0)
            .with_gene(LIFESPAN_GENE, 10)
            .with_gene(MAX_ENERGY_GENE, 100)
            .with_gene(MIN_ENERGY_GENE, 0)
            .with_gene(DIVISION_THRESHOLD_GENE, 100)
            .with_gene(MUTATION_RATE_GENE, 0);
        Cell::new(genome, Color::rgb(120, 120, 120), Some(energy), Orientation::wrapping(3), None)
    }

    #[test]
    fn tick_advances_count_and_reports_events() {
        let mut world = quiet_world(6, 6);
        let id = world.spawn_cell(Coord::new(1, 1), mover(100)).unwrap();
        world.drain_events();

        let result = execute_tick(&mut world);
        assert_eq!(world.tick_count, 1);
        assert_eq!(result.statistics.tick, 1);
        assert_eq!(result.statistics.live_cells, 1);
        assert_eq!(
            result.events,
            vec![WorldEvent::Moved {
                id,
                from: Coord::new(1, 1),
                to: Coord::new(2, 1)
            }]
        );
    }

    #[test]
    fn removals_are_purged_after_the_sweep() {
        let mut world = quiet_world(6, 6);
        let packet = world.spawn_energy(Coord::new(3, 3), 1).unwrap();
        let result = execute_tick(&mut world);
        assert!(world.registry.get(packet).is_none());
        assert_eq!(world.registry.pending_removals(), 0);
        assert_eq!(result.statistics.inert_objects, 1);
    }

    #[test]
    fn rain_adds_a_packet_when_enabled() {
        let mut world = quiet_world(6, 6);
        world.environment.rain = true;
        world.environment.entropy = false;
        let mut packets = 0;
        for _ in 0..20 {
            execute_tick(&mut world);
            packets = world.registry.len();
        }
        assert!(packets > 0);
    }

    #[test]
    fn death_counts_and_extinction() {
        let mut world = quiet_world(6, 6);
        let mut cell = mover(100);
        cell.ttl = 0;
        world.spawn_cell(Coord::new(2, 2), cell).unwrap();
        let result = execute_tick(&mut world);
        assert_eq!(result.statistics.deaths, 1);
        assert_eq!(result.statistics.live_cells, 0);
        assert_eq!(result.statistics.kind_counts[&EntityKind::Energy], 1);
    }

    #[test]
    fn offspring_wait_for_next_tick() {
        let mut world = quiet_world(3, 3);
        world.environment.sun = false;
        let genome = Genome::filled(11)
            .with_gene(START_GENE, 0)
            .with_gene(LIFESPAN_GENE, 10)
            .with_gene(MAX_ENERGY_GENE, 100)
            .with_gene(MIN_ENERGY_GENE, 0)
            .with_gene(DIVISION_SHARE_GENE, 50)
            .with_gene(DIVISION_THRESHOLD_GENE, 0)
            .with_gene(MUTATION_RATE_GENE, 0);
        let cell = Cell::new(genome, Color::rgb(99, 99, 99), Some(900), Orientation::wrapping(0), None);
        world.spawn_cell(Coord::new(1, 1), cell).unwrap();

        let result = execute_tick(&mut world);
        assert_eq!(result.statistics.births, 1);
        assert_eq!(result.statistics.live_cells, 1);
        assert_eq!(result.statistics.kind_counts[&EntityKind::Cell], 2);
    }
}
