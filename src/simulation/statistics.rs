use std::collections::HashMap;

use serde::Serialize;

use crate::simulation::interpreter::Opcode;
use crate::world::entity::{Body, EntityKind};
use crate::world::genome::Color;
use crate::world::{TickCounters, World};

/// Per-tick aggregate metrics for introspection and collapse detection.
#[derive(Debug, Clone, Serialize)]
pub struct TickStatistics {
    pub tick: u64,
    /// Cells that survived their pre-checks this tick.
    pub live_cells: u32,
    /// Energy packets and geysers that ticked.
    pub inert_objects: u32,
    pub kind_counts: HashMap<EntityKind, u32>,
    pub total_energy: u64,
    pub births: u64,
    pub deaths: u64,
    pub mean_cell_energy: f32,
    /// How many tape genes across all cells decode to each instruction.
    pub instruction_distribution: HashMap<Opcode, u32>,
    pub lineage_diversity: f32,
    pub tick_duration_ms: f32,
}

/// Compute statistics for the current world state after a tick.
pub fn compute_statistics(
    world: &World,
    live_cells: u32,
    inert_objects: u32,
    counters: TickCounters,
    tick_duration_ms: f32,
) -> TickStatistics {
    let mut kind_counts: HashMap<EntityKind, u32> = HashMap::new();
    let mut instruction_distribution: HashMap<Opcode, u32> = HashMap::new();
    let mut lineages: HashMap<Color, u32> = HashMap::new();
    let mut total_energy = 0_u64;
    let mut cell_energy = 0_u64;
    let mut cell_count = 0_u32;

    for entity in world.registry.active() {
        *kind_counts.entry(entity.kind()).or_insert(0) += 1;
        total_energy += entity.energy_level().map(u64::from).unwrap_or(0);
        if let Body::Cell(cell) = &entity.body {
            cell_count += 1;
            cell_energy += u64::from(cell.energy);
            *lineages.entry(cell.color).or_insert(0) += 1;
            for op in cell.genome.tape().iter().filter_map(|&g| Opcode::decode(g)) {
                *instruction_distribution.entry(op).or_insert(0) += 1;
            }
        }
    }

    let mean_cell_energy = if cell_count == 0 {
        0.0
    } else {
        (cell_energy as f64 / cell_count as f64) as f32
    };

    TickStatistics {
        tick: world.tick_count,
        live_cells,
        inert_objects,
        kind_counts,
        total_energy,
        births: counters.births,
        deaths: counters.deaths,
        mean_cell_energy,
        instruction_distribution,
        lineage_diversity: shannon_diversity(&lineages, cell_count),
        tick_duration_ms,
    }
}

/// Shannon diversity over cell colors, normalized to [0, 1].
/// 0 = a single lineage, 1 = every lineage present equally.
fn shannon_diversity(distribution: &HashMap<Color, u32>, total: u32) -> f32 {
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    let mut entropy = 0.0_f64;
    let mut non_zero_types = 0_u32;

    for &count in distribution.values() {
        if count > 0 {
            non_zero_types += 1;
            let p = count as f64 / total_f;
            entropy -= p * p.ln();
        }
    }

    if non_zero_types <= 1 {
        return 0.0;
    }

    let max_entropy = (non_zero_types as f64).ln();
    (entropy / max_entropy) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::WorldParams;
    use crate::world::cell::Cell;
    use crate::world::genome::Genome;
    use crate::world::topology::{Coord, Orientation};

    fn make_test_world() -> World {
        World::new(&WorldParams {
            seed: 42,
            width: 8,
            height: 8,
            initial_cells: 0,
            geyser_count: 0,
            ..WorldParams::default()
        })
    }

    fn add_cell(world: &mut World, x: i32, color: Color, energy: u32, genome: Genome) {
        let cell = Cell::new(genome, color, Some(energy), Orientation::wrapping(0), None);
        world.spawn_cell(Coord::new(x, 1), cell).unwrap();
    }

    #[test]
    fn counts_and_energy_totals() {
        let mut world = make_test_world();
        world.spawn_rock(Coord::new(0, 0)).unwrap();
        world.spawn_energy(Coord::new(1, 0), 40).unwrap();
        world.spawn_geyser(Coord::new(2, 0)).unwrap();
        add_cell(&mut world, 0, Color::rgb(90, 90, 90), 100, Genome::filled(50));
        add_cell(&mut world, 1, Color::rgb(90, 90, 90), 300, Genome::filled(50));

        let counters = TickCounters { births: 2, deaths: 1 };
        let stats = compute_statistics(&world, 2, 2, counters, 10.0);

        assert_eq!(stats.kind_counts[&EntityKind::Rock], 1);
        assert_eq!(stats.kind_counts[&EntityKind::Cell], 2);
        assert_eq!(stats.total_energy, 440);
        assert!((stats.mean_cell_energy - 200.0).abs() < 0.01);
        assert_eq!(stats.births, 2);
        assert_eq!(stats.deaths, 1);
        assert!((stats.tick_duration_ms - 10.0).abs() < 0.01);
    }

    #[test]
    fn instruction_distribution_reads_tape_only() {
        let mut world = make_test_world();
        let genome = Genome::filled(50).with_gene(0, 0).with_gene(1, 0).with_gene(105, 0);
        add_cell(&mut world, 0, Color::rgb(90, 90, 90), 100, genome);

        let stats = compute_statistics(&world, 1, 0, TickCounters::default(), 1.0);
        assert_eq!(stats.instruction_distribution[&Opcode::Move], 2);
        assert_eq!(stats.instruction_distribution.len(), 1);
    }

    #[test]
    fn single_lineage_has_zero_diversity() {
        let mut world = make_test_world();
        for x in 0..4 {
            add_cell(&mut world, x, Color::rgb(200, 100, 100), 100, Genome::filled(50));
        }
        let stats = compute_statistics(&world, 4, 0, TickCounters::default(), 1.0);
        assert_eq!(stats.lineage_diversity, 0.0);
    }

    #[test]
    fn equal_lineages_have_full_diversity() {
        let mut world = make_test_world();
        for x in 0..4 {
            add_cell(&mut world, x, Color::rgb(100 + x as u8, 100, 100), 100, Genome::filled(50));
        }
        let stats = compute_statistics(&world, 4, 0, TickCounters::default(), 1.0);
        assert!((stats.lineage_diversity - 1.0).abs() < 0.01);
    }

    #[test]
    fn empty_world_returns_zeroed_stats() {
        let world = make_test_world();
        let stats = compute_statistics(&world, 0, 0, TickCounters::default(), 0.0);
        assert_eq!(stats.total_energy, 0);
        assert_eq!(stats.mean_cell_energy, 0.0);
        assert_eq!(stats.lineage_diversity, 0.0);
        assert!(stats.kind_counts.is_empty());
    }
}
