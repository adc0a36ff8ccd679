use crate::world::genome::{Color, Genome};
use crate::world::topology::Orientation;

/// Base energy a cell needs before it may divide; gene 106 adds to it.
pub const BASE_DIVISION_ENERGY: u32 = 500;
/// Death floor; gene 104 adds to it.
pub const BASE_MIN_ENERGY: u32 = 10;
/// Initial value of the programmable timer's criteria.
pub const DEFAULT_TIMER_CRITERIA: u32 = 100;

/// A living organism. Parameters derived from the genome are computed once
/// at construction and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub genome: Genome,
    pub color: Color,
    pub energy: u32,
    pub orientation: Orientation,
    pub genome_start: u8,
    pub ttl: u32,
    pub max_energy: u32,
    pub min_energy: u32,
    pub min_energy_division: u32,
    pub breed_cost: u32,
    pub instruction_pointer: u8,
    pub internal_counter: u32,
    pub internal_counter_criteria: u32,
}

impl Cell {
    /// Builds a cell from its genome. `energy` defaults to the cell's own
    /// maximum and `genome_start` to gene 101.
    pub fn new(
        genome: Genome,
        color: Color,
        energy: Option<u32>,
        orientation: Orientation,
        genome_start: Option<u8>,
    ) -> Self {
        let max_energy = genome.max_energy_multiplier() as u32 * 10;
        let min_energy_division = BASE_DIVISION_ENERGY + genome.division_threshold_offset() as u32;
        let start = genome_start.unwrap_or_else(|| genome.start_address());
        Cell {
            ttl: genome.lifespan_multiplier() as u32 * 10,
            min_energy: BASE_MIN_ENERGY + genome.min_energy_offset() as u32,
            breed_cost: min_energy_division / 3,
            energy: energy.unwrap_or(max_energy),
            instruction_pointer: start,
            genome_start: start,
            max_energy,
            min_energy_division,
            internal_counter: 0,
            internal_counter_criteria: DEFAULT_TIMER_CRITERIA,
            orientation,
            color,
            genome,
        }
    }

    /// True when the cell must be removed at the start of its tick.
    pub fn is_dying(&self) -> bool {
        self.energy <= self.min_energy || self.ttl == 0 || self.energy > self.max_energy
    }

    /// Convex upkeep for terminal actions: 1 + energy / 100.
    pub fn action_cost(&self) -> u32 {
        1 + self.energy / 100
    }

    pub fn spend_energy(&mut self, amount: u32) {
        self.energy = self.energy.saturating_sub(amount);
    }

    pub fn spend_turn(&mut self) {
        self.ttl = self.ttl.saturating_sub(1);
    }

    /// Saturating tick of the timer gene.
    pub fn advance_timer(&mut self) {
        if self.internal_counter < self.internal_counter_criteria {
            self.internal_counter += 1;
        }
    }

    /// Human-readable parameter summary.
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!(
                "Start: {}, Ttl: {}, Max energy: {}, Min energy: {}",
                self.genome_start,
                self.genome.lifespan_multiplier() as u32 * 10,
                self.max_energy,
                self.min_energy
            ),
            format!(
                "Cell division energy, %: {}, Min cell division energy: {}, Mutation probability, %: {}",
                self.genome.division_share(),
                self.min_energy_division,
                self.genome.mutation_rate()
            ),
            format!(
                "Energy: {}, ttl: {}, orientation: {}",
                self.energy,
                self.ttl,
                self.orientation.index()
            ),
        ]
    }
}
