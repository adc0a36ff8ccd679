//! The per-cell genome machine. Each tick a cell runs its pre-checks, tries
//! to reproduce, then decodes its tape from `genome_start` until an action
//! instruction ends the turn or the step ceiling forces a skip.
//!
//! Cost convention: every non-terminal instruction (rotations, checks,
//! timers, jumps) costs a flat 1 energy and no ttl. Move and the two eat
//! instructions cost `1 + energy / 100` energy plus 1 ttl; photosynthesis
//! and the forced skip cost 1 ttl only. Genes without an instruction are
//! free no-ops.

use std::fmt;

use rand::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::simulation::environment::dump_energy;
use crate::world::cell::Cell;
use crate::world::entity::{EntityId, EntityKind};
use crate::world::genome::LAST_ADDRESS;
use crate::world::topology::{Coord, Orientation};
use crate::world::World;

/// Decode iterations allowed per tick before the turn is forfeited.
pub const MAX_DECODE_STEPS: usize = 102;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Opcode {
    Move,
    RotateClockwise,
    RotateCounterClockwise,
    SetStart,
    CheckObstacle,
    CheckFood,
    CheckCell,
    CheckEmpty,
    CheckRelative,
    EatEnergy,
    EatCell,
    Photosynthesis,
    CheckTimer,
    SetTimer,
    Goto,
}

impl Opcode {
    /// Maps a gene value onto its instruction; values above 14 are no-ops.
    pub fn decode(gene: u8) -> Option<Opcode> {
        let op = match gene {
            0 => Opcode::Move,
            1 => Opcode::RotateClockwise,
            2 => Opcode::RotateCounterClockwise,
            3 => Opcode::SetStart,
            4 => Opcode::CheckObstacle,
            5 => Opcode::CheckFood,
            6 => Opcode::CheckCell,
            7 => Opcode::CheckEmpty,
            8 => Opcode::CheckRelative,
            9 => Opcode::EatEnergy,
            10 => Opcode::EatCell,
            11 => Opcode::Photosynthesis,
            12 => Opcode::CheckTimer,
            13 => Opcode::SetTimer,
            14 => Opcode::Goto,
            _ => return None,
        };
        Some(op)
    }

    pub fn all() -> [Opcode; 15] {
        [
            Opcode::Move,
            Opcode::RotateClockwise,
            Opcode::RotateCounterClockwise,
            Opcode::SetStart,
            Opcode::CheckObstacle,
            Opcode::CheckFood,
            Opcode::CheckCell,
            Opcode::CheckEmpty,
            Opcode::CheckRelative,
            Opcode::EatEnergy,
            Opcode::EatCell,
            Opcode::Photosynthesis,
            Opcode::CheckTimer,
            Opcode::SetTimer,
            Opcode::Goto,
        ]
    }

    /// Terminal instructions end the decode loop.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Opcode::Move | Opcode::EatEnergy | Opcode::EatCell | Opcode::Photosynthesis
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Move => "move",
            Opcode::RotateClockwise => "rotate_cw",
            Opcode::RotateCounterClockwise => "rotate_ccw",
            Opcode::SetStart => "set_start",
            Opcode::CheckObstacle => "check_obstacle",
            Opcode::CheckFood => "check_food",
            Opcode::CheckCell => "check_cell",
            Opcode::CheckEmpty => "check_empty",
            Opcode::CheckRelative => "check_relative",
            Opcode::EatEnergy => "eat_energy",
            Opcode::EatCell => "eat_cell",
            Opcode::Photosynthesis => "photosynthesis",
            Opcode::CheckTimer => "check_timer",
            Opcode::SetTimer => "set_timer",
            Opcode::Goto => "goto",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a cell did with its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    /// Removed by the pre-checks.
    Died,
    Bred,
    Acted(Opcode),
    /// No terminal instruction within the step ceiling.
    Stalled,
    /// Not a live cell; nothing ran.
    Idle,
}

/// What lies on the faced tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sight {
    Empty,
    Energy(EntityId),
    Cell(EntityId),
    /// Rock, geyser, or the edge of the grid.
    Obstacle,
}

/// Pointer increment, wrapping 100 back to 0.
pub fn next_address(pointer: u8) -> u8 {
    if pointer >= LAST_ADDRESS { 0 } else { pointer + 1 }
}

/// Conditional jump target: the gene is a 1-based address, so 0 wraps to 100.
/// After the loop's increment, execution resumes at the address equal to the gene.
pub fn jump_target(gene: u8) -> u8 {
    match gene.checked_sub(1) {
        Some(address) => address.min(LAST_ADDRESS),
        None => LAST_ADDRESS,
    }
}

/// The acting cell's view of the world. The cell itself is checked out of
/// the registry while it runs, so its record is not reachable through `world`.
struct Actor<'w> {
    world: &'w mut World,
    id: EntityId,
    coord: Coord,
}

impl Actor<'_> {
    fn look(&self, orientation: Orientation) -> (Sight, Coord) {
        let target = self.coord.step(orientation);
        let sight = match self.world.registry.occupant_at(target) {
            None if self.world.bounds().contains(target) => Sight::Empty,
            None => Sight::Obstacle,
            Some(occupant) => match self.world.registry.get(occupant).map(|e| e.kind()) {
                Some(EntityKind::Energy) => Sight::Energy(occupant),
                Some(EntityKind::Cell) => Sight::Cell(occupant),
                _ => Sight::Obstacle,
            },
        };
        (sight, target)
    }

    /// Removes a neighbour and hands back the energy it held.
    fn consume(&mut self, target: EntityId) -> u32 {
        let gained = self
            .world
            .registry
            .get(target)
            .and_then(|e| e.energy_level())
            .unwrap_or(0);
        if self.world.registry.mark_removed(target) {
            gained
        } else {
            0
        }
    }
}

/// Runs one tick for the cell `id`.
pub fn tick_cell(world: &mut World, id: EntityId) -> CellOutcome {
    let Some(mut entity) = world.registry.checkout(id) else {
        return CellOutcome::Idle;
    };
    if entity.inactive || entity.as_cell().is_none() {
        world.registry.checkin(entity);
        return CellOutcome::Idle;
    }

    let mut actor = Actor {
        world: &mut *world,
        id,
        coord: entity.coord,
    };
    let outcome = match entity.as_cell_mut() {
        Some(cell) => run(&mut actor, cell),
        None => CellOutcome::Idle,
    };
    entity.coord = actor.coord;
    let dead_energy = entity.energy_level().unwrap_or(0);
    let coord = entity.coord;
    world.registry.checkin(entity);

    if outcome == CellOutcome::Died {
        world.registry.mark_removed(id);
        world.counters.deaths += 1;
        if dead_energy > 0 {
            if let Err(error) = world.spawn_energy(coord, dead_energy) {
                debug!(entity_id = id, %coord, %error, "Remains could not be placed");
            }
        }
    }
    outcome
}

fn run(actor: &mut Actor<'_>, cell: &mut Cell) -> CellOutcome {
    if cell.is_dying() {
        return CellOutcome::Died;
    }

    let cap = actor.world.environment.energy_cap;
    if cell.energy > cap {
        let excess = cell.energy - cap;
        if dump_energy(actor.world, actor.coord, excess) {
            cell.energy = cap;
        } else {
            debug!(entity_id = actor.id, excess, "Overflow retained");
        }
    }

    cell.advance_timer();

    if breed(actor, cell) {
        return CellOutcome::Bred;
    }

    cell.instruction_pointer = cell.genome_start;
    for _ in 0..MAX_DECODE_STEPS {
        let gene = cell.genome.gene(cell.instruction_pointer as usize);
        if let Some(op) = Opcode::decode(gene) {
            if op.is_terminal() {
                act(actor, cell, op);
                return CellOutcome::Acted(op);
            }
            inspect(actor, cell, op);
            cell.spend_energy(1);
        }
        cell.instruction_pointer = next_address(cell.instruction_pointer);
    }

    cell.spend_turn();
    CellOutcome::Stalled
}

/// Advances the pointer and returns the gene now under it.
fn read_operand(cell: &mut Cell) -> u8 {
    cell.instruction_pointer = next_address(cell.instruction_pointer);
    cell.genome.gene(cell.instruction_pointer as usize)
}

/// Repoints at the address held by the gene under the pointer. The loop's
/// own increment then lands exactly on that address.
fn jump(cell: &mut Cell) {
    let gene = cell.genome.gene(cell.instruction_pointer as usize);
    cell.instruction_pointer = jump_target(gene);
}

fn inspect(actor: &Actor<'_>, cell: &mut Cell, op: Opcode) {
    match op {
        Opcode::RotateClockwise => cell.orientation = cell.orientation.clockwise(),
        Opcode::RotateCounterClockwise => {
            cell.orientation = cell.orientation.counter_clockwise()
        }
        Opcode::SetStart => cell.genome_start = read_operand(cell),
        Opcode::SetTimer => cell.internal_counter_criteria = u32::from(read_operand(cell)),
        Opcode::Goto => {
            read_operand(cell);
            jump(cell);
        }
        Opcode::CheckTimer => {
            if cell.internal_counter >= cell.internal_counter_criteria {
                read_operand(cell);
                jump(cell);
                cell.internal_counter = 0;
            }
        }
        Opcode::CheckObstacle
        | Opcode::CheckFood
        | Opcode::CheckCell
        | Opcode::CheckEmpty
        | Opcode::CheckRelative => {
            read_operand(cell);
            let (sight, _) = actor.look(cell.orientation);
            let taken = match (op, sight) {
                (Opcode::CheckObstacle, Sight::Obstacle) => true,
                (Opcode::CheckFood, Sight::Energy(_)) => true,
                (Opcode::CheckCell, Sight::Cell(_)) => true,
                (Opcode::CheckEmpty, Sight::Empty) => true,
                (Opcode::CheckRelative, Sight::Cell(other)) => actor
                    .world
                    .registry
                    .get(other)
                    .and_then(|e| e.as_cell())
                    .is_some_and(|relative| cell.genome.is_kin(&relative.genome)),
                _ => false,
            };
            if taken {
                jump(cell);
            }
        }
        Opcode::Move | Opcode::EatEnergy | Opcode::EatCell | Opcode::Photosynthesis => {}
    }
}

fn act(actor: &mut Actor<'_>, cell: &mut Cell, op: Opcode) {
    match op {
        Opcode::Move => {
            let (sight, target) = actor.look(cell.orientation);
            if sight == Sight::Empty && actor.world.registry.relocate(actor.coord, target).is_ok() {
                actor.coord = target;
            }
            pay_action(cell);
        }
        Opcode::EatEnergy | Opcode::EatCell => {
            if cell.energy < cell.max_energy {
                let (sight, _) = actor.look(cell.orientation);
                let prey = match (op, sight) {
                    (Opcode::EatEnergy, Sight::Energy(prey)) => Some(prey),
                    (Opcode::EatCell, Sight::Cell(prey)) => Some(prey),
                    _ => None,
                };
                if let Some(prey) = prey {
                    let gained = actor.consume(prey);
                    if op == Opcode::EatCell {
                        actor.world.counters.deaths += 1;
                    }
                    cell.energy = cell.energy.saturating_add(gained);
                }
            }
            pay_action(cell);
        }
        Opcode::Photosynthesis => {
            let environment = actor.world.environment;
            if environment.sun && cell.energy < cell.max_energy {
                cell.energy = cell.energy.saturating_add(environment.sun_level);
            }
            cell.spend_turn();
        }
        _ => {}
    }
}

fn pay_action(cell: &mut Cell) {
    let cost = cell.action_cost();
    cell.spend_energy(cost);
    cell.spend_turn();
}

/// Tries to divide into a random neighbouring tile. A refused attempt costs
/// nothing.
fn breed(actor: &mut Actor<'_>, cell: &mut Cell) -> bool {
    if cell.energy < cell.min_energy_division {
        return false;
    }
    let rng = &mut actor.world.rng;
    let direction = Orientation::wrapping(rng.gen_range(0..Orientation::COUNT));
    let target = actor.coord.step(direction);
    if !actor.world.registry.is_vacant(target) {
        return false;
    }

    let rng = &mut actor.world.rng;
    let (genome, color) = if rng.gen_range(1..=100) <= cell.genome.mutation_rate() {
        (cell.genome.mutate(rng), cell.color.drift(rng))
    } else {
        (cell.genome.clone(), cell.color)
    };

    cell.spend_energy(cell.breed_cost);
    let share = u64::from(cell.genome.division_share());
    let child_energy = (u64::from(cell.energy) * share / 100) as u32;
    cell.energy -= child_energy;

    let child = Cell::new(genome, color, Some(child_energy), direction, None);
    match actor.world.spawn_cell(target, child) {
        Ok(child_id) => {
            actor.world.counters.births += 1;
            debug!(parent = actor.id, child = child_id, %target, "Cell divided");
        }
        Err(error) => debug!(parent = actor.id, %error, "Offspring placement refused"),
    }
    cell.spend_turn();
    true
}
