use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::cell::Cell;
use crate::world::genome::Color;
use crate::world::topology::Coord;

/// Unique, monotonically assigned, never reused within a run.
pub type EntityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Rock,
    Energy,
    Geyser,
    Cell,
}

impl EntityKind {
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Rock,
            EntityKind::Energy,
            EntityKind::Geyser,
            EntityKind::Cell,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Rock => "Rock",
            EntityKind::Energy => "Energy",
            EntityKind::Geyser => "Geyser",
            EntityKind::Cell => "Cell",
        };
        f.write_str(name)
    }
}

/// Kind-specific state.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Rock,
    Energy { energy: u32 },
    Geyser { energy: u32 },
    Cell(Box<Cell>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub coord: Coord,
    /// Set once the entity is logically dead but not yet purged.
    pub inactive: bool,
    pub body: Body,
}

impl Entity {
    pub fn rock(id: EntityId, coord: Coord) -> Self {
        Self::with_body(id, coord, Body::Rock)
    }

    pub fn energy(id: EntityId, coord: Coord, energy: u32) -> Self {
        Self::with_body(id, coord, Body::Energy { energy })
    }

    pub fn geyser(id: EntityId, coord: Coord, energy: u32) -> Self {
        Self::with_body(id, coord, Body::Geyser { energy })
    }

    pub fn cell(id: EntityId, coord: Coord, cell: Cell) -> Self {
        Self::with_body(id, coord, Body::Cell(Box::new(cell)))
    }

    fn with_body(id: EntityId, coord: Coord, body: Body) -> Self {
        Entity {
            id,
            coord,
            inactive: false,
            body,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self.body {
            Body::Rock => EntityKind::Rock,
            Body::Energy { .. } => EntityKind::Energy,
            Body::Geyser { .. } => EntityKind::Geyser,
            Body::Cell(_) => EntityKind::Cell,
        }
    }

    pub fn color(&self) -> Color {
        match &self.body {
            Body::Rock => Color::ROCK,
            Body::Energy { .. } => Color::ENERGY,
            Body::Geyser { .. } => Color::GEYSER,
            Body::Cell(cell) => cell.color,
        }
    }

    /// Stored energy; rocks carry none.
    pub fn energy_level(&self) -> Option<u32> {
        match &self.body {
            Body::Rock => None,
            Body::Energy { energy } | Body::Geyser { energy } => Some(*energy),
            Body::Cell(cell) => Some(cell.energy),
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match &self.body {
            Body::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_cell_mut(&mut self) -> Option<&mut Cell> {
        match &mut self.body {
            Body::Cell(cell) => Some(cell),
            _ => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Body::Rock => write!(f, "Rock, Id: {}", self.id),
            Body::Energy { energy } | Body::Geyser { energy } => {
                write!(f, "{}, Id: {}, Energy: {}", self.kind(), self.id, energy)
            }
            Body::Cell(cell) => write!(
                f,
                "Cell, Id: {}, Energy: {}, ttl: {}",
                self.id, cell.energy, cell.ttl
            ),
        }
    }
}
