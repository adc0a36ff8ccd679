use std::fmt;

use serde::{Deserialize, Serialize};

/// Compass offsets indexed by orientation, clockwise from north-west.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1), // North-west
    (0, -1),  // North
    (1, -1),  // North-east
    (1, 0),   // East
    (1, 1),   // South-east
    (0, 1),   // South
    (-1, 1),  // South-west
    (-1, 0),  // West
];

/// Integer grid coordinate. Used directly as a key into the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring coordinate one step towards `direction`.
    pub fn step(self, direction: Orientation) -> Coord {
        let (dx, dy) = DIRECTIONS[direction.index()];
        Coord {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the 8 compass directions. Always normalized into 0..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Orientation(u8);

impl Orientation {
    pub const COUNT: u8 = 8;

    /// Wraps any integer onto the compass.
    pub fn wrapping(value: u8) -> Self {
        Orientation(value % Self::COUNT)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn clockwise(self) -> Self {
        Orientation((self.0 + 1) % Self::COUNT)
    }

    pub fn counter_clockwise(self) -> Self {
        Orientation((self.0 + Self::COUNT - 1) % Self::COUNT)
    }

    pub fn all() -> [Orientation; 8] {
        [0, 1, 2, 3, 4, 5, 6, 7].map(Orientation)
    }
}

impl TryFrom<u8> for Orientation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            Ok(Orientation(value))
        } else {
            Err(format!("orientation must be 0-7, got {}", value))
        }
    }
}

impl From<Orientation> for u8 {
    fn from(o: Orientation) -> u8 {
        o.0
    }
}

/// Rectangular, non-wrapping grid extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major slot for an in-bounds coordinate.
    pub fn slot(&self, coord: Coord) -> Option<usize> {
        if self.contains(coord) {
            Some(coord.y as usize * self.width as usize + coord.x as usize)
        } else {
            None
        }
    }

    pub fn max_coord(&self) -> Coord {
        Coord::new(self.width as i32 - 1, self.height as i32 - 1)
    }

    /// Every coordinate on the outer ring, each exactly once.
    pub fn perimeter(&self) -> Vec<Coord> {
        let max = self.max_coord();
        let mut ring = Vec::with_capacity(2 * (self.width + self.height) as usize);
        for x in 0..=max.x {
            ring.push(Coord::new(x, 0));
            if max.y > 0 {
                ring.push(Coord::new(x, max.y));
            }
        }
        for y in 1..max.y {
            ring.push(Coord::new(0, y));
            if max.x > 0 {
                ring.push(Coord::new(max.x, y));
            }
        }
        ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rotation_wraps_both_ways() {
        let north_west = Orientation::wrapping(0);
        assert_eq!(north_west.counter_clockwise().index(), 7);
        assert_eq!(Orientation::wrapping(7).clockwise().index(), 0);
        assert_eq!(Orientation::wrapping(11).index(), 3);
    }

    #[test]
    fn step_follows_direction_table() {
        let origin = Coord::new(5, 5);
        assert_eq!(origin.step(Orientation::wrapping(0)), Coord::new(4, 4));
        assert_eq!(origin.step(Orientation::wrapping(3)), Coord::new(6, 5));
        assert_eq!(origin.step(Orientation::wrapping(5)), Coord::new(5, 6));
    }

    #[test]
    fn directions_are_distinct_neighbors() {
        let set: HashSet<_> = DIRECTIONS.iter().collect();
        assert_eq!(set.len(), 8);
        for &(dx, dy) in &DIRECTIONS {
            assert!(dx.abs() <= 1 && dy.abs() <= 1);
            assert!((dx, dy) != (0, 0));
        }
    }

    #[test]
    fn orientation_rejects_out_of_range() {
        assert!(Orientation::try_from(8).is_err());
        assert_eq!(Orientation::try_from(7).unwrap().index(), 7);
    }

    #[test]
    fn bounds_slot_is_row_major() {
        let bounds = Bounds::new(4, 3);
        assert_eq!(bounds.slot(Coord::new(0, 0)), Some(0));
        assert_eq!(bounds.slot(Coord::new(3, 2)), Some(11));
        assert_eq!(bounds.slot(Coord::new(4, 0)), None);
        assert_eq!(bounds.slot(Coord::new(-1, 0)), None);
    }

    #[test]
    fn perimeter_covers_ring_once() {
        let bounds = Bounds::new(5, 4);
        let ring = bounds.perimeter();
        let unique: HashSet<_> = ring.iter().copied().collect();
        assert_eq!(ring.len(), unique.len());
        assert_eq!(ring.len(), 2 * 5 + 2 * 2);
        assert!(unique.contains(&Coord::new(4, 3)));
        assert!(!unique.contains(&Coord::new(1, 1)));
    }
}
