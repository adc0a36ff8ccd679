use rand::seq::SliceRandom;
use tracing::debug;

use crate::world::entity::{Body, EntityId, EntityKind};
use crate::world::topology::{Coord, Orientation};
use crate::world::World;

/// Entropy: a packet loses one unit per tick and disappears at zero.
pub fn tick_energy(world: &mut World, id: EntityId) {
    if !world.environment.entropy {
        return;
    }
    let Some(entity) = world.registry.get_mut(id) else {
        return;
    };
    let Body::Energy { energy } = &mut entity.body else {
        return;
    };
    *energy = energy.saturating_sub(1);
    if *energy == 0 {
        world.registry.mark_removed(id);
    }
}

/// A geyser produces energy while geysers are on, then offloads whatever
/// sits above the world cap.
pub fn tick_geyser(world: &mut World, id: EntityId) {
    let environment = world.environment;
    let Some(entity) = world.registry.get_mut(id) else {
        return;
    };
    let coord = entity.coord;
    let Body::Geyser { energy } = &mut entity.body else {
        return;
    };
    if environment.geyser {
        *energy = energy.saturating_add(environment.geyser_production);
    }
    if *energy <= environment.energy_cap {
        return;
    }

    let excess = *energy - environment.energy_cap;
    if dump_energy(world, coord, excess) {
        if let Some(Body::Geyser { energy }) = world.registry.get_mut(id).map(|e| &mut e.body) {
            *energy = environment.energy_cap;
        }
    } else {
        debug!(entity_id = id, excess, "Geyser overflow retained");
    }
}

/// One rain drop on a random tile, if that tile is empty.
pub fn rain(world: &mut World) {
    let coord = world.random_coord();
    if world.registry.is_vacant(coord) {
        let drop = world.environment.rain_energy;
        if let Err(error) = world.spawn_energy(coord, drop) {
            debug!(%coord, %error, "Rain drop refused");
        }
    }
}

/// Offloads `excess` energy from `origin` onto a neighbouring tile.
///
/// Directions are shuffled, then tried in three passes: an empty tile gets a
/// new packet; failing that, the weakest neighbouring packet absorbs the
/// excess; failing that, a neighbouring cell is destroyed and its energy plus
/// the excess become a packet on its tile. Returns false when no neighbour
/// qualifies, in which case the caller keeps the energy.
pub fn dump_energy(world: &mut World, origin: Coord, excess: u32) -> bool {
    let mut directions = Orientation::all();
    directions.shuffle(&mut world.rng);
    let neighbours: Vec<Coord> = directions.iter().map(|&d| origin.step(d)).collect();

    let empty = neighbours
        .iter()
        .copied()
        .find(|&c| world.registry.is_vacant(c));
    if let Some(target) = empty {
        return world.spawn_energy(target, excess).is_ok();
    }

    let weakest = neighbours
        .iter()
        .filter_map(|&c| world.registry.entity_at(c))
        .filter(|e| e.kind() == EntityKind::Energy)
        .min_by_key(|e| e.energy_level().unwrap_or(0))
        .map(|e| e.id);
    if let Some(id) = weakest {
        if let Some(Body::Energy { energy }) = world.registry.get_mut(id).map(|e| &mut e.body) {
            *energy = energy.saturating_add(excess);
            return true;
        }
    }

    let victim = neighbours
        .iter()
        .filter_map(|&c| world.registry.entity_at(c))
        .find(|e| e.kind() == EntityKind::Cell)
        .map(|e| (e.id, e.coord, e.energy_level().unwrap_or(0)));
    if let Some((id, coord, energy)) = victim {
        world.registry.mark_removed(id);
        world.counters.deaths += 1;
        debug!(entity_id = id, %coord, "Cell crushed by overflow");
        return world
            .spawn_energy(coord, energy.saturating_add(excess))
            .is_ok();
    }

    false
}
