use serde::Serialize;

use crate::world::entity::{EntityId, EntityKind};
use crate::world::genome::Color;
use crate::world::topology::Coord;

/// Visible change to the grid, buffered for whatever draws it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum WorldEvent {
    Spawned {
        id: EntityId,
        kind: EntityKind,
        coord: Coord,
        color: Color,
    },
    Moved {
        id: EntityId,
        from: Coord,
        to: Coord,
    },
    Removed {
        id: EntityId,
        coord: Coord,
    },
}

impl WorldEvent {
    pub fn id(&self) -> EntityId {
        match self {
            WorldEvent::Spawned { id, .. }
            | WorldEvent::Moved { id, .. }
            | WorldEvent::Removed { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = WorldEvent::Moved {
            id: 4,
            from: Coord::new(1, 1),
            to: Coord::new(2, 1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Moved\""));
        assert!(json.contains("\"to\":{\"x\":2,\"y\":1}"));
        assert_eq!(event.id(), 4);
    }
}
