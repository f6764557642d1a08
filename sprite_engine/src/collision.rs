use std::collections::BTreeMap;
use std::fmt;

use crate::actors::{ActorId, ActorStore, Position};

/// Actors closer than this (strictly) are colliding.
pub const COLLISION_RADIUS: f64 = 50.0;

/// Unordered actor pair, stored with the lexicographically smaller id
/// (`sprite10` before `sprite2`) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: ActorId,
    high: ActorId,
}

impl PairKey {
    pub fn new(a: ActorId, b: ActorId) -> Self {
        if a.to_string() <= b.to_string() {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn members(self) -> (ActorId, ActorId) {
        (self.low, self.high)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Rising => "rise",
            Edge::Falling => "fall",
        }
    }
}

/// A change in a pair's collision flag. `mover` is the actor whose position
/// update exposed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub mover: ActorId,
    pub other: ActorId,
    pub edge: Edge,
}

pub fn is_colliding(a: Position, b: Position) -> bool {
    a.distance(b) < COLLISION_RADIUS
}

/// Last known collision flag per pair. Entries appear on first evaluation and
/// are never pruned.
#[derive(Debug, Default, Clone)]
pub struct CollisionTable {
    flags: BTreeMap<PairKey, bool>,
}

impl CollisionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_colliding(&self, key: PairKey) -> bool {
        self.flags.get(&key).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Records the new flag and reports the transition, if any.
    pub fn update(&mut self, key: PairKey, colliding: bool) -> Option<Edge> {
        let previous = self.flags.insert(key, colliding).unwrap_or(false);
        match (previous, colliding) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }

    /// Evaluates `mover` against every other actor in store order.
    pub fn detect(&mut self, actors: &ActorStore, mover: ActorId) -> Vec<CollisionEvent> {
        let Some(origin) = actors.get(mover).map(|actor| actor.position()) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for other in actors.iter().filter(|actor| actor.id() != mover) {
            let key = PairKey::new(mover, other.id());
            let colliding = is_colliding(origin, other.position());
            if let Some(edge) = self.update(key, colliding) {
                events.push(CollisionEvent {
                    mover,
                    other: other.id(),
                    edge,
                });
            }
        }
        events
    }
}
