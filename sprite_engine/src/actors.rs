use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::script::{Script, ScriptId};

/// Upper bound of both stage coordinates; the lower bound is zero.
pub const STAGE_EXTENT: f64 = 450.0;
/// New actors spawn inside `[0, SPAWN_EXTENT)` on both axes.
pub const SPAWN_EXTENT: f64 = 200.0;
pub const DEFAULT_HEADING: f64 = 90.0;
pub const STARTER_POSITION: Position = Position { x: 100.0, y: 100.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(u32);

impl ActorId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sprite{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed actor id `{0}` (expected sprite<N>)")]
pub struct ParseActorIdError(String);

impl FromStr for ActorId {
    type Err = ParseActorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("sprite")
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(ActorId)
            .ok_or_else(|| ParseActorIdError(s.to_string()))
    }
}

impl TryFrom<String> for ActorId {
    type Error = ParseActorIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.to_string()
    }
}

/// Clamps a single coordinate onto the stage. NaN lands on the origin.
pub fn clamp_coordinate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, STAGE_EXTENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clamped(self) -> Self {
        Self {
            x: clamp_coordinate(self.x),
            y: clamp_coordinate(self.y),
        }
    }

    pub fn distance(self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleStyle {
    Speech,
    Thought,
}

/// Dialogue currently shown next to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bubble {
    pub style: BubbleStyle,
    pub text: String,
}

impl Bubble {
    pub fn new(style: BubbleStyle, message: &str) -> Self {
        let text = match style {
            BubbleStyle::Speech => message.to_string(),
            BubbleStyle::Thought => format!("💭 {message}"),
        };
        Self { style, text }
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) position: Position,
    pub(crate) heading: f64,
    pub(crate) program: Vec<Script>,
    pub(crate) saved_program: Option<Vec<Script>>,
    pub(crate) bubble: Option<Bubble>,
}

impl Actor {
    fn new(id: ActorId, position: Position, program: Vec<Script>) -> Self {
        Self {
            id,
            name: format!("Sprite {}", id.index()),
            position: position.clamped(),
            heading: DEFAULT_HEADING,
            program,
            saved_program: None,
            bubble: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn program(&self) -> &[Script] {
        &self.program
    }

    pub fn saved_program(&self) -> Option<&[Script]> {
        self.saved_program.as_deref()
    }

    pub fn is_swapped(&self) -> bool {
        self.saved_program.is_some()
    }

    pub fn bubble(&self) -> Option<&Bubble> {
        self.bubble.as_ref()
    }

    pub(crate) fn program_contains(&self, id: &ScriptId) -> bool {
        self.program.iter().any(|script| &script.id == id)
    }
}

/// Owns every actor in creation order. Actors are never removed.
#[derive(Debug)]
pub struct ActorStore {
    actors: Vec<Actor>,
    rng: StdRng,
}

impl ActorStore {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            actors: Vec::new(),
            rng,
        }
    }

    fn next_id(&self) -> ActorId {
        ActorId(self.actors.len() as u32 + 1)
    }

    /// Adds an actor at a random spot in the spawn square.
    pub fn spawn(&mut self, program: Vec<Script>) -> ActorId {
        let position = Position::new(
            self.rng.gen_range(0.0..SPAWN_EXTENT),
            self.rng.gen_range(0.0..SPAWN_EXTENT),
        );
        self.spawn_at(position, program)
    }

    pub fn spawn_at(&mut self, position: Position, program: Vec<Script>) -> ActorId {
        let id = self.next_id();
        self.actors.push(Actor::new(id, position, program));
        id
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.index_of(id).is_some()
    }

    fn index_of(&self, id: ActorId) -> Option<usize> {
        self.actors.iter().position(|actor| actor.id == id)
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|actor| actor.id == id)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Actor> {
        self.actors.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = &mut Actor> {
        self.actors.iter_mut()
    }

    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.iter().map(|actor| actor.id).collect()
    }

    /// Two distinct actors borrowed mutably at once.
    pub(crate) fn pair_mut(&mut self, a: ActorId, b: ActorId) -> Option<(&mut Actor, &mut Actor)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return None;
        }
        if ia < ib {
            let (head, tail) = self.actors.split_at_mut(ib);
            Some((&mut head[ia], &mut tail[0]))
        } else {
            let (head, tail) = self.actors.split_at_mut(ia);
            Some((&mut tail[0], &mut head[ib]))
        }
    }

    /// Stores a clamped position. Returns false for unknown actors.
    pub(crate) fn place(&mut self, id: ActorId, position: Position) -> bool {
        match self.get_mut(id) {
            Some(actor) => {
                actor.position = position.clamped();
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_heading(&mut self, id: ActorId, degrees: f64) -> bool {
        match self.get_mut(id) {
            Some(actor) => {
                actor.heading = degrees;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_creation_order() {
        let mut store = ActorStore::new(Some(7));
        let first = store.spawn(Vec::new());
        let second = store.spawn(Vec::new());
        assert_eq!(first.to_string(), "sprite1");
        assert_eq!(second.to_string(), "sprite2");
        assert_eq!(store.get(second).map(Actor::name), Some("Sprite 2"));
        assert_eq!("sprite2".parse::<ActorId>(), Ok(second));
        assert!("actor2".parse::<ActorId>().is_err());
    }

    #[test]
    fn spawn_stays_inside_spawn_square() {
        let mut store = ActorStore::new(Some(99));
        for _ in 0..64 {
            store.spawn(Vec::new());
        }
        for actor in store.iter() {
            let Position { x, y } = actor.position();
            assert!((0.0..SPAWN_EXTENT).contains(&x), "x out of range: {x}");
            assert!((0.0..SPAWN_EXTENT).contains(&y), "y out of range: {y}");
            assert_eq!(actor.heading(), DEFAULT_HEADING);
            assert!(!actor.is_swapped());
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let mut a = ActorStore::new(Some(3));
        let mut b = ActorStore::new(Some(3));
        let ia = a.spawn(Vec::new());
        let ib = b.spawn(Vec::new());
        assert_eq!(a.get(ia).map(Actor::position), b.get(ib).map(Actor::position));
    }

    #[test]
    fn place_clamps_and_ignores_unknown_ids() {
        let mut store = ActorStore::new(Some(1));
        let id = store.spawn_at(STARTER_POSITION, Vec::new());
        assert!(store.place(id, Position::new(-20.0, 9000.0)));
        assert_eq!(store.get(id).map(Actor::position), Some(Position::new(0.0, 450.0)));
        assert!(store.place(id, Position::new(f64::NAN, 12.5)));
        assert_eq!(store.get(id).map(Actor::position), Some(Position::new(0.0, 12.5)));
        assert!(!store.place(ActorId::new(42), Position::new(1.0, 1.0)));
    }

    #[test]
    fn pair_mut_rejects_self_pairs() {
        let mut store = ActorStore::new(Some(1));
        let a = store.spawn(Vec::new());
        let b = store.spawn(Vec::new());
        assert!(store.pair_mut(a, a).is_none());
        let (first, second) = store.pair_mut(b, a).expect("both actors exist");
        assert_eq!(first.id(), b);
        assert_eq!(second.id(), a);
    }

    #[test]
    fn thought_bubbles_are_prefixed() {
        assert_eq!(Bubble::new(BubbleStyle::Speech, "hi").text, "hi");
        assert_eq!(Bubble::new(BubbleStyle::Thought, "hmm").text, "💭 hmm");
    }
}
