use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::actors::{
    Actor, ActorId, ActorStore, Bubble, Position, STARTER_POSITION,
};
use crate::collision::{CollisionEvent, CollisionTable, Edge, PairKey};
use crate::interpreter;
use crate::registry::{self, ScriptRegistry};
use crate::script::{Script, ScriptId};
use crate::swap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("no actor with id {0}")]
    UnknownActor(ActorId),
}

#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Seed for spawn positions; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Start with `sprite1` at (100, 100), selected.
    pub starter_actor: bool,
    /// Most recent event-log entries kept; older ones are dropped. Zero
    /// disables recording.
    pub event_capacity: usize,
}

pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            seed: None,
            starter_actor: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Read model handed to rendering surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorView {
    pub id: ActorId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub program: Vec<Script>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bubble: Option<Bubble>,
}

impl From<&Actor> for ActorView {
    fn from(actor: &Actor) -> Self {
        let Position { x, y } = actor.position();
        Self {
            id: actor.id(),
            name: actor.name().to_string(),
            x,
            y,
            heading: actor.heading(),
            program: actor.program().to_vec(),
            bubble: actor.bubble().cloned(),
        }
    }
}

/// Single writer for scripts, actors and collision state. Every mutation of
/// the engine goes through here.
#[derive(Debug)]
pub struct Stage {
    registry: ScriptRegistry,
    actors: ActorStore,
    collisions: CollisionTable,
    active: Option<ActorId>,
    events: VecDeque<String>,
    event_capacity: usize,
    dropped_events: u64,
}

impl Stage {
    pub fn new(config: StageConfig) -> Self {
        let mut stage = Stage {
            registry: ScriptRegistry::new(),
            actors: ActorStore::new(config.seed),
            collisions: CollisionTable::new(),
            active: None,
            events: VecDeque::with_capacity(config.event_capacity.min(DEFAULT_EVENT_CAPACITY)),
            event_capacity: config.event_capacity,
            dropped_events: 0,
        };
        if config.starter_actor {
            let id = stage.actors.spawn_at(STARTER_POSITION, Vec::new());
            stage.active = Some(id);
            stage.log_event(format!("actor.create {id}"));
        }
        stage
    }

    /// Appends to the bounded event log, evicting the oldest entry when full.
    pub fn log_event(&mut self, event: impl Into<String>) {
        if self.event_capacity == 0 {
            self.dropped_events += 1;
            return;
        }
        if self.events.len() == self.event_capacity {
            self.events.pop_front();
            self.dropped_events += 1;
        }
        self.events.push_back(event.into());
    }

    /// Retained entries, oldest first.
    pub fn events(&self) -> &VecDeque<String> {
        &self.events
    }

    /// Entries evicted (or never recorded) so far; the sequence number of
    /// the first retained entry.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn take_events(&mut self) -> Vec<String> {
        self.dropped_events += self.events.len() as u64;
        self.events.drain(..).collect()
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.ids()
    }

    /// Ordered read model of every actor.
    pub fn actors(&self) -> Vec<ActorView> {
        self.actors.iter().map(ActorView::from).collect()
    }

    pub fn program(&self, id: ActorId) -> Option<Vec<Script>> {
        self.actors.get(id).map(|actor| actor.program().to_vec())
    }

    /// Every script any actor holds is still registered.
    pub fn is_consistent(&self) -> bool {
        self.registry.divergence(&self.actors).is_none()
    }

    pub fn is_colliding(&self, a: ActorId, b: ActorId) -> bool {
        self.collisions.is_colliding(PairKey::new(a, b))
    }

    /// Adds an actor at a random spawn point holding a copy of every
    /// registered script.
    pub fn create_actor(&mut self) -> ActorId {
        let id = self.actors.spawn(self.registry.snapshot());
        info!("created actor {id}");
        self.log_event(format!("actor.create {id}"));
        id
    }

    pub fn active_actor(&self) -> Option<ActorId> {
        self.active
    }

    pub fn set_active_actor(&mut self, id: ActorId) -> Result<(), StageError> {
        if !self.actors.contains(id) {
            return Err(StageError::UnknownActor(id));
        }
        self.active = Some(id);
        self.log_event(format!("actor.select {id}"));
        Ok(())
    }

    /// Registers `script` and broadcasts it to every actor. The target only
    /// identifies which editor it came from.
    pub fn submit_script(&mut self, target: ActorId, script: Script) -> bool {
        let id = script.id.clone();
        let added = self.registry.add(script, &mut self.actors);
        if added {
            debug!("script {id} submitted via {target}");
            self.log_event(format!("script.add {id}"));
        }
        added
    }

    pub fn delete_script(&mut self, id: &ScriptId) -> bool {
        let removed = self.registry.remove(id, &mut self.actors);
        if removed {
            self.log_event(format!("script.remove {id}"));
        }
        removed
    }

    /// Clamps and stores the position, then settles collisions for this
    /// actor against everyone else. Unknown ids are ignored.
    pub fn set_position(&mut self, id: ActorId, x: f64, y: f64) -> bool {
        if !self.actors.place(id, Position::new(x, y)) {
            return false;
        }
        let events = self.collisions.detect(&self.actors, id);
        for event in events {
            self.apply_collision(event);
        }
        true
    }

    pub fn set_heading(&mut self, id: ActorId, degrees: f64) -> bool {
        self.actors.set_heading(id, degrees)
    }

    /// One small step of a motion script on the active actor, as an editor
    /// preview.
    pub fn nudge(&mut self, script: &Script) -> bool {
        match self.active {
            Some(id) => interpreter::nudge(self, id, script),
            None => false,
        }
    }

    pub(crate) fn show_bubble(&mut self, id: ActorId, bubble: Bubble) {
        if let Some(actor) = self.actors.get_mut(id) {
            actor.bubble = Some(bubble);
        }
    }

    pub(crate) fn clear_bubble(&mut self, id: ActorId) {
        if let Some(actor) = self.actors.get_mut(id) {
            actor.bubble = None;
        }
    }

    fn apply_collision(&mut self, event: CollisionEvent) {
        let CollisionEvent { mover, other, edge } = event;
        let key = PairKey::new(mover, other);
        match edge {
            Edge::Rising => {
                swap::on_collide(&mut self.actors, mover, other);
            }
            Edge::Falling => {
                swap::on_separate(&mut self.actors, mover, other);
            }
        }
        info!("collision {} {key}", edge.as_str());
        self.log_event(format!("collision.{} {key}", edge.as_str()));
        registry::debug_assert_consistent(&self.registry, &self.actors);
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::new(StageConfig::default())
    }
}

/// Shared handle for the single-threaded playback loop. Borrows must never
/// be held across an `.await`.
#[derive(Debug, Clone)]
pub struct StageHandle {
    inner: Rc<RefCell<Stage>>,
}

impl StageHandle {
    pub fn new(stage: Stage) -> Self {
        Self {
            inner: Rc::new(RefCell::new(stage)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, Stage> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Stage> {
        self.inner.borrow_mut()
    }

    pub fn log_event(&self, event: impl Into<String>) {
        self.inner.borrow_mut().log_event(event);
    }

    pub fn actors(&self) -> Vec<ActorView> {
        self.inner.borrow().actors()
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.inner.borrow().actor_ids()
    }

    pub fn program(&self, id: ActorId) -> Option<Vec<Script>> {
        self.inner.borrow().program(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Block, ParamValue};
    use anyhow::Result;

    fn empty_stage() -> Stage {
        Stage::new(StageConfig {
            seed: Some(17),
            starter_actor: false,
            ..StageConfig::default()
        })
    }

    #[test]
    fn starter_actor_matches_default_layout() {
        let stage = Stage::new(StageConfig {
            seed: Some(1),
            starter_actor: true,
            ..StageConfig::default()
        });
        let views = stage.actors();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id.to_string(), "sprite1");
        assert_eq!(views[0].name, "Sprite 1");
        assert_eq!((views[0].x, views[0].y, views[0].heading), (100.0, 100.0, 90.0));
        assert_eq!(stage.active_actor(), Some(views[0].id));
    }

    #[test]
    fn new_actors_inherit_the_registry() {
        let mut stage = empty_stage();
        let first = stage.create_actor();
        stage.submit_script(first, Block::Move.instantiate("script-1"));
        stage.submit_script(first, Block::Say.instantiate("script-2"));
        let second = stage.create_actor();

        let ids: Vec<String> = stage
            .program(second)
            .unwrap_or_default()
            .into_iter()
            .map(|script| script.id.to_string())
            .collect();
        assert_eq!(ids, vec!["script-1", "script-2"]);
        assert_eq!(stage.program(first), stage.program(second));
    }

    #[test]
    fn selection_rejects_unknown_actors() -> Result<()> {
        let mut stage = empty_stage();
        let id = stage.create_actor();
        stage.set_active_actor(id)?;
        assert_eq!(stage.active_actor(), Some(id));
        assert_eq!(
            stage.set_active_actor(ActorId::new(9)),
            Err(StageError::UnknownActor(ActorId::new(9)))
        );
        assert_eq!(stage.active_actor(), Some(id));
        Ok(())
    }

    #[test]
    fn one_position_update_triggers_one_swap() {
        let mut stage = empty_stage();
        let a = stage.create_actor();
        let b = stage.create_actor();
        stage.set_position(a, 100.0, 100.0);
        stage.set_position(b, 400.0, 400.0);
        stage.submit_script(
            a,
            Block::Move.instantiate_with("script-1", vec![("steps".to_string(), ParamValue::from(10.0))]),
        );
        stage.take_events();

        stage.set_position(b, 130.0, 100.0);

        let rises: Vec<&String> = stage
            .events()
            .iter()
            .filter(|event| event.starts_with("collision.rise"))
            .collect();
        assert_eq!(rises, vec!["collision.rise sprite1-sprite2"]);
        assert!(stage.is_colliding(a, b));
        for id in [a, b] {
            let actor = stage.actor(id).expect("actor exists");
            assert!(actor.is_swapped());
            assert_eq!(actor.program()[0].number("steps"), Some(-10.0));
        }

        stage.set_position(b, 131.0, 100.0);
        assert_eq!(
            stage.events().iter().filter(|e| e.starts_with("collision.")).count(),
            1
        );
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut stage = empty_stage();
        assert!(!stage.set_position(ActorId::new(3), 1.0, 1.0));
        assert!(!stage.set_heading(ActorId::new(3), 1.0));
        assert!(!stage.delete_script(&ScriptId::new("missing")));
        assert!(stage.events().is_empty());
    }

    #[test]
    fn event_log_keeps_only_the_newest_entries() {
        let mut stage = Stage::new(StageConfig {
            seed: Some(3),
            starter_actor: false,
            event_capacity: 3,
        });
        for n in 0..5 {
            stage.log_event(format!("tick {n}"));
        }
        let kept: Vec<&str> = stage.events().iter().map(String::as_str).collect();
        assert_eq!(kept, vec!["tick 2", "tick 3", "tick 4"]);
        assert_eq!(stage.dropped_events(), 2);

        assert_eq!(stage.take_events().len(), 3);
        assert_eq!(stage.dropped_events(), 5);

        let mut silent = Stage::new(StageConfig {
            seed: Some(3),
            starter_actor: true,
            event_capacity: 0,
        });
        silent.log_event("ignored");
        assert!(silent.events().is_empty());
        assert_eq!(silent.dropped_events(), 2);
    }

    #[test]
    fn heading_is_stored_raw() {
        let mut stage = empty_stage();
        let id = stage.create_actor();
        assert!(stage.set_heading(id, 725.0));
        assert_eq!(stage.actor(id).map(Actor::heading), Some(725.0));
        assert!(stage.set_heading(id, -400.0));
        assert_eq!(stage.actor(id).map(Actor::heading), Some(-400.0));
    }
}
