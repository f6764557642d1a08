use crate::actors::{ActorId, ActorStore};
use crate::script::{Script, ScriptId};

/// Every script authored for any actor, in submission order. Adding a script
/// broadcasts it to all actors; removing one strips it from all of them.
#[derive(Debug, Default, Clone)]
pub struct ScriptRegistry {
    scripts: Vec<Script>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn contains(&self, id: &ScriptId) -> bool {
        self.scripts.iter().any(|script| &script.id == id)
    }

    pub fn get(&self, id: &ScriptId) -> Option<&Script> {
        self.scripts.iter().find(|script| &script.id == id)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Script> {
        self.scripts.iter()
    }

    /// Fresh copy handed to newly created actors.
    pub fn snapshot(&self) -> Vec<Script> {
        self.scripts.clone()
    }

    /// Inserts `script` and appends a copy to every actor lacking that id.
    /// Returns false (and changes nothing) when the id is already known.
    pub fn add(&mut self, script: Script, actors: &mut ActorStore) -> bool {
        if self.contains(&script.id) {
            return false;
        }
        for actor in actors.iter_mut() {
            if !actor.program_contains(&script.id) {
                actor.program.push(script.clone());
            }
            if let Some(saved) = actor.saved_program.as_mut() {
                if !saved.iter().any(|entry| entry.id == script.id) {
                    saved.push(script.clone());
                }
            }
        }
        self.scripts.push(script);
        debug_assert_consistent(self, actors);
        true
    }

    /// Drops `id` from the registry and from every program, saved programs
    /// included. Returns whether the registry held it.
    pub fn remove(&mut self, id: &ScriptId, actors: &mut ActorStore) -> bool {
        let before = self.scripts.len();
        self.scripts.retain(|script| &script.id != id);
        for actor in actors.iter_mut() {
            actor.program.retain(|script| &script.id != id);
            if let Some(saved) = actor.saved_program.as_mut() {
                saved.retain(|script| &script.id != id);
            }
        }
        debug_assert_consistent(self, actors);
        self.scripts.len() != before
    }

    /// First script held by an actor (active or saved program) that the
    /// registry does not know about.
    pub fn divergence(&self, actors: &ActorStore) -> Option<(ActorId, ScriptId)> {
        actors.iter().find_map(|actor| {
            actor
                .program
                .iter()
                .chain(actor.saved_program.iter().flatten())
                .find(|script| !self.contains(&script.id))
                .map(|script| (actor.id, script.id.clone()))
        })
    }
}

pub(crate) fn debug_assert_consistent(registry: &ScriptRegistry, actors: &ActorStore) {
    debug_assert!(
        registry.divergence(actors).is_none(),
        "registry diverged: {:?} holds a script missing from the registry",
        registry.divergence(actors)
    );
}
