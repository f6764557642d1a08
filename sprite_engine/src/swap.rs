//! Behavior exchange between colliding actors.
//!
//! On a rising edge both actors trade programs and every top-level `move`
//! in the traded programs runs backwards. On the falling edge each actor
//! gets back the program it held when the exchange happened.

use log::debug;

use crate::actors::{ActorId, ActorStore};
use crate::script::Script;

/// Swaps the programs of `a` and `b`. An actor already mid-swap has its saved
/// program overwritten with its current one, so the latest collision wins.
pub fn on_collide(actors: &mut ActorStore, a: ActorId, b: ActorId) -> bool {
    let Some((first, second)) = actors.pair_mut(a, b) else {
        return false;
    };

    let saved_first = first.program.clone();
    let saved_second = second.program.clone();

    first.program = reversed_moves(saved_second.clone());
    second.program = reversed_moves(saved_first.clone());
    first.saved_program = Some(saved_first);
    second.saved_program = Some(saved_second);

    debug!("swap.collide {a} <-> {b}");
    true
}

/// Restores whichever of the two actors still has a saved program. Returns
/// the actors that were restored.
pub fn on_separate(actors: &mut ActorStore, a: ActorId, b: ActorId) -> Vec<ActorId> {
    let mut restored = Vec::new();
    for id in [a, b] {
        let Some(actor) = actors.get_mut(id) else {
            continue;
        };
        if let Some(saved) = actor.saved_program.take() {
            actor.program = saved;
            restored.push(id);
        }
    }
    if !restored.is_empty() {
        debug!("swap.separate {a} <-> {b} restored {}", restored.len());
    }
    restored
}

fn reversed_moves(mut program: Vec<Script>) -> Vec<Script> {
    for script in program.iter_mut() {
        script.negate_steps();
    }
    program
}
