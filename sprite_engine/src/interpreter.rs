use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use log::debug;

use crate::actors::{ActorId, Bubble, BubbleStyle};
use crate::script::{Block, Category, Script};
use crate::stage::{Stage, StageHandle};

/// Editor preview: a click advances by one unit or turns by this much.
const NUDGE_STEPS: f64 = 1.0;
const NUDGE_DEGREES: f64 = 5.0;

/// What the driver still has to do after [`step`] applied a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Synchronous effect already applied.
    Done,
    /// A bubble is showing; clear it after `seconds`.
    Speak { seconds: f64 },
    /// Run `body` in full, `times` times over.
    Repeat { times: u64, body: Vec<Script> },
    /// Unknown action, or the actor does not exist.
    Ignored,
}

/// Unit direction for a heading in degrees. The heading itself is never
/// normalised; only the angle used here is.
pub fn direction(heading: f64) -> (f64, f64) {
    let radians = heading.rem_euclid(360.0).to_radians();
    (radians.cos(), radians.sin())
}

/// Applies the immediate part of `script` to `actor`.
pub fn step(stage: &mut Stage, actor: ActorId, script: &Script) -> Step {
    let Some(current) = stage.actor(actor) else {
        return Step::Ignored;
    };
    let position = current.position();
    let heading = current.heading();

    let Some(block) = script.block() else {
        debug!("actor {actor}: ignoring unknown action `{}`", script.action);
        return Step::Ignored;
    };

    match block {
        Block::Move => {
            let steps = script.number_or_zero("steps");
            let (dx, dy) = direction(heading);
            stage.set_position(actor, position.x + steps * dx, position.y + steps * dy);
            log_position(stage, actor, "move");
            Step::Done
        }
        Block::TurnLeft => {
            stage.set_heading(actor, heading - script.number_or_zero("degrees"));
            log_heading(stage, actor);
            Step::Done
        }
        Block::TurnRight => {
            stage.set_heading(actor, heading + script.number_or_zero("degrees"));
            log_heading(stage, actor);
            Step::Done
        }
        Block::GoTo => {
            stage.set_position(actor, script.number_or_zero("x"), script.number_or_zero("y"));
            log_position(stage, actor, "goto");
            Step::Done
        }
        Block::Say | Block::Think => {
            let style = if block == Block::Say {
                BubbleStyle::Speech
            } else {
                BubbleStyle::Thought
            };
            let message = script.label("message");
            let seconds = script.number_or_zero("duration").max(0.0);
            stage.log_event(format!("actor.{actor}.{block} {message}"));
            stage.show_bubble(actor, Bubble::new(style, &message));
            Step::Speak { seconds }
        }
        Block::Repeat => Step::Repeat {
            times: repeat_times(script.number_or_zero("count")),
            body: script.nested("scripts").to_vec(),
        },
    }
}

/// Fractional counts round up; anything non-positive runs zero times.
fn repeat_times(count: f64) -> u64 {
    if count > 0.0 {
        count.ceil() as u64
    } else {
        0
    }
}

fn log_position(stage: &mut Stage, actor: ActorId, verb: &str) {
    if let Some(position) = stage.actor(actor).map(|a| a.position()) {
        debug!("actor {actor} {verb} -> {:.3},{:.3}", position.x, position.y);
        stage.log_event(format!(
            "actor.{actor}.{verb} {:.3},{:.3}",
            position.x, position.y
        ));
    }
}

fn log_heading(stage: &mut Stage, actor: ActorId) {
    if let Some(heading) = stage.actor(actor).map(|a| a.heading()) {
        stage.log_event(format!("actor.{actor}.heading {heading:.3}"));
    }
}

/// Editor click on a motion script: one unit forward, or a 5 degree turn.
/// `goto` and non-motion scripts have no preview.
pub fn nudge(stage: &mut Stage, actor: ActorId, script: &Script) -> bool {
    if script.category != Category::Motion {
        return false;
    }
    let Some(current) = stage.actor(actor) else {
        return false;
    };
    let position = current.position();
    let heading = current.heading();
    match script.block() {
        Some(Block::Move) => {
            let (dx, dy) = direction(heading);
            stage.set_position(
                actor,
                position.x + NUDGE_STEPS * dx,
                position.y + NUDGE_STEPS * dy,
            );
            log_position(stage, actor, "nudge");
            true
        }
        Some(Block::TurnLeft) => {
            stage.set_heading(actor, heading - NUDGE_DEGREES);
            log_heading(stage, actor);
            true
        }
        Some(Block::TurnRight) => {
            stage.set_heading(actor, heading + NUDGE_DEGREES);
            log_heading(stage, actor);
            true
        }
        _ => false,
    }
}

pub(crate) fn scaled(seconds: f64, time_scale: f64) -> Duration {
    Duration::try_from_secs_f64(seconds * time_scale).unwrap_or(Duration::MAX)
}

/// Runs one script to completion, awaiting dialogue and every repetition of
/// nested blocks.
pub fn run_script<'a>(
    stage: &'a StageHandle,
    actor: ActorId,
    script: &'a Script,
    time_scale: f64,
) -> Pin<Box<dyn Future<Output = ()> + 'a>> {
    Box::pin(async move {
        let outcome = step(&mut stage.borrow_mut(), actor, script);
        match outcome {
            Step::Done | Step::Ignored => {}
            Step::Speak { seconds } => {
                tokio::time::sleep(scaled(seconds, time_scale)).await;
                stage.borrow_mut().clear_bubble(actor);
            }
            Step::Repeat { times, body } => {
                for _ in 0..times {
                    for nested in &body {
                        run_script(stage, actor, nested, time_scale).await;
                    }
                }
            }
        }
    })
}

/// Runs every script of `program` in order on `actor`.
pub async fn run_program(stage: &StageHandle, actor: ActorId, program: &[Script], time_scale: f64) {
    for script in program {
        run_script(stage, actor, script, time_scale).await;
    }
}
