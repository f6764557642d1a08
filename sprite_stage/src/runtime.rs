use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use sprite_engine::{ActorView, Block, PlaybackConfig, PlaybackController, StageHandle};
use tokio::task::LocalSet;

use crate::cli::PlayArgs;
use crate::scenario::Scenario;

#[derive(Serialize)]
struct EventLogEntry<'a> {
    sequence: u64,
    label: &'a str,
}

#[derive(Serialize)]
struct EventLog<'a> {
    events: Vec<EventLogEntry<'a>>,
}

#[derive(Serialize)]
struct StageSnapshot {
    passes: u64,
    actors: Vec<ActorView>,
}

pub async fn execute(args: PlayArgs) -> Result<()> {
    let PlayArgs {
        scenario,
        passes,
        seed,
        time_scale,
        pass_interval,
        event_log_json,
        snapshot_json,
        verbose,
    } = args;

    let scenario = match scenario.as_ref() {
        Some(path) => Scenario::from_path(path)?,
        None => Scenario::default(),
    };
    let stage = scenario.build(seed).context("building stage from scenario")?;
    let stage = StageHandle::new(stage);

    let controller = PlaybackController::new(
        stage.clone(),
        PlaybackConfig {
            pass_interval,
            time_scale,
            max_passes: Some(passes),
        },
    );

    let local = LocalSet::new();
    let completed = local
        .run_until(async {
            match controller.play() {
                Some(task) => task.await.context("playback loop aborted"),
                None => Ok(controller.passes_completed()),
            }
        })
        .await?;
    info!("playback finished after {completed} passes");

    let actors = stage.actors();
    print_summary(completed, &actors);

    if verbose {
        for event in stage.borrow().events() {
            println!("  {event}");
        }
    }

    if let Some(path) = event_log_json.as_ref() {
        let stage = stage.borrow();
        write_event_log(stage.events(), stage.dropped_events(), path)?;
    }

    if let Some(path) = snapshot_json.as_ref() {
        let snapshot = StageSnapshot {
            passes: completed,
            actors,
        };
        let json =
            serde_json::to_string_pretty(&snapshot).context("serializing stage snapshot to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing stage snapshot to {}", path.display()))?;
        println!("Saved stage snapshot to {}", path.display());
    }

    Ok(())
}

pub fn list_blocks() -> Result<()> {
    for block in Block::ALL {
        let defaults = serde_json::to_string(&block.default_params())
            .with_context(|| format!("serializing defaults for {block}"))?;
        println!("{:<8} {:<11} {defaults}", block.category().as_str(), block.tag());
    }
    Ok(())
}

fn print_summary(passes: u64, actors: &[ActorView]) {
    println!("Playback summary ({passes} passes)");
    for actor in actors {
        println!(
            "  {} ({}) at ({:.1}, {:.1}) heading {:.1}, {} scripts",
            actor.id,
            actor.name,
            actor.x,
            actor.y,
            actor.heading,
            actor.program.len()
        );
    }
}

fn write_event_log(events: &VecDeque<String>, dropped: u64, path: &Path) -> Result<()> {
    let log = EventLog {
        events: events
            .iter()
            .zip(dropped..)
            .map(|(label, sequence)| EventLogEntry {
                sequence,
                label: label.as_str(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&log).context("serializing event log to JSON")?;
    fs::write(path, &json)
        .with_context(|| format!("writing event log to {}", path.display()))?;
    println!("Saved event log to {}", path.display());
    Ok(())
}
