use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sprite_engine::script::{ParseBlockError, Params};
use sprite_engine::{ActorId, Block, Script, ScriptId, ScriptIdAllocator, Stage, StageConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    UnknownBlock(#[from] ParseBlockError),
    #[error("scenario selects {0}, which is not on the stage")]
    UnknownActor(ActorId),
    #[error("scenario authors scripts but has no actor to author them on")]
    NoActors,
    #[error("no `script-{{n}}` ids left to allocate for `{0}`")]
    IdsExhausted(String),
}

/// Stage setup replayed by the host: where actors stand and which scripts
/// were authored, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_starter_actor")]
    pub starter_actor: bool,
    #[serde(default)]
    pub actors: Vec<ActorSetup>,
    /// Actor whose editor receives the scripts (default: the active one).
    #[serde(default)]
    pub select: Option<ActorId>,
    #[serde(default)]
    pub scripts: Vec<ScriptEntry>,
    /// Scripts deleted after authoring.
    #[serde(default)]
    pub removed: Vec<ScriptId>,
}

fn default_starter_actor() -> bool {
    true
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            seed: None,
            starter_actor: true,
            actors: Vec::new(),
            select: None,
            scripts: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// One extra actor. Omitted fields keep the random spawn point and the
/// default heading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActorSetup {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub heading: Option<f64>,
}

/// Either a complete script or a palette shorthand (`{"block": "move"}`)
/// that gets a fresh id and the palette defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptEntry {
    Full(Script),
    Palette {
        block: String,
        #[serde(default)]
        id: Option<ScriptId>,
        #[serde(default)]
        params: Params,
    },
}

impl ScriptEntry {
    fn explicit_id(&self) -> Option<&ScriptId> {
        match self {
            ScriptEntry::Full(script) => Some(&script.id),
            ScriptEntry::Palette { id, .. } => id.as_ref(),
        }
    }

    fn into_script(self, ids: &mut ScriptIdAllocator) -> Result<Script, ScenarioError> {
        match self {
            ScriptEntry::Full(script) => Ok(script),
            ScriptEntry::Palette { block, id, params } => {
                let block: Block = block.parse()?;
                let id = match id {
                    Some(id) => id,
                    None => ids
                        .allocate()
                        .ok_or_else(|| ScenarioError::IdsExhausted(block.to_string()))?,
                };
                Ok(block.instantiate_with(id, params))
            }
        }
    }
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading scenario from {}", path.display()))?;
        let scenario = serde_json::from_str(&raw)
            .with_context(|| format!("parsing scenario JSON from {}", path.display()))?;
        Ok(scenario)
    }

    /// Builds the stage: actors first, then every authored script through
    /// the selected actor's editor, then deletions.
    pub fn build(self, seed_override: Option<u64>) -> Result<Stage, ScenarioError> {
        let mut stage = Stage::new(StageConfig {
            seed: seed_override.or(self.seed),
            starter_actor: self.starter_actor,
            ..StageConfig::default()
        });

        for setup in &self.actors {
            let id = stage.create_actor();
            if setup.x.is_some() || setup.y.is_some() {
                let current = stage
                    .actor(id)
                    .map(|actor| actor.position())
                    .ok_or(ScenarioError::UnknownActor(id))?;
                stage.set_position(
                    id,
                    setup.x.unwrap_or(current.x),
                    setup.y.unwrap_or(current.y),
                );
            }
            if let Some(heading) = setup.heading {
                stage.set_heading(id, heading);
            }
        }

        if let Some(selected) = self.select {
            stage
                .set_active_actor(selected)
                .map_err(|_| ScenarioError::UnknownActor(selected))?;
        } else if stage.active_actor().is_none() {
            if let Some(first) = stage.actor_ids().first().copied() {
                stage
                    .set_active_actor(first)
                    .map_err(|_| ScenarioError::UnknownActor(first))?;
            }
        }

        if !self.scripts.is_empty() {
            let editor = stage.active_actor().ok_or(ScenarioError::NoActors)?;
            let mut ids = ScriptIdAllocator::new();
            for id in self.scripts.iter().filter_map(ScriptEntry::explicit_id) {
                ids.observe(id);
            }
            for entry in self.scripts {
                let script = entry.into_script(&mut ids)?;
                let id = script.id.clone();
                if !stage.submit_script(editor, script) {
                    eprintln!("[sprite_stage] warning: duplicate script id {id} ignored");
                }
            }
        }

        for id in &self.removed {
            if !stage.delete_script(id) {
                eprintln!("[sprite_stage] warning: cannot remove unknown script {id}");
            }
        }

        Ok(stage)
    }
}
