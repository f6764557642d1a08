use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::{info, trace};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::interpreter::run_program;
use crate::stage::StageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Running,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Pause between the end of one pass and the start of the next.
    pub pass_interval: Duration,
    /// Multiplier applied to `say`/`think` durations.
    pub time_scale: f64,
    /// Each loop started by `play` stops on its own after this many passes.
    pub max_passes: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_millis(16),
            time_scale: 1.0,
            max_passes: None,
        }
    }
}

impl PlaybackConfig {
    fn effective_time_scale(&self) -> f64 {
        if self.time_scale.is_finite() && self.time_scale > 0.0 {
            self.time_scale
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Cell<PlaybackState>,
    loop_active: Cell<bool>,
    passes: Cell<u64>,
}

/// Drives repeated passes over every actor's program. Passes never overlap:
/// the next one is scheduled only after the previous one finished.
///
/// `play` spawns onto the current [`tokio::task::LocalSet`], so it must be
/// called from inside one.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    stage: StageHandle,
    config: PlaybackConfig,
    shared: Rc<Shared>,
}

impl PlaybackController {
    pub fn new(stage: StageHandle, config: PlaybackConfig) -> Self {
        Self {
            stage,
            config,
            shared: Rc::new(Shared {
                state: Cell::new(PlaybackState::Idle),
                loop_active: Cell::new(false),
                passes: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state.get()
    }

    pub fn passes_completed(&self) -> u64 {
        self.shared.passes.get()
    }

    /// True while a pass is still in flight, even after `stop`.
    pub fn is_draining(&self) -> bool {
        self.shared.loop_active.get() && self.state() == PlaybackState::Idle
    }

    /// Idle -> Running. Returns the loop task when a new one was started;
    /// `None` when already running or when a stopped loop was re-armed
    /// before its in-flight pass finished.
    pub fn play(&self) -> Option<JoinHandle<u64>> {
        if self.state() == PlaybackState::Running {
            return None;
        }
        self.shared.state.set(PlaybackState::Running);
        info!("playback started");
        self.stage.log_event("playback.play");
        if self.shared.loop_active.get() {
            return None;
        }
        self.shared.loop_active.set(true);
        let controller = self.clone();
        Some(tokio::task::spawn_local(async move {
            controller.run_loop().await
        }))
    }

    /// Running -> Idle. Only prevents future passes; a pass already under
    /// way, including any dialogue it is waiting on, runs to the end.
    pub fn stop(&self) -> bool {
        if self.state() != PlaybackState::Running {
            return false;
        }
        self.shared.state.set(PlaybackState::Idle);
        info!("playback stopped after {} passes", self.passes_completed());
        self.stage.log_event("playback.stop");
        true
    }

    /// Every actor in store order runs its whole program before the next
    /// actor starts. Actors created mid-pass join the following pass.
    pub async fn run_pass(&self) {
        let time_scale = self.config.effective_time_scale();
        for actor in self.stage.actor_ids() {
            let Some(program) = self.stage.program(actor) else {
                continue;
            };
            trace!("pass: {actor} runs {} scripts", program.len());
            run_program(&self.stage, actor, &program, time_scale).await;
        }
    }

    async fn run_loop(&self) -> u64 {
        let mut completed = 0;
        while self.state() == PlaybackState::Running {
            self.run_pass().await;
            completed += 1;
            let total = self.shared.passes.get() + 1;
            self.shared.passes.set(total);
            self.stage.log_event(format!("playback.pass {total}"));

            if self
                .config
                .max_passes
                .is_some_and(|limit| completed >= limit)
            {
                self.stop();
                break;
            }
            if self.config.pass_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.pass_interval).await;
            }
        }
        self.shared.loop_active.set(false);
        completed
    }
}
