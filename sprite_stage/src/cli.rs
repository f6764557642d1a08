use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless stage that plays sprite scripts authored in a scenario file",
    version
)]
pub struct Args {
    /// Scenario JSON with actor placements and authored scripts (default: one starter actor, no scripts)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Number of playback passes to run before stopping
    #[arg(long, default_value_t = 1)]
    pub passes: u64,

    /// Seed for spawn positions (overrides the scenario's seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Multiplier for say/think durations; 0 makes dialogue instantaneous
    #[arg(long, default_value_t = 1.0)]
    pub time_scale: f64,

    /// Delay between passes in milliseconds
    #[arg(long, default_value_t = 16)]
    pub pass_interval_ms: u64,

    /// Path to write the engine event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the final actor read model as JSON
    #[arg(long)]
    pub snapshot_json: Option<PathBuf>,

    /// Print the palette blocks with their default parameters and exit
    #[arg(long)]
    pub list_blocks: bool,

    /// Print every engine event after playback
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Command {
    Play(PlayArgs),
    ListBlocks,
}

#[derive(Debug)]
pub struct PlayArgs {
    pub scenario: Option<PathBuf>,
    pub passes: u64,
    pub seed: Option<u64>,
    pub time_scale: f64,
    pub pass_interval: Duration,
    pub event_log_json: Option<PathBuf>,
    pub snapshot_json: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse() -> Result<(Command, bool)> {
    let args = Args::parse();
    let verbose = args.verbose;
    Ok((args.into_command()?, verbose))
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if self.list_blocks {
            if self.scenario.is_some() {
                eprintln!("[sprite_stage] warning: --scenario is ignored with --list-blocks");
            }
            return Ok(Command::ListBlocks);
        }

        if self.passes == 0 {
            bail!("--passes must be at least 1");
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            bail!(
                "--time-scale must be a non-negative number (got {})",
                self.time_scale
            );
        }

        Ok(Command::Play(PlayArgs {
            scenario: self.scenario,
            passes: self.passes,
            seed: self.seed,
            time_scale: self.time_scale,
            pass_interval: Duration::from_millis(self.pass_interval_ms),
            event_log_json: self.event_log_json,
            snapshot_json: self.snapshot_json,
            verbose: self.verbose,
        }))
    }
}
