//! Sprite script engine.
//!
//! Actors hold programs built from motion, looks and control blocks. Every
//! authored script is broadcast to every actor through the [`registry`],
//! colliding actors trade programs through [`swap`], and the [`playback`]
//! controller replays all programs, one actor at a time, on a bounded
//! 450x450 stage.

pub mod actors;
pub mod collision;
pub mod interpreter;
pub mod playback;
pub mod registry;
pub mod script;
pub mod stage;
pub mod swap;

pub use actors::{Actor, ActorId, Bubble, BubbleStyle, Position};
pub use collision::{CollisionTable, Edge, PairKey};
pub use interpreter::Step;
pub use playback::{PlaybackConfig, PlaybackController, PlaybackState};
pub use registry::ScriptRegistry;
pub use script::{Block, Category, ParamValue, Script, ScriptId, ScriptIdAllocator};
pub use stage::{ActorView, Stage, StageConfig, StageError, StageHandle, DEFAULT_EVENT_CAPACITY};
