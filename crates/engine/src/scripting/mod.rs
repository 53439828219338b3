//! Embedded Rhai scripting for zone content: NPCs, quests, music and delayed actions.

mod api;
mod environment;
mod log_context;
mod module;
mod music;

pub use api::{GameApi, NpcApi, NpcBuilder, ScriptCallback, ScriptCommand};
pub use environment::{
    LoadedScript, ScriptDirReport, ScriptEnvironment, ScriptError, SCRIPT_EXTENSION,
};
pub use log_context::ScriptLogContext;
pub use module::ScriptModule;
pub use music::{
    BackgroundMusicSource, DEFAULT_MUSIC_RADIUS, DEFAULT_MUSIC_VOLUME, DEFAULT_MUSIC_X,
    DEFAULT_MUSIC_Y,
};
