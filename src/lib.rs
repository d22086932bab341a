//! Rusty's music crate: per-guild playback control for a Discord voice bot.
//!
//! The binary in `main.rs` wires these modules into a poise framework; everything that
//! decides *what* plays lives under [`commands::music::utils`].

use std::sync::Arc;

pub mod commands;
pub mod config;

use commands::music::utils::music_manager::MusicManager;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    /// Registry of per-guild players
    pub music: Arc<MusicManager>,
}
