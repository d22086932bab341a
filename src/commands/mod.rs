//! This module aggregates all the command modules for the bot.

/// Commands related to music playback, plus the playback engine behind them.
pub mod music;
