// Export music utilities
pub mod embedded_messages;
pub mod event_handlers;
pub mod filters;
pub mod guild_player;
pub mod music_manager;
pub mod playback;
pub mod voice_sink;
