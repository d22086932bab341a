use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::{Call, Songbird};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use super::embedded_messages::ChannelNotifier;
use super::guild_player::{GuildHandle, spawn_guild_player};
use super::playback::PlaybackController;
use super::voice_sink::SongbirdSink;
use crate::commands::music::audio_sources::SourceResolver;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Could not resolve track: {0}")]
    ResolutionFailure(String),

    #[error("Invalid queue position {index}, the queue has {len} entries")]
    InvalidIndex { index: usize, len: usize },

    #[error("Voice transport error: {0}")]
    TransportError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("The guild player is no longer running")]
    PlayerGone,
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Registry of per-guild players, plus the songbird plumbing commands need around them.
pub struct MusicManager {
    players: DashMap<GuildId, GuildHandle>,
    resolver: Arc<SourceResolver>,
    settle_delay: Duration,
}

impl MusicManager {
    pub fn new(resolver: Arc<SourceResolver>, settle_delay: Duration) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            settle_delay,
        }
    }

    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the current voice channel call handle
    pub async fn get_call(
        ctx: &Context,
        guild_id: GuildId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;
        songbird.get(guild_id).ok_or(MusicError::NotConnected)
    }

    /// The guild's player, created on first use.
    ///
    /// A player whose task died is replaced with a fresh, empty one.
    pub async fn player(&self, ctx: &Context, guild_id: GuildId) -> MusicResult<GuildHandle> {
        if let Some(handle) = self.existing(guild_id) {
            return Ok(handle);
        }

        let songbird = Self::get_songbird(ctx).await?;
        let handle = match self.players.entry(guild_id) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                warn!("Guild player for {} had stopped, starting a new one", guild_id);
                let handle = self.spawn_player(songbird, ctx.http.clone(), guild_id);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn_player(songbird, ctx.http.clone(), guild_id);
                entry.insert(handle.clone());
                handle
            }
        };

        Ok(handle)
    }

    /// The guild's player if one is running; never creates one.
    pub fn existing(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.players
            .get(&guild_id)
            .filter(|handle| !handle.is_closed())
            .map(|handle| handle.clone())
    }

    fn spawn_player(
        &self,
        songbird: Arc<Songbird>,
        http: Arc<serenity::Http>,
        guild_id: GuildId,
    ) -> GuildHandle {
        let (handle, mailbox) = GuildHandle::mailbox(guild_id);
        let sink = SongbirdSink::new(songbird, guild_id, handle.sender(), self.settle_delay);
        let controller = PlaybackController::new(guild_id, self.resolver.clone(), sink);

        spawn_guild_player(controller, ChannelNotifier::new(http), mailbox);
        info!("Created guild player for guild {}", guild_id);

        handle
    }

    /// Stop playback in every guild, waiting for all players to acknowledge.
    pub async fn shutdown(&self) {
        let handles: Vec<GuildHandle> = self
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        info!("Stopping {} guild player(s)", handles.len());
        let results = join_all(handles.iter().map(|handle| handle.stop())).await;

        for (handle, result) in handles.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to stop player for guild {}: {}", handle.guild_id(), e);
            }
        }
    }

    /// Join a voice channel
    pub async fn join_channel(
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;

        let handle = songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        Ok(handle)
    }

    /// Leave a voice channel
    pub async fn leave_channel(ctx: &Context, guild_id: GuildId) -> MusicResult<()> {
        let songbird = Self::get_songbird(ctx).await?;

        if songbird.get(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }

        songbird
            .remove(guild_id)
            .await
            .map_err(|_| MusicError::JoinError("Failed to leave voice channel".to_string()))?;

        Ok(())
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }

    /// Join the user's voice channel unless the bot is already connected in this guild.
    pub async fn ensure_voice_connection(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<()> {
        let songbird = Self::get_songbird(ctx).await?;
        if songbird.get(guild_id).is_some() {
            return Ok(());
        }

        let channel_id = Self::get_user_voice_channel(ctx, guild_id, user_id)?;
        if let Err(err) = songbird.join(guild_id, channel_id).await {
            error!(
                "Failed to join voice channel {} for guild {}: {}",
                channel_id, guild_id, err
            );
            return Err(MusicError::JoinError(err.to_string()));
        }

        info!("Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }
}
