//! One task per guild owning that guild's [`PlaybackController`].
//!
//! Commands and track-end events share a single mailbox, so everything that mutates a
//! guild's playback state runs strictly one after another, while different guilds run on
//! independent tasks.

use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::music_manager::{MusicError, MusicResult};
use super::playback::{
    Enqueued, Notifier, PlaybackController, PlaybackSnapshot, SkipToOutcome,
};
use super::voice_sink::{PlaybackToken, VoiceSink};
use crate::commands::music::audio_sources::TrackResolver;

type Reply<T> = oneshot::Sender<T>;

/// Everything a guild player can be asked to do.
#[derive(Debug)]
pub enum GuildCommand {
    Enqueue {
        query: String,
        filter: Option<String>,
        reply: Reply<MusicResult<Enqueued>>,
    },
    AdvanceIfIdle {
        reply: Reply<bool>,
    },
    Advance {
        reply: Reply<()>,
    },
    SkipCurrent {
        reply: Reply<bool>,
    },
    SkipTo {
        index: usize,
        reply: Reply<MusicResult<SkipToOutcome>>,
    },
    ReplaceFilter {
        filter: Option<String>,
        reply: Reply<()>,
    },
    Shuffle {
        reply: Reply<()>,
    },
    ClearQueue {
        reply: Reply<()>,
    },
    SetLoopSong {
        enabled: bool,
        reply: Reply<()>,
    },
    SetLoopQueue {
        enabled: bool,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<PlaybackSnapshot>,
    },
    SetNoticeChannel {
        channel_id: ChannelId,
    },
    /// Posted by the voice transport when a stream finished or was stopped.
    TrackEnded {
        token: PlaybackToken,
        error: Option<String>,
    },
}

/// Cheap, cloneable front door to a guild player.
#[derive(Debug, Clone)]
pub struct GuildHandle {
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<GuildCommand>,
}

impl GuildHandle {
    /// Create a handle and the mailbox its player will drain.
    pub fn mailbox(guild_id: GuildId) -> (Self, mpsc::UnboundedReceiver<GuildCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { guild_id, tx }, rx)
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Raw sender for transports that post [`GuildCommand::TrackEnded`].
    pub fn sender(&self) -> mpsc::UnboundedSender<GuildCommand> {
        self.tx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> GuildCommand) -> MusicResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| MusicError::PlayerGone)?;
        response.await.map_err(|_| MusicError::PlayerGone)
    }

    fn post(&self, command: GuildCommand) -> MusicResult<()> {
        self.tx.send(command).map_err(|_| MusicError::PlayerGone)
    }

    pub async fn enqueue(
        &self,
        query: impl Into<String>,
        filter: Option<String>,
    ) -> MusicResult<Enqueued> {
        let query = query.into();
        self.request(|reply| GuildCommand::Enqueue {
            query,
            filter,
            reply,
        })
        .await?
    }

    pub async fn advance_if_idle(&self) -> MusicResult<bool> {
        self.request(|reply| GuildCommand::AdvanceIfIdle { reply })
            .await
    }

    pub async fn advance(&self) -> MusicResult<()> {
        self.request(|reply| GuildCommand::Advance { reply }).await
    }

    pub async fn skip_current(&self) -> MusicResult<bool> {
        self.request(|reply| GuildCommand::SkipCurrent { reply })
            .await
    }

    pub async fn skip_to(&self, index: usize) -> MusicResult<SkipToOutcome> {
        self.request(|reply| GuildCommand::SkipTo { index, reply })
            .await?
    }

    pub async fn replace_filter(&self, filter: Option<String>) -> MusicResult<()> {
        self.request(|reply| GuildCommand::ReplaceFilter { filter, reply })
            .await
    }

    pub async fn shuffle(&self) -> MusicResult<()> {
        self.request(|reply| GuildCommand::Shuffle { reply }).await
    }

    pub async fn clear_queue(&self) -> MusicResult<()> {
        self.request(|reply| GuildCommand::ClearQueue { reply })
            .await
    }

    pub async fn set_loop_song(&self, enabled: bool) -> MusicResult<()> {
        self.request(|reply| GuildCommand::SetLoopSong { enabled, reply })
            .await
    }

    pub async fn set_loop_queue(&self, enabled: bool) -> MusicResult<()> {
        self.request(|reply| GuildCommand::SetLoopQueue { enabled, reply })
            .await
    }

    pub async fn stop(&self) -> MusicResult<()> {
        self.request(|reply| GuildCommand::Stop { reply }).await
    }

    pub async fn snapshot(&self) -> MusicResult<PlaybackSnapshot> {
        self.request(|reply| GuildCommand::Snapshot { reply })
            .await
    }

    pub fn set_notice_channel(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.post(GuildCommand::SetNoticeChannel { channel_id })
    }

    pub fn track_ended(&self, token: PlaybackToken, error: Option<String>) -> MusicResult<()> {
        self.post(GuildCommand::TrackEnded { token, error })
    }
}

/// Spawn the task that owns `controller` and drains `mailbox`.
pub fn spawn_guild_player<R, V, N>(
    controller: PlaybackController<R, V>,
    notifier: N,
    mailbox: mpsc::UnboundedReceiver<GuildCommand>,
) -> JoinHandle<()>
where
    R: TrackResolver + 'static,
    V: VoiceSink<Stream = R::Stream> + 'static,
    N: Notifier + 'static,
{
    tokio::spawn(run_guild_player(controller, notifier, mailbox))
}

/// Process commands until every [`GuildHandle`] is dropped.
pub async fn run_guild_player<R, V, N>(
    mut controller: PlaybackController<R, V>,
    mut notifier: N,
    mut mailbox: mpsc::UnboundedReceiver<GuildCommand>,
) where
    R: TrackResolver,
    V: VoiceSink<Stream = R::Stream>,
    N: Notifier,
{
    let guild_id = controller.guild_id();
    info!("Guild player started for guild {}", guild_id);

    while let Some(command) = mailbox.recv().await {
        match command {
            GuildCommand::Enqueue {
                query,
                filter,
                reply,
            } => {
                let _ = reply.send(controller.enqueue(&query, filter).await);
            }
            GuildCommand::AdvanceIfIdle { reply } => {
                let _ = reply.send(controller.advance_if_idle(&notifier).await);
            }
            GuildCommand::Advance { reply } => {
                controller.advance(&notifier).await;
                let _ = reply.send(());
            }
            GuildCommand::SkipCurrent { reply } => {
                let _ = reply.send(controller.skip_current().await);
            }
            GuildCommand::SkipTo { index, reply } => {
                let _ = reply.send(controller.skip_to(index, &notifier).await);
            }
            GuildCommand::ReplaceFilter { filter, reply } => {
                controller.replace_filter(filter, &notifier).await;
                let _ = reply.send(());
            }
            GuildCommand::Shuffle { reply } => {
                controller.shuffle();
                let _ = reply.send(());
            }
            GuildCommand::ClearQueue { reply } => {
                controller.clear_queue();
                let _ = reply.send(());
            }
            GuildCommand::SetLoopSong { enabled, reply } => {
                controller.set_loop_song(enabled);
                let _ = reply.send(());
            }
            GuildCommand::SetLoopQueue { enabled, reply } => {
                controller.set_loop_queue(enabled);
                let _ = reply.send(());
            }
            GuildCommand::Stop { reply } => {
                controller.stop().await;
                let _ = reply.send(());
            }
            GuildCommand::Snapshot { reply } => {
                let _ = reply.send(controller.snapshot());
            }
            GuildCommand::SetNoticeChannel { channel_id } => {
                debug!("Notices for guild {} now go to {}", guild_id, channel_id);
                notifier.redirect(channel_id);
            }
            GuildCommand::TrackEnded { token, error } => {
                controller.on_track_end(token, error, &notifier).await;
            }
        }
    }

    info!("Guild player stopped for guild {}", guild_id);
}
