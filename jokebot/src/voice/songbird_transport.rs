use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use serenity::{
    all::{ChannelId, GuildId},
    async_trait,
};
use songbird::{
    Event,
    EventContext,
    EventHandler,
    Songbird,
    TrackEvent,
    error::JoinError,
    input::File,
    tracks::PlayMode,
};
use tokio::sync::{Mutex, oneshot};

use super::{PlaybackEnd, TransportTimeout, VoiceTransport};

/// Voice transport backed by the songbird instance registered on the serenity client.
#[derive(Clone)]
pub(crate) struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub(crate) fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

impl VoiceTransport for SongbirdTransport {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|err| join_error(err, channel_id))?;

        if let Err(err) = call.lock().await.deafen(true).await {
            tracing::warn!("failed to deafen in {channel_id}\nError: {err:?}");
        }

        Ok(())
    }

    async fn play(&self, guild_id: GuildId, path: PathBuf) -> Result<oneshot::Receiver<PlaybackEnd>> {
        let call = self
            .manager
            .get(guild_id)
            .with_context(|| format!("no voice call in guild {guild_id}"))?;

        let (sender, receiver) = oneshot::channel();
        let notifier = EndNotifier {
            sender: Arc::new(Mutex::new(Some(sender))),
        };

        let track = call.lock().await.play_input(File::new(path.clone()).into());
        track
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .with_context(|| format!("failed to watch the end of {}", path.display()))?;
        track
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .with_context(|| format!("failed to watch errors of {}", path.display()))?;

        tracing::debug!("streaming {}", path.display());
        Ok(receiver)
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        match self.manager.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to leave voice in guild {guild_id}")),
        }
    }
}

/// Tags songbird's own join timeout so the controller reports it as a connection timeout.
fn join_error(err: JoinError, channel_id: ChannelId) -> anyhow::Error {
    let timed_out = matches!(err, JoinError::TimedOut);
    let err = anyhow::Error::new(err).context(format!("failed to join voice channel {channel_id}"));

    match timed_out {
        true => err.context(TransportTimeout),
        false => err,
    }
}

/// Forwards the first end or error event of a track to the session watcher.
#[derive(Clone)]
struct EndNotifier {
    sender: Arc<Mutex<Option<oneshot::Sender<PlaybackEnd>>>>,
}

#[async_trait]
impl EventHandler for EndNotifier {
    async fn act(&self, context: &EventContext<'_>) -> Option<Event> {
        let end = match context {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(err) => Some(PlaybackEnd::Errored(format!("{err:?}"))),
                    _ => None,
                })
                .unwrap_or(PlaybackEnd::Finished),
            _ => PlaybackEnd::Finished,
        };

        if let Some(sender) = self.sender.lock().await.take() {
            // The watcher is gone when the session was left before the track ended.
            let _ = sender.send(end);
        }

        Some(Event::Cancel)
    }
}
