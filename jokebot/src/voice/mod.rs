//! Per-guild voice session lifecycle.
//!
//! A guild is `Idle` when it has no session. `join` moves it to `Connecting`, `play_clip` to `Playing`,
//! and playback completion, `leave` or any transport failure bring it back to `Idle` after the
//! connection has been released.
use std::{
    future::Future,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use hashbrown::HashMap;
use serenity::all::{ChannelId, GuildId};
use tokio::{
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
};
use tracing::Instrument;

use crate::{catalog::AudioClip, error::VoiceError};

pub(crate) mod songbird_transport;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a stream ended, as reported by the voice transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlaybackEnd {
    Finished,
    Errored(String),
}

/// Marks a transport join failure as a timeout so it is reported as `ConnectionTimeout`.
#[derive(Debug, thiserror::Error)]
#[error("voice transport timed out while connecting")]
pub(crate) struct TransportTimeout;

pub(crate) trait VoiceTransport: Send + Sync + 'static {
    fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Starts streaming `path`; the receiver resolves once the stream has ended.
    fn play(&self, guild_id: GuildId, path: PathBuf) -> impl Future<Output = anyhow::Result<oneshot::Receiver<PlaybackEnd>>> + Send;

    /// Releases the connection for `guild_id`. Must succeed when there is nothing to release.
    fn leave(&self, guild_id: GuildId) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Idle,
    Connecting,
    Playing,
}

/// Identifies one session generation of one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionTicket {
    guild_id: GuildId,
    id: u64,
}

/// Resolves once the session that started the playback has been released.
#[derive(Debug)]
pub(crate) struct Playback {
    watcher: JoinHandle<()>,
}

impl Playback {
    pub(crate) async fn finished(self) {
        if let Err(err) = self.watcher.await {
            tracing::error!("playback watcher panicked\nError: {err:?}");
        }
    }
}

#[derive(Debug)]
struct Session {
    id: u64,
    channel_id: ChannelId,
    state: SessionState,
    interrupt: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct GuildSlot {
    session: Option<Session>,
}

impl GuildSlot {
    fn current(&self, id: u64) -> Option<&Session> {
        self.session.as_ref().filter(|session| session.id == id)
    }

    fn take_if(&mut self, id: u64) -> Option<Session> {
        self.current(id)?;
        self.session.take()
    }
}

pub(crate) struct VoiceSessionController<Transport> {
    inner: Arc<Inner<Transport>>,
}

struct Inner<Transport> {
    transport: Transport,
    connect_timeout: Duration,
    slots: Mutex<HashMap<GuildId, Arc<Mutex<GuildSlot>>>>,
    next_id: AtomicU64,
}

impl<Transport> Clone for VoiceSessionController<Transport> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Transport: VoiceTransport> VoiceSessionController<Transport> {
    pub(crate) fn new(transport: Transport, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                connect_timeout,
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    pub(crate) async fn state(&self, guild_id: GuildId) -> SessionState {
        let Some(slot) = self.inner.slots.lock().await.get(&guild_id).cloned() else {
            return SessionState::Idle;
        };

        slot.lock()
            .await
            .session
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    /// The channel the guild's session is bound to, if any.
    #[cfg(test)]
    pub(crate) async fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let slot = self.inner.slots.lock().await.get(&guild_id).cloned()?;
        let slot = slot.lock().await;
        slot.session.as_ref().map(|session| session.channel_id)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<SessionTicket, VoiceError> {
        let slot = self.inner.slot(guild_id).await;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (interrupt, interrupted) = watch::channel(false);

        {
            let mut slot = slot.lock().await;
            if slot.session.is_some() {
                return Err(VoiceError::AlreadyActive(guild_id));
            }
            slot.session = Some(Session {
                id,
                channel_id,
                state: SessionState::Connecting,
                interrupt,
            });
        }

        let connect = tokio::time::timeout(self.inner.connect_timeout, self.inner.transport.join(guild_id, channel_id));
        let failure = tokio::select! {
            result = connect => match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) if err.is::<TransportTimeout>() => Some(VoiceError::ConnectionTimeout(guild_id, self.inner.connect_timeout)),
                Ok(Err(err)) => Some(VoiceError::TransportError(err)),
                Err(_) => Some(VoiceError::ConnectionTimeout(guild_id, self.inner.connect_timeout)),
            },
            _ = wait_interrupted(interrupted) => {
                tracing::info!("connecting to {channel_id} was interrupted");
                return Err(VoiceError::Interrupted(guild_id));
            },
        };

        let mut slot = slot.lock().await;
        if let Some(failure) = failure {
            tracing::error!("failed to connect to {channel_id}\nError: {failure:?}");
            if slot.take_if(id).is_some() {
                self.inner.release(guild_id).await;
            }
            return Err(failure);
        }

        if slot.current(id).is_none() {
            // `leave` won the race against a connection that completed afterwards.
            if slot.session.is_none() {
                self.inner.release(guild_id).await;
            }
            return Err(VoiceError::Interrupted(guild_id));
        }

        tracing::info!("connected to {channel_id}");
        Ok(SessionTicket { guild_id, id })
    }

    /// Streams `clip` on the session and releases the connection once it has finished.
    #[tracing::instrument(skip(self, clip), fields(clip = clip.label()))]
    pub(crate) async fn play_clip(&self, ticket: SessionTicket, clip: &AudioClip) -> Result<Playback, VoiceError> {
        let SessionTicket { guild_id, id } = ticket;
        let slot = self.inner.slot(guild_id).await;
        let mut guard = slot.lock().await;

        let interrupted = match guard.current(id) {
            Some(session) => session.interrupt.subscribe(),
            None => return Err(VoiceError::Inactive(guild_id)),
        };

        let ended = match self.inner.transport.play(guild_id, clip.path().to_path_buf()).await {
            Ok(ended) => ended,
            Err(err) => {
                tracing::error!("failed to start {}\nError: {err:?}", clip.label());
                guard.take_if(id);
                self.inner.release(guild_id).await;
                return Err(VoiceError::TransportError(err));
            },
        };

        if let Some(session) = guard.session.as_mut() {
            session.state = SessionState::Playing;
        }
        drop(guard);

        let inner = self.inner.clone();
        let watcher = tokio::spawn(
            async move {
                tokio::select! {
                    ended = ended => match ended {
                        Ok(PlaybackEnd::Finished) => tracing::info!("playback finished"),
                        Ok(PlaybackEnd::Errored(reason)) => tracing::error!("playback failed\nError: {reason}"),
                        Err(_) => tracing::warn!("playback ended without notification"),
                    },
                    _ = wait_interrupted(interrupted) => return,
                }

                let mut slot = slot.lock().await;
                if slot.take_if(id).is_some() {
                    inner.release(guild_id).await;
                }
            }
            .in_current_span(),
        );

        Ok(Playback { watcher })
    }

    /// Releases the guild's session, whatever state it is in. Returns whether there was one.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn leave(&self, guild_id: GuildId) -> Result<bool, VoiceError> {
        self.leave_matching(guild_id, |_| true).await
    }

    /// Releases the guild's session only if it is playing in `channel_id`.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn leave_if_playing_in(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<bool, VoiceError> {
        self.leave_matching(guild_id, |session| {
            session.state == SessionState::Playing && session.channel_id == channel_id
        })
        .await
    }

    async fn leave_matching(&self, guild_id: GuildId, matches: impl FnOnce(&Session) -> bool) -> Result<bool, VoiceError> {
        let Some(slot) = self.inner.slots.lock().await.get(&guild_id).cloned() else {
            return Ok(false);
        };

        let mut slot = slot.lock().await;
        if !slot.session.as_ref().is_some_and(matches) {
            return Ok(false);
        }
        let Some(session) = slot.session.take() else {
            return Ok(false);
        };

        session.interrupt.send_replace(true);
        self.inner
            .transport
            .leave(guild_id)
            .await
            .map_err(VoiceError::TransportError)?;

        tracing::info!("left {}", session.channel_id);
        Ok(true)
    }
}

/// Resolves once the session is left or dropped.
async fn wait_interrupted(mut interrupted: watch::Receiver<bool>) {
    let _ = interrupted.wait_for(|interrupted| *interrupted).await;
}

impl<Transport: VoiceTransport> Inner<Transport> {
    async fn slot(&self, guild_id: GuildId) -> Arc<Mutex<GuildSlot>> {
        self.slots.lock().await.entry(guild_id).or_default().clone()
    }

    async fn release(&self, guild_id: GuildId) {
        if let Err(err) = self.transport.leave(guild_id).await {
            tracing::error!("failed to release voice connection in {guild_id}\nError: {err:?}");
        }
    }
}
