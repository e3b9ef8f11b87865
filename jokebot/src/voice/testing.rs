//! Voice transport double shared by the controller and router tests.
use std::{path::PathBuf, sync::Mutex as StdMutex};

use anyhow::{Result, anyhow};
use hashbrown::{HashMap, HashSet};
use serenity::all::{ChannelId, GuildId};
use tokio::sync::oneshot;

use super::{PlaybackEnd, VoiceTransport};

/// Records every call and keeps the end-of-stream senders so tests decide when playback ends.
#[derive(Default)]
pub(crate) struct FakeTransport {
    pub(crate) hanging_guilds: HashSet<GuildId>,
    pub(crate) failing_play: bool,
    pub(crate) joined: StdMutex<Vec<(GuildId, ChannelId)>>,
    pub(crate) connections: StdMutex<HashMap<GuildId, usize>>,
    pub(crate) max_connections: StdMutex<usize>,
    pub(crate) leaves: StdMutex<Vec<GuildId>>,
    pub(crate) played: StdMutex<Vec<(GuildId, PathBuf)>>,
    pub(crate) endings: StdMutex<HashMap<GuildId, Vec<oneshot::Sender<PlaybackEnd>>>>,
}

impl FakeTransport {
    pub(crate) fn connections(&self, guild_id: GuildId) -> usize {
        self.connections.lock().unwrap().get(&guild_id).copied().unwrap_or_default()
    }

    pub(crate) fn leave_count(&self) -> usize {
        self.leaves.lock().unwrap().len()
    }

    pub(crate) fn end(&self, guild_id: GuildId, end: PlaybackEnd) -> bool {
        let sender = self.endings.lock().unwrap().get_mut(&guild_id).and_then(Vec::pop);
        sender.is_some_and(|sender| sender.send(end).is_ok())
    }
}

impl VoiceTransport for FakeTransport {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        if self.hanging_guilds.contains(&guild_id) {
            std::future::pending::<()>().await;
        }

        self.joined.lock().unwrap().push((guild_id, channel_id));

        let mut connections = self.connections.lock().unwrap();
        let count = connections.entry(guild_id).or_default();
        *count += 1;
        let mut max = self.max_connections.lock().unwrap();
        *max = (*max).max(*count);

        Ok(())
    }

    async fn play(&self, guild_id: GuildId, path: PathBuf) -> Result<oneshot::Receiver<PlaybackEnd>> {
        if self.failing_play {
            return Err(anyhow!("decoder exploded"));
        }

        let (sender, receiver) = oneshot::channel();
        self.played.lock().unwrap().push((guild_id, path));
        self.endings.lock().unwrap().entry(guild_id).or_default().push(sender);

        Ok(receiver)
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.connections.lock().unwrap().remove(&guild_id);
        self.leaves.lock().unwrap().push(guild_id);

        Ok(())
    }
}
