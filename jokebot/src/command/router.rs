use std::{future::Future, sync::Arc};

use anyhow::{Context as _, Result};
use serenity::all::{ChannelId, GuildId};
use tracing::Instrument;

use crate::{
    catalog::{AudioCatalog, AudioClip},
    command::{CommandName, CommandTable, ParsedInvocation},
    error::{CommandError, DeleteFailed, VoiceError},
    response::{Reply, ResponseFormatter},
    voice::{VoiceSessionController, VoiceTransport},
};

/// An inbound chat message the router can answer.
pub(crate) trait ChatMessage: Send + Sync {
    fn content(&self) -> &str;

    /// Answers the author directly.
    fn reply(&self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Posts a new message in the same channel.
    fn send(&self, reply: Reply) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InvocationContext {
    pub(crate) guild_id: Option<GuildId>,
    pub(crate) invoker_voice_channel: Option<ChannelId>,
}

impl InvocationContext {
    pub(crate) fn is_from_guild(&self) -> bool {
        self.guild_id.is_some()
    }
}

pub(crate) struct CommandRouter<Transport> {
    prefix: String,
    commands: CommandTable,
    formatter: ResponseFormatter,
    catalog: Arc<AudioCatalog>,
    voice: VoiceSessionController<Transport>,
}

impl<Transport: VoiceTransport> CommandRouter<Transport> {
    pub(crate) fn new(prefix: impl Into<String>, catalog: Arc<AudioCatalog>, voice: VoiceSessionController<Transport>) -> Self {
        let prefix = prefix.into();

        Self {
            commands: CommandTable::standard(),
            formatter: ResponseFormatter::new(prefix.clone()),
            prefix,
            catalog,
            voice,
        }
    }

    pub(crate) fn voice(&self) -> &VoiceSessionController<Transport> {
        &self.voice
    }

    /// Handles one message. Returns the command that ran, if any.
    ///
    /// Voice and catalog failures become replies; only chat transport failures are returned.
    pub(crate) async fn route(&self, message: &impl ChatMessage, context: &InvocationContext) -> Result<Option<CommandName>> {
        let Some(ParsedInvocation { command, args }) = self.commands.parse(&self.prefix, message.content()) else {
            return Ok(None);
        };

        if self.commands.get(command).is_some_and(|command| command.guild_only) && !context.is_from_guild() {
            tracing::debug!("ignoring {} outside of a guild", command.as_ref());
            return Ok(None);
        }

        tracing::info!("received {} in {:?}", command.as_ref(), context.guild_id);

        match (command, context.guild_id) {
            (CommandName::Ping, _) => self.respond(message, self.formatter.pong()).await?,
            (CommandName::Joke, Some(guild_id)) => self.joke(message, guild_id, context.invoker_voice_channel).await?,
            (CommandName::Leave, Some(guild_id)) => self.leave(guild_id).await,
            (CommandName::Joke | CommandName::Leave, None) => return Ok(None),
            (CommandName::Say, _) => {
                if !self.say(message, &args).await? {
                    return Ok(None);
                }
            },
            (CommandName::Help, _) => self.respond(message, self.formatter.help(&self.commands)).await?,
        }

        Ok(Some(command))
    }

    async fn respond(&self, message: &impl ChatMessage, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => message.reply(text).await.context("failed to reply"),
            embed @ Reply::Embed(_) => message.send(embed).await.context("failed to send embed"),
        }
    }

    async fn joke(&self, message: &impl ChatMessage, guild_id: GuildId, channel_id: Option<ChannelId>) -> Result<()> {
        let reply = match self.play_random_clip(guild_id, channel_id).await {
            Ok(clip) => self.formatter.joke(&clip),
            Err(err) => {
                tracing::warn!("failed to play a joke in {guild_id}\nError: {err:?}");
                self.formatter.joke_failed(&err)
            },
        };

        self.respond(message, reply).await
    }

    async fn play_random_clip(&self, guild_id: GuildId, channel_id: Option<ChannelId>) -> Result<AudioClip, CommandError> {
        let channel_id = channel_id.ok_or(VoiceError::NoChannel)?;
        let clip = self.catalog.pick_random()?.clone();

        let ticket = self.voice.join(guild_id, channel_id).await?;
        let playback = self.voice.play_clip(ticket, &clip).await?;

        let label = clip.label().to_string();
        tokio::spawn(
            async move {
                playback.finished().await;
                tracing::debug!("{label} finished in {guild_id}");
            }
            .in_current_span(),
        );

        Ok(clip)
    }

    async fn leave(&self, guild_id: GuildId) {
        match self.voice.leave(guild_id).await {
            Ok(true) => tracing::info!("left voice in {guild_id} on request"),
            Ok(false) => tracing::debug!("nothing to leave in {guild_id}"),
            Err(err) => tracing::warn!("failed to leave voice in {guild_id}\nError: {err:?}"),
        }
    }

    /// Reposts `args` in place of the invocation. Returns whether anything was posted.
    async fn say(&self, message: &impl ChatMessage, args: &[String]) -> Result<bool> {
        if args.is_empty() {
            return Ok(false);
        }

        if let Err(err) = message.delete().await {
            let err = DeleteFailed(err);
            tracing::warn!("{err:?}");
        }

        message
            .send(Reply::Text(args.join(" ")))
            .await
            .context("failed to send say message")?;

        Ok(true)
    }
}
