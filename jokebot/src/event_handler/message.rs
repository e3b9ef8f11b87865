use anyhow::{Context as _, Result};
use serenity::all::{Colour, Context, CreateAllowedMentions, CreateEmbed, CreateEmbedFooter, CreateMessage, Message};

use crate::{
    command::router::{ChatMessage, InvocationContext},
    event_handler::Handler,
    response::{Embed, Reply},
};

struct MessageHandler<'a> {
    event_handler: &'a Handler,
    context: &'a Context,
    message: &'a Message,
}

impl<'a> MessageHandler<'a> {
    fn new(event_handler: &'a Handler, context: &'a Context, message: &'a Message) -> Self {
        Self {
            event_handler,
            context,
            message,
        }
    }

    /// Resolves the guild and the author's current voice channel from the cache.
    fn invocation_context(&self) -> InvocationContext {
        let Some(guild_id) = self.message.guild_id else {
            return InvocationContext::default();
        };

        let invoker_voice_channel = guild_id.to_guild_cached(&self.context.cache).and_then(|guild| {
            guild
                .voice_states
                .get(&self.message.author.id)
                .and_then(|voice_state| voice_state.channel_id)
        });

        InvocationContext {
            guild_id: Some(guild_id),
            invoker_voice_channel,
        }
    }

    async fn handle(&self) -> Result<()> {
        // Skip when the message is authored by bot
        if self.message.author.bot {
            return Ok(());
        }

        let invocation_context = self.invocation_context();
        if let Some(command) = self.event_handler.router.route(self, &invocation_context).await? {
            tracing::debug!("{} handled {}", self.message.id, command.as_ref());
        }

        Ok(())
    }
}

impl ChatMessage for MessageHandler<'_> {
    fn content(&self) -> &str {
        &self.message.content
    }

    async fn reply(&self, text: String) -> Result<()> {
        self.message
            .reply(self.context, text)
            .await
            .with_context(|| format!("failed to reply to {}", self.message.id))?;

        Ok(())
    }

    async fn send(&self, reply: Reply) -> Result<()> {
        self.message
            .channel_id
            .send_message(self.context, create_message(reply))
            .await
            .with_context(|| format!("failed to send message to {}", self.message.channel_id))?;

        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        self.message
            .delete(self.context)
            .await
            .with_context(|| format!("failed to delete {}", self.message.id))
    }
}

/// Builds an outgoing message that never pings anyone, whatever the text contains.
fn create_message(reply: Reply) -> CreateMessage {
    let builder = match reply {
        Reply::Text(text) => CreateMessage::new().content(text),
        Reply::Embed(embed) => CreateMessage::new().embed(embed.into()),
    };

    builder.allowed_mentions(CreateAllowedMentions::new())
}

impl From<Embed> for CreateEmbed {
    fn from(embed: Embed) -> Self {
        let mut create_embed = CreateEmbed::new()
            .title(embed.title)
            .colour(Colour::new(embed.colour))
            .fields(embed.fields.into_iter().map(|field| (field.name, field.value, field.inline)));

        if let Some(description) = embed.description {
            create_embed = create_embed.description(description);
        }
        if let Some(footer) = embed.footer {
            create_embed = create_embed.footer(CreateEmbedFooter::new(footer));
        }

        create_embed
    }
}

pub(crate) async fn handle(event_handler: &Handler, context: Context, message: Message) -> Result<()> {
    let handler = MessageHandler::new(event_handler, &context, &message);
    handler.handle().await
}
