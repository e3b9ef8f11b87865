use std::pin::Pin;

use futures::FutureExt;
use serenity::{
    all::{Message, VoiceState},
    client::{Context, EventHandler},
    model::gateway::Ready,
};
use tracing::instrument;

use crate::{command::router::CommandRouter, event_handler, voice::songbird_transport::SongbirdTransport};

mod message;
mod ready;
mod voice_state_update;

pub(crate) struct Handler {
    pub(crate) router: CommandRouter<SongbirdTransport>,
    pub(crate) activity: String,
}

impl EventHandler for Handler {
    #[instrument(skip_all)]
    fn ready<'s, 'async_trait>(&'s self, context: Context, ready: Ready) -> Pin<Box<dyn Future<Output = ()> + Send + 'async_trait>>
    where
        Self: 'async_trait,
        's: 'async_trait,
    {
        async move {
            if let Err(err) = event_handler::ready::handle(self, context, ready).await {
                tracing::error!("failed to handle ready event\nError: {err:?}");
            }
        }
        .boxed()
    }

    #[instrument(skip_all)]
    fn message<'s, 'async_trait>(&'s self, context: Context, message: Message) -> Pin<Box<dyn Future<Output = ()> + Send + 'async_trait>>
    where
        Self: 'async_trait,
        's: 'async_trait,
    {
        async move {
            if let Err(err) = event_handler::message::handle(self, context, message).await {
                tracing::error!("failed to handle message event\nError: {err:?}");
            }
        }
        .boxed()
    }

    #[instrument(skip_all)]
    fn voice_state_update<'s, 'async_trait>(
        &'s self,
        context: Context,
        old_state: Option<VoiceState>,
        new_state: VoiceState,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'async_trait>>
    where
        Self: 'async_trait,
        's: 'async_trait,
    {
        async move {
            if let Err(err) = event_handler::voice_state_update::handle(self, context, old_state, new_state).await {
                tracing::error!("failed to handle voice state update event\nError: {err:?}");
            }
        }
        .boxed()
    }
}
