use anyhow::Result;
use serenity::all::{ActivityData, Context, Ready};

use super::Handler;

pub(crate) async fn handle(handler: &Handler, context: Context, ready: Ready) -> Result<()> {
    tracing::info!("{} is ready in {} guilds", ready.user.name, ready.guilds.len());

    context.set_activity(Some(ActivityData::playing(&handler.activity)));

    Ok(())
}
