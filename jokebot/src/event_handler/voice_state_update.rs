use anyhow::Result;
use serenity::all::{Context, VoiceState};
use serenity_utils::voice_state::{VoiceStateAction, VoiceStateConnection};

use super::Handler;

/// Releases the session of a guild when the bot was disconnected by someone else.
pub(crate) async fn handle(handler: &Handler, context: Context, old_state: Option<VoiceState>, new_state: VoiceState) -> Result<()> {
    let action = VoiceStateAction::new(old_state.as_ref(), &new_state);
    let Some(guild_id) = action.guild_id() else {
        return Ok(());
    };

    let bot_id = context.cache.current_user().id;
    if !action.is_bot_action(bot_id) {
        return Ok(());
    }

    let VoiceStateConnection::Left(channel_id) = action.connection() else {
        return Ok(());
    };

    let voice = handler.router.voice();
    // A connecting session may still see the disconnect of the previous one.
    if !voice.leave_if_playing_in(guild_id, channel_id).await? {
        tracing::debug!(
            "ignoring disconnect from {channel_id}, session in {guild_id} is {:?}",
            voice.state(guild_id).await
        );
        return Ok(());
    }

    tracing::info!("released session in {guild_id} after being disconnected from {channel_id}");

    Ok(())
}
