use serenity::all::{ChannelId, GuildId, UserId, VoiceState};

/// A voice state update reduced to the parts needed to tell what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateAction {
    user_id: UserId,
    guild_id: Option<GuildId>,
    old_channel_id: Option<ChannelId>,
    new_channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStateConnection {
    Joined(ChannelId),
    Left(ChannelId),
    Moved(ChannelId, ChannelId),
    NoAction,
}

impl VoiceStateAction {
    pub fn new(old_state: Option<&VoiceState>, new_state: &VoiceState) -> Self {
        Self {
            user_id: new_state.user_id,
            guild_id: new_state.guild_id,
            old_channel_id: old_state.and_then(|state| state.channel_id),
            new_channel_id: new_state.channel_id,
        }
    }

    #[cfg(test)]
    fn from_parts(
        user_id: UserId,
        guild_id: Option<GuildId>,
        old_channel_id: Option<ChannelId>,
        new_channel_id: Option<ChannelId>,
    ) -> Self {
        Self {
            user_id,
            guild_id,
            old_channel_id,
            new_channel_id,
        }
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    pub fn connection(&self) -> VoiceStateConnection {
        match (self.old_channel_id, self.new_channel_id) {
            (Some(old_channel_id), Some(new_channel_id)) if old_channel_id != new_channel_id => {
                tracing::debug!("{} moved voice channel from {old_channel_id} to {new_channel_id}", self.user_id);
                VoiceStateConnection::Moved(old_channel_id, new_channel_id)
            },
            (Some(channel_id), None) => {
                tracing::debug!("{} left voice channel {channel_id}", self.user_id);
                VoiceStateConnection::Left(channel_id)
            },
            (None, Some(channel_id)) => {
                tracing::debug!("{} joined voice channel {channel_id}", self.user_id);
                VoiceStateConnection::Joined(channel_id)
            },
            _ => VoiceStateConnection::NoAction,
        }
    }

    pub fn is_bot_action(&self, bot_id: UserId) -> bool {
        self.user_id == bot_id
    }
}
