use std::{io, path::PathBuf, time::Duration};

use serenity::all::GuildId;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("audio directory {} cannot be read: {source}", path.display())]
    CatalogUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("audio catalog is empty")]
    EmptyCatalog,
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("invoker is not in a voice channel")]
    NoChannel,

    #[error("a voice session is already active in guild {0}")]
    AlreadyActive(GuildId),

    #[error("connecting to voice in guild {0} timed out after {1:?}")]
    ConnectionTimeout(GuildId, Duration),

    #[error("connecting to voice in guild {0} was interrupted")]
    Interrupted(GuildId),

    #[error("no voice session is active in guild {0}")]
    Inactive(GuildId),

    #[error("voice transport failed: {0}")]
    TransportError(#[source] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to delete invocation message: {0}")]
pub struct DeleteFailed(#[source] pub anyhow::Error);

/// Everything a command handler can fail with before it becomes a reply.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}
