use crate::{
    catalog::AudioClip,
    command::CommandTable,
    error::{CatalogError, CommandError, VoiceError},
};

pub(crate) const ATTRIBUTION: &str = "All rights reserved to Jean";
pub(crate) const EMBED_COLOUR: u32 = 0x00bcff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    Text(String),
    Embed(Embed),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Embed {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) fields: Vec<EmbedField>,
    pub(crate) footer: Option<String>,
    pub(crate) colour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EmbedField {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) inline: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ResponseFormatter {
    prefix: String,
}

impl ResponseFormatter {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub(crate) fn pong(&self) -> Reply {
        Reply::Text("pong".to_string())
    }

    pub(crate) fn joke(&self, clip: &AudioClip) -> Reply {
        Reply::Embed(Embed {
            title: "Here's your joke!".to_string(),
            description: Some(clip.label().to_string()),
            fields: Vec::new(),
            footer: Some(ATTRIBUTION.to_string()),
            colour: EMBED_COLOUR,
        })
    }

    pub(crate) fn joke_failed(&self, error: &CommandError) -> Reply {
        let text = match error {
            CommandError::Voice(VoiceError::NoChannel) => "You need to join a voice channel first!".to_string(),
            CommandError::Voice(VoiceError::AlreadyActive(_)) => format!(
                "I'm already telling a joke here. Wait for the end or use `{}leave`.",
                self.prefix
            ),
            CommandError::Voice(VoiceError::ConnectionTimeout(..)) => {
                "I couldn't connect to your voice channel in time.".to_string()
            },
            CommandError::Voice(VoiceError::Interrupted(_) | VoiceError::Inactive(_)) => {
                "The joke was cancelled before it started.".to_string()
            },
            CommandError::Voice(VoiceError::TransportError(_)) => {
                "Something went wrong while playing the joke.".to_string()
            },
            CommandError::Catalog(CatalogError::EmptyCatalog) => "I don't know any jokes yet.".to_string(),
            CommandError::Catalog(CatalogError::CatalogUnavailable { .. }) => {
                "My joke collection is unavailable.".to_string()
            },
        };

        Reply::Text(text)
    }

    pub(crate) fn help(&self, commands: &CommandTable) -> Reply {
        let fields = commands
            .iter()
            .map(|command| EmbedField {
                name: command.usage(&self.prefix),
                value: command.description.to_string(),
                inline: false,
            })
            .collect();

        Reply::Embed(Embed {
            title: "Available commands:".to_string(),
            description: None,
            fields,
            footer: Some(ATTRIBUTION.to_string()),
            colour: EMBED_COLOUR,
        })
    }
}
