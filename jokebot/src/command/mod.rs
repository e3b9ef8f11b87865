use std::str::FromStr;

use hashbrown::HashMap;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

pub(crate) mod router;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum CommandName {
    Ping,
    Joke,
    Leave,
    Say,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Prefixed,
    /// Also fires when the whole message is the bare command name.
    PrefixedOrBare,
}

#[derive(Debug, Clone)]
pub(crate) struct Command {
    pub(crate) name: CommandName,
    pub(crate) arguments: Option<&'static str>,
    pub(crate) description: &'static str,
    pub(crate) guild_only: bool,
    pub(crate) trigger: Trigger,
}

impl Command {
    /// How the command is typed, e.g. `!say <text>`.
    pub(crate) fn usage(&self, prefix: &str) -> String {
        let name = match self.trigger {
            Trigger::Prefixed => format!("{prefix}{}", self.name.as_ref()),
            Trigger::PrefixedOrBare => self.name.as_ref().to_string(),
        };

        match self.arguments {
            Some(arguments) => format!("{name} {arguments}"),
            None => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedInvocation {
    pub(crate) command: CommandName,
    pub(crate) args: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct CommandTable {
    commands: HashMap<CommandName, Command>,
}

impl CommandTable {
    pub(crate) fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        Self {
            commands: commands.into_iter().map(|command| (command.name, command)).collect(),
        }
    }

    pub(crate) fn standard() -> Self {
        Self::new([
            Command {
                name: CommandName::Ping,
                arguments: None,
                description: "Replies pong",
                guild_only: true,
                trigger: Trigger::PrefixedOrBare,
            },
            Command {
                name: CommandName::Joke,
                arguments: None,
                description: "Plays a random joke in your voice channel",
                guild_only: true,
                trigger: Trigger::Prefixed,
            },
            Command {
                name: CommandName::Leave,
                arguments: None,
                description: "Makes the bot leave the voice channel",
                guild_only: true,
                trigger: Trigger::Prefixed,
            },
            Command {
                name: CommandName::Say,
                arguments: Some("<text>"),
                description: "Posts the text in the channel in place of your message",
                guild_only: true,
                trigger: Trigger::Prefixed,
            },
            Command {
                name: CommandName::Help,
                arguments: None,
                description: "Shows this message",
                guild_only: true,
                trigger: Trigger::Prefixed,
            },
        ])
    }

    pub(crate) fn get(&self, name: CommandName) -> Option<&Command> {
        self.commands.get(&name)
    }

    fn lookup(&self, name: &str) -> Option<&Command> {
        CommandName::from_str(name).ok().and_then(|name| self.get(name))
    }

    /// Registered commands in declaration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Command> {
        CommandName::iter().filter_map(|name| self.get(name))
    }

    /// Splits `content` into a known command and its arguments.
    ///
    /// The command name has to follow the prefix directly; anything unknown yields `None`.
    pub(crate) fn parse(&self, prefix: &str, content: &str) -> Option<ParsedInvocation> {
        let content = content.trim();

        let Some(rest) = content.strip_prefix(prefix) else {
            let command = self.lookup(content)?;
            return (command.trigger == Trigger::PrefixedOrBare).then(|| ParsedInvocation {
                command: command.name,
                args: Vec::new(),
            });
        };

        if rest.starts_with(char::is_whitespace) {
            return None;
        }

        let mut words = rest.split_whitespace();
        let command = self.lookup(words.next()?)?;

        Some(ParsedInvocation {
            command: command.name,
            args: words.map(str::to_string).collect(),
        })
    }
}
