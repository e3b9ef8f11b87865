use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::voice::DEFAULT_CONNECT_TIMEOUT;

#[derive(Parser)]
#[command(about = "Plays a random joke clip in the caller's voice channel")]
pub(crate) struct Config {
    #[arg(long, env, hide_env_values = true)]
    pub(crate) discord_token: String,

    #[arg(long, env, default_value = "!", value_parser = parse_prefix)]
    pub(crate) command_prefix: String,

    #[arg(long, env, default_value = "./Audio")]
    pub(crate) audio_directory: PathBuf,

    #[arg(
        long,
        env,
        value_delimiter = ',',
        default_value = "mp3,flac,wav,ogg",
        value_parser = parse_extension,
        help = "file extensions treated as playable clips"
    )]
    pub(crate) audio_extensions: Vec<String>,

    #[arg(
        long = "voice-connect-timeout",
        env = "VOICE_CONNECT_TIMEOUT",
        default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "secs until a voice connection attempt is abandoned"
    )]
    pub(crate) connect_timeout_secs: u64,

    #[arg(long = "activity", env = "BOT_ACTIVITY", help = "presence text, defaults to the help command")]
    pub(crate) activity: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("command_prefix", &self.command_prefix)
            .field("audio_directory", &self.audio_directory)
            .field("audio_extensions", &self.audio_extensions)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("activity", &self.activity)
            .finish()
    }
}

impl Config {
    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub(crate) fn activity(&self) -> String {
        self.activity
            .clone()
            .unwrap_or_else(|| format!("{}help", self.command_prefix))
    }
}

fn parse_prefix(prefix: &str) -> Result<String, String> {
    if prefix.is_empty() || prefix.contains(char::is_whitespace) {
        return Err(format!("prefix must be non-empty and must not contain whitespace: {prefix:?}"));
    }

    Ok(prefix.to_string())
}

fn parse_extension(extension: &str) -> Result<String, String> {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if extension.is_empty() {
        return Err("extension must not be empty".to_string());
    }

    Ok(extension)
}
