use std::{process::ExitCode, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use serenity::{all::GatewayIntents, client::Client};
use songbird::{SerenityInit, Songbird};
use tokio::signal::unix::{self, SignalKind};

use crate::{
    catalog::AudioCatalog,
    command::router::CommandRouter,
    config::Config,
    event_handler::Handler,
    voice::{VoiceSessionController, songbird_transport::SongbirdTransport},
};

mod catalog;
mod command;
mod config;
mod error;
mod event_handler;
mod response;
mod voice;

#[tokio::main]
async fn main() -> ExitCode {
    logging::initialize_logging();

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("jokebot stopped\nError: {err:?}");
            ExitCode::FAILURE
        },
    }
}

#[tracing::instrument(skip_all)]
async fn start() -> Result<()> {
    let config = Config::parse();
    tracing::debug!("starting with {config:?}");

    let catalog = AudioCatalog::load(&config.audio_directory, &config.audio_extensions)
        .context("failed to load audio catalog")?;
    if catalog.list().is_empty() {
        tracing::warn!("{} has no playable clips", config.audio_directory.display());
    }

    enable_graceful_shutdown()?;

    // The controller enforces the connect timeout itself.
    let songbird = Songbird::serenity_from_config(songbird::Config::default().gateway_timeout(None));
    let voice = VoiceSessionController::new(SongbirdTransport::new(songbird.clone()), config.connect_timeout());
    let activity = config.activity();
    let router = CommandRouter::new(config.command_prefix, Arc::new(catalog), voice);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler {
            router,
            activity,
        })
        .register_songbird_with(songbird)
        .await
        .context("failed to build client")?;

    tracing::debug!("jokebot client starts");
    client.start().await.context("failed to start client")?;

    Ok(())
}

fn enable_graceful_shutdown() -> Result<()> {
    let mut sigint = unix::signal(SignalKind::interrupt()).context("failed to listen for SIGINT")?;
    let mut sigterm = unix::signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                std::process::exit(130);
            },
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                std::process::exit(143);
            },
        }
    });

    Ok(())
}
