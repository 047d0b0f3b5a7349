mod bot;
mod config;
mod dispatch;
mod parser;
mod slack;
mod weather;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatch::{Dispatcher, WeatherCommand};
use crate::slack::SlackGateway;
use crate::weather::WeatherClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,weatherbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Startup failures are fatal: connect to the RTM gateway, then resolve
    // the bot's own user ID so the parser can recognize direct mentions.
    let gateway = SlackGateway::connect(&config.slack_token)
        .await
        .context("Connection to the Slack RTM gateway failed")?;
    info!("Weather bot connected and running");

    let bot_id = gateway
        .resolve_identity()
        .await
        .context("Failed to resolve the bot's own user ID")?;
    info!("Resolved bot identity: {}", bot_id);

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(
        "오늘의날씨",
        Box::new(WeatherCommand::new(Arc::new(WeatherClient::new()))),
    );

    bot::run(gateway, &bot_id, &dispatcher).await
}
