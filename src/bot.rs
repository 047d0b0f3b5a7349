use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::parser;
use crate::slack::SlackGateway;

/// Delay between RTM reads.
const RTM_READ_DELAY: Duration = Duration::from_secs(1);

/// Polling loop: drain the gateway, parse the batch for a command, dispatch
/// it, sleep, repeat. Per-command failures are logged and the loop keeps
/// going; only a failed reconnect is fatal.
pub async fn run(mut gateway: SlackGateway, bot_id: &str, dispatcher: &Dispatcher) -> Result<()> {
    info!("Polling for commands as {}", bot_id);
    loop {
        match gateway.read_events() {
            Ok(events) => {
                if let Some(command) = parser::parse_bot_commands(&events, bot_id) {
                    info!("Command '{}' in channel {}", command.text, command.channel);
                    if let Err(e) = dispatcher
                        .dispatch(&command.text, &command.channel, &gateway)
                        .await
                    {
                        error!("Failed to handle command: {:#}", e);
                    }
                }
            }
            Err(e) => {
                warn!("Gateway connection lost: {:#}", e);
                gateway
                    .reconnect()
                    .await
                    .context("Failed to re-establish the gateway connection")?;
                info!("Gateway reconnected");
            }
        }
        tokio::time::sleep(RTM_READ_DELAY).await;
    }
}
