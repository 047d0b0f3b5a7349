use anyhow::{Context, Result};

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Slack bot OAuth token (xoxb-...), used for both the RTM handshake
    /// and Web API calls.
    pub slack_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let slack_token = std::env::var("SLACK_BOT_TOKEN")
            .context("SLACK_BOT_TOKEN environment variable is not set")?;
        Ok(Self { slack_token })
    }
}
