use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::debug;

const SLACK_API_BASE: &str = "https://slack.com/api";
const API_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One event read off the RTM websocket. Events without a `type` field or
/// with an unknown shape are dropped at deserialization time.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RtmConnectResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

/// Posting side of the gateway, split out so command handling can be
/// exercised against a recording stub in tests.
#[async_trait]
pub trait MessagePoster {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()>;
}

/// Slack gateway: Web API calls over HTTP plus the RTM event stream over
/// a websocket.
pub struct SlackGateway {
    http: reqwest::Client,
    token: String,
    ws: WsStream,
}

impl SlackGateway {
    /// Establish the RTM connection. Failure here is a startup failure and
    /// is fatal to the process.
    pub async fn connect(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .context("Failed to build the HTTP client")?;
        let ws = open_rtm(&http, token).await?;
        Ok(Self {
            http,
            token: token.to_string(),
            ws,
        })
    }

    /// Re-open the websocket after the server dropped it. The Web API
    /// client and token are reused.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.ws = open_rtm(&self.http, &self.token).await?;
        Ok(())
    }

    /// Resolve the bot's own user ID via `auth.test`.
    pub async fn resolve_identity(&self) -> Result<String> {
        let resp: AuthTestResponse = self
            .http
            .post(format!("{SLACK_API_BASE}/auth.test"))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("auth.test request failed")?
            .error_for_status()
            .context("auth.test returned an error status")?
            .json()
            .await
            .context("auth.test returned malformed JSON")?;
        if !resp.ok {
            anyhow::bail!(
                "auth.test rejected: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        resp.user_id
            .context("auth.test response is missing user_id")
    }

    /// Drain every event currently buffered on the websocket without
    /// blocking. Returns an error when the connection is gone, so the
    /// caller can reconnect.
    pub fn read_events(&mut self) -> Result<Vec<InboundEvent>> {
        let mut events = Vec::new();
        loop {
            match self.ws.next().now_or_never() {
                Some(Some(Ok(tungstenite::Message::Text(text)))) => {
                    match serde_json::from_str::<InboundEvent>(&text) {
                        Ok(event) => events.push(event),
                        Err(_) => debug!("ignoring non-event frame: {}", text),
                    }
                }
                Some(Some(Ok(tungstenite::Message::Close(_)))) | Some(None) => {
                    anyhow::bail!("websocket closed by the server")
                }
                // Ping/pong/binary frames carry no events
                Some(Some(Ok(_))) => {}
                Some(Some(Err(e))) => {
                    return Err(e).context("websocket read failed");
                }
                // Nothing buffered right now
                None => break,
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl MessagePoster for SlackGateway {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let resp: PostMessageResponse = self
            .http
            .post(format!("{SLACK_API_BASE}/chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel, "text": text }))
            .send()
            .await
            .context("chat.postMessage request failed")?
            .error_for_status()
            .context("chat.postMessage returned an error status")?
            .json()
            .await
            .context("chat.postMessage returned malformed JSON")?;
        if !resp.ok {
            anyhow::bail!(
                "chat.postMessage rejected: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(())
    }
}

async fn open_rtm(http: &reqwest::Client, token: &str) -> Result<WsStream> {
    let resp: RtmConnectResponse = http
        .post(format!("{SLACK_API_BASE}/rtm.connect"))
        .bearer_auth(token)
        .send()
        .await
        .context("rtm.connect request failed")?
        .error_for_status()
        .context("rtm.connect returned an error status")?
        .json()
        .await
        .context("rtm.connect returned malformed JSON")?;
    if !resp.ok {
        anyhow::bail!(
            "rtm.connect rejected: {}",
            resp.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    let url = resp
        .url
        .context("rtm.connect response is missing the websocket URL")?;
    let (ws, _) = connect_async(&url)
        .await
        .context("websocket handshake failed")?;
    Ok(ws)
}
