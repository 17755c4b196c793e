//! Slack Socket Mode loop that decodes envelopes into typed events and
//! dispatches them one at a time to the recording handlers.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use hound_archive::{
    ChannelDirectory, ChatAttachment, ChatMessageEvent, InboundEvent, LogStore, RecordingPolicy,
    SlashCommandRequest,
};
use hound_drive::MirrorGateway;

mod recording_handlers;
mod slack_api_client;
mod slack_command_helpers;

pub use recording_handlers::{
    AttachmentFailure, AttachmentFailures, AttachmentStage, DispatchOutcome, RecordingBridge,
};
pub use slack_api_client::SlackApiClient;

/// Runtime configuration for the Slack recording bridge.
#[derive(Clone)]
pub struct SlackBridgeRuntimeConfig {
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub bot_user_id: Option<String>,
    pub author_id: String,
    pub base_dir: PathBuf,
    pub mirror: MirrorGateway,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SlackSocketEnvelope {
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvelopeAction {
    Dispatch(InboundEvent),
    Hello,
    Disconnect { reason: String },
    Ignore,
}

/// Runs the Slack recording bridge until Ctrl-C.
pub async fn run_slack_bridge(config: SlackBridgeRuntimeConfig) -> Result<()> {
    let mut runtime = SlackBridgeRuntime::new(config).await?;
    runtime.run().await
}

struct SlackBridgeRuntime {
    config: SlackBridgeRuntimeConfig,
    slack_client: SlackApiClient,
    bridge: RecordingBridge,
}

impl SlackBridgeRuntime {
    async fn new(config: SlackBridgeRuntimeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_dir)
            .with_context(|| format!("failed to create {}", config.base_dir.display()))?;

        let slack_client = SlackApiClient::new(
            config.api_base.clone(),
            config.app_token.clone(),
            config.bot_token.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;

        let bot_user_id = match config.bot_user_id.clone() {
            Some(user_id) if !user_id.trim().is_empty() => user_id.trim().to_string(),
            _ => slack_client.resolve_bot_user_id().await?,
        };
        info!(bot_user_id, "slack bot identity resolved");

        let directory = ChannelDirectory::load(&config.base_dir)?;
        info!(channels = directory.len(), "channel directory loaded");
        let bridge = RecordingBridge::new(
            Arc::new(slack_client.clone()),
            config.mirror.clone(),
            directory,
            LogStore::new(config.base_dir.clone()),
            RecordingPolicy::new(bot_user_id, config.author_id.clone()),
        );

        Ok(Self {
            config,
            slack_client,
            bridge,
        })
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            let socket_url = match self.slack_client.open_socket_connection().await {
                Ok(url) => url,
                Err(error) => {
                    warn!(error = %format!("{error:#}"), "failed to open slack socket connection");
                    if self.wait_before_reconnect().await {
                        return Ok(());
                    }
                    continue;
                }
            };

            info!("slack socket connected");
            match self.run_socket_session(&socket_url).await {
                Ok(SessionEnd::Shutdown) => {
                    info!("slack bridge shutdown requested");
                    return Ok(());
                }
                Ok(SessionEnd::Reconnect) => {}
                Err(error) => {
                    warn!(error = %format!("{error:#}"), "slack socket session error");
                }
            }

            if self.wait_before_reconnect().await {
                return Ok(());
            }
        }
    }

    /// Returns true when shutdown was requested during the wait.
    async fn wait_before_reconnect(&self) -> bool {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("slack bridge shutdown requested");
                true
            }
            _ = tokio::time::sleep(self.config.reconnect_delay) => false,
        }
    }

    async fn run_socket_session(&mut self, socket_url: &str) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .with_context(|| "failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            let message = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Shutdown);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Reconnect);
                    };
                    message_result.context("failed reading slack websocket message")?
                }
            };

            let envelope = match parse_socket_envelope(message) {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(error) => {
                    warn!(error = %format!("{error:#}"), "skipping undecodable socket frame");
                    continue;
                }
            };
            if !envelope.envelope_id.is_empty() {
                ack_envelope(&mut sink, &envelope.envelope_id).await?;
            }

            match classify_envelope(&envelope) {
                EnvelopeAction::Dispatch(event) => {
                    debug!(
                        envelope_id = envelope.envelope_id,
                        event = event.kind(),
                        "dispatching event"
                    );
                    let outcome = self.bridge.dispatch(event).await;
                    debug!(envelope_id = envelope.envelope_id, ?outcome, "event handled");
                }
                EnvelopeAction::Hello => info!("slack socket hello received"),
                EnvelopeAction::Disconnect { reason } => {
                    info!(reason, "slack requested socket disconnect");
                    return Ok(SessionEnd::Reconnect);
                }
                EnvelopeAction::Ignore => {
                    debug!(
                        envelope_type = envelope.envelope_type,
                        "ignoring socket envelope"
                    );
                }
            }
        }
    }
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send slack socket ack")
}

fn parse_socket_envelope(message: WsMessage) -> Result<Option<SlackSocketEnvelope>> {
    match message {
        WsMessage::Text(text) => {
            let envelope = serde_json::from_str::<SlackSocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Binary(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?;
            let envelope = serde_json::from_str::<SlackSocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct SlackEventCallbackEnvelope {
    #[serde(rename = "type")]
    callback_type: String,
    event: SlackEventPayload,
}

#[derive(Debug, Deserialize)]
struct SlackFileAttachment {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    filetype: Option<String>,
    #[serde(default)]
    url_private_download: Option<String>,
    #[serde(default)]
    url_private: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackEventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    event_ts: Option<String>,
    #[serde(default)]
    files: Vec<SlackFileAttachment>,
}

#[derive(Debug, Deserialize)]
struct SlackSlashCommandPayload {
    #[serde(default)]
    command: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    user_id: String,
}

fn classify_envelope(envelope: &SlackSocketEnvelope) -> EnvelopeAction {
    match envelope.envelope_type.as_str() {
        "hello" => EnvelopeAction::Hello,
        "disconnect" => EnvelopeAction::Disconnect {
            reason: envelope
                .reason
                .clone()
                .unwrap_or_else(|| "unspecified".to_string()),
        },
        _ => match normalize_socket_envelope(envelope) {
            Ok(Some(event)) => EnvelopeAction::Dispatch(event),
            Ok(None) => EnvelopeAction::Ignore,
            Err(error) => {
                warn!(
                    envelope_id = envelope.envelope_id,
                    error = %format!("{error:#}"),
                    "failed to decode slack envelope payload"
                );
                EnvelopeAction::Ignore
            }
        },
    }
}

fn normalize_socket_envelope(envelope: &SlackSocketEnvelope) -> Result<Option<InboundEvent>> {
    match envelope.envelope_type.as_str() {
        "events_api" => {
            let callback =
                serde_json::from_value::<SlackEventCallbackEnvelope>(envelope.payload.clone())
                    .context("failed to decode slack event callback payload")?;
            if callback.callback_type != "event_callback" {
                return Ok(None);
            }
            Ok(normalize_event_payload(callback.event))
        }
        "slash_commands" => {
            let payload =
                serde_json::from_value::<SlackSlashCommandPayload>(envelope.payload.clone())
                    .context("failed to decode slack slash command payload")?;
            Ok(Some(InboundEvent::SlashCommand(SlashCommandRequest {
                command: payload.command,
                text: payload.text,
                channel_id: payload.channel_id,
                user_id: payload.user_id,
            })))
        }
        _ => Ok(None),
    }
}

fn normalize_event_payload(event: SlackEventPayload) -> Option<InboundEvent> {
    let channel_id = event.channel.unwrap_or_default();
    match event.event_type.as_str() {
        "message" => {
            let attachments = event
                .files
                .into_iter()
                .map(|file| ChatAttachment {
                    id: file.id,
                    name: file.name.unwrap_or_default(),
                    filetype: file.filetype.unwrap_or_default(),
                    download_url: file.url_private_download.or(file.url_private),
                })
                .collect();
            Some(InboundEvent::Message(ChatMessageEvent {
                channel_id,
                author_id: event.user.unwrap_or_default(),
                text: event.text.unwrap_or_default(),
                sub_type: event.subtype,
                event_timestamp: event.ts.or(event.event_ts).unwrap_or_default(),
                attachments,
            }))
        }
        "member_joined_channel" => Some(InboundEvent::MemberJoined {
            channel_id,
            user_id: event.user.unwrap_or_default(),
        }),
        "channel_archive" => Some(InboundEvent::ChannelArchived { channel_id }),
        _ => None,
    }
}
