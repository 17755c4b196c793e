//! Slack Web API calls used by the recording bridge.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use hound_core::{
    is_retryable_http_status, parse_retry_after_seconds, retry_delay, truncate_chars,
};

use crate::chat_transport::{ChatTransport, ConversationInfo};

const RETRY_ATTEMPT_HEADER: &str = "x-hound-retry-attempt";

#[derive(Debug, Clone, Deserialize)]
struct SlackAuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackOpenSocketResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationResponse {
    ok: bool,
    channel: Option<SlackConversationPayload>,
    error: Option<String>,
}

fn slack_error(operation: &str, error: Option<String>) -> anyhow::Error {
    anyhow!(
        "slack {operation} failed: {}",
        error.unwrap_or_else(|| "unknown error".to_string())
    )
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(
        api_base: String,
        app_token: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("hound-slack-bridge"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            app_token: app_token.trim().to_string(),
            bot_token: bot_token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub async fn resolve_bot_user_id(&self) -> Result<String> {
        let response: SlackAuthTestResponse = self
            .request_json("auth.test", || {
                self.http
                    .post(format!("{}/auth.test", self.api_base))
                    .bearer_auth(&self.bot_token)
            })
            .await?;
        if !response.ok {
            return Err(slack_error("auth.test", response.error));
        }
        response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack auth.test did not return user_id"))
    }

    pub async fn open_socket_connection(&self) -> Result<String> {
        let response: SlackOpenSocketResponse = self
            .request_json("apps.connections.open", || {
                self.http
                    .post(format!("{}/apps.connections.open", self.api_base))
                    .bearer_auth(&self.app_token)
            })
            .await?;
        if !response.ok {
            return Err(slack_error("apps.connections.open", response.error));
        }
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack apps.connections.open did not return url"))
    }

    async fn request_json<T, F>(&self, operation: &str, builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode slack {operation}"))
    }

    async fn request_bytes<F>(&self, operation: &str, builder: F) -> Result<Vec<u8>>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read slack {operation} body"))?;
        Ok(bytes.to_vec())
    }

    async fn send_with_retry<F>(&self, operation: &str, mut builder: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retry_after = parse_retry_after_seconds(
                        response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|value| value.to_str().ok()),
                    );
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_http_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_chars(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

#[async_trait]
impl ChatTransport for SlackApiClient {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let payload = json!({
            "channel": channel_id,
            "text": text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        let response: SlackChatMessageResponse = self
            .request_json("chat.postMessage", || {
                self.http
                    .post(format!("{}/chat.postMessage", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        if !response.ok {
            return Err(slack_error("chat.postMessage", response.error));
        }
        Ok(())
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo> {
        let response: SlackConversationResponse = self
            .request_json("conversations.info", || {
                self.http
                    .get(format!("{}/conversations.info", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .query(&[("channel", channel_id)])
            })
            .await?;
        if !response.ok {
            return Err(slack_error("conversations.info", response.error));
        }
        let channel = response
            .channel
            .ok_or_else(|| anyhow!("slack conversations.info response missing channel"))?;
        let name = channel
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow!("slack conversations.info returned no name for {channel_id}"))?;
        Ok(ConversationInfo {
            id: channel.id,
            name,
        })
    }

    async fn create_conversation(&self, name: &str) -> Result<String> {
        let payload = json!({ "name": name, "is_private": false });
        let response: SlackConversationResponse = self
            .request_json("conversations.create", || {
                self.http
                    .post(format!("{}/conversations.create", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        if !response.ok {
            return Err(slack_error("conversations.create", response.error));
        }
        response
            .channel
            .map(|channel| channel.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow!("slack conversations.create response missing channel id"))
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        self.request_bytes("file download", || {
            self.http.get(url).bearer_auth(&self.bot_token)
        })
        .await
    }
}
