//! Google Drive v3 REST client implementing [`ContentMirror`].

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use hound_core::{
    is_retryable_http_status, parse_retry_after_seconds, retry_delay, truncate_chars,
};

use crate::content_mirror::{BlobKind, ContentMirror, MirroredBlob};
use crate::drive_auth::AccessTokenSource;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const MULTIPART_BOUNDARY: &str = "hound-drive-upload-boundary";

#[derive(Debug, Clone)]
pub struct DriveApiClientConfig {
    pub api_base: String,
    pub upload_base: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for DriveApiClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone)]
pub struct DriveApiClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    token_source: Arc<dyn AccessTokenSource>,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl DriveApiClient {
    pub fn new(config: DriveApiClientConfig, token_source: Arc<dyn AccessTokenSource>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("hound-drive-mirror"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create drive api client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            token_source,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn request_json<T, F>(&self, operation: &str, scope: RetryScope, builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut(&str) -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, scope, builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode drive {operation}"))
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        scope: RetryScope,
        mut builder: F,
    ) -> Result<reqwest::Response>
    where
        F: FnMut(&str) -> reqwest::RequestBuilder,
    {
        let token = self
            .token_source
            .access_token()
            .await
            .context("failed to obtain drive access token")?;
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            match builder(&token).send().await {
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
                    if attempt < self.retry_max_attempts && scope.allows_status(status.as_u16()) {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    bail!(
                        "drive api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_chars(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && scope.allows_transport(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("drive api {operation} request failed"));
                }
            }
        }
    }
}

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryScope {
    /// Reads and in-place updates: resending cannot add blobs.
    Idempotent,
    /// `files.create`: a lost response may hide a committed create, so only
    /// failures the server never acted on are retried.
    NotApplied,
}

impl RetryScope {
    fn allows_status(self, status: u16) -> bool {
        match self {
            Self::Idempotent => is_retryable_http_status(status),
            Self::NotApplied => status == 429,
        }
    }

    fn allows_transport(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => is_retryable_transport_error(error),
            Self::NotApplied => error.is_connect(),
        }
    }
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Escapes a literal for use inside a single-quoted Drive query string.
fn escape_query_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

fn build_name_query(name: &str, parent_id: Option<&str>, kind: BlobKind) -> String {
    let mut clauses = vec![format!("name = '{}'", escape_query_literal(name))];
    if let Some(parent_id) = parent_id {
        clauses.push(format!("'{}' in parents", escape_query_literal(parent_id)));
    }
    clauses.push(match kind {
        BlobKind::Folder => format!("mimeType = '{FOLDER_MIME_TYPE}'"),
        BlobKind::File => format!("mimeType != '{FOLDER_MIME_TYPE}'"),
    });
    clauses.push("trashed = false".to_string());
    clauses.join(" and ")
}

fn build_multipart_related_body(metadata: &serde_json::Value, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len().saturating_add(512));
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

#[async_trait]
impl ContentMirror for DriveApiClient {
    async fn list_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
        kind: BlobKind,
    ) -> Result<Option<MirroredBlob>> {
        let query = build_name_query(name, parent_id, kind);
        let listing: DriveFileList = self
            .request_json("files.list", RetryScope::Idempotent, |token| {
                self.http
                    .get(format!("{}/files", self.api_base))
                    .bearer_auth(token)
                    .query(&[
                        ("q", query.as_str()),
                        ("pageSize", "1"),
                        ("fields", "nextPageToken, files(id,name)"),
                    ])
            })
            .await?;
        Ok(listing.files.into_iter().next().map(|file| MirroredBlob {
            name: file.name.unwrap_or_else(|| name.to_string()),
            id: file.id,
        }))
    }

    async fn create_blob(&self, name: &str, parent_id: &str, bytes: Vec<u8>) -> Result<String> {
        let body = build_multipart_related_body(
            &json!({ "name": name, "parents": [parent_id] }),
            &bytes,
        );
        let created: DriveFile = self
            .request_json("files.create", RetryScope::NotApplied, |token| {
                self.http
                    .post(format!("{}/files", self.upload_base))
                    .bearer_auth(token)
                    .query(&[("uploadType", "multipart"), ("fields", "id,name")])
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                    )
                    .body(body.clone())
            })
            .await?;
        info!(blob = name, blob_id = created.id, "drive file created");
        Ok(created.id)
    }

    async fn update_blob(&self, blob_id: &str, bytes: Vec<u8>) -> Result<()> {
        let updated: DriveFile = self
            .request_json("files.update", RetryScope::Idempotent, |token| {
                self.http
                    .patch(format!("{}/files/{}", self.upload_base, blob_id))
                    .bearer_auth(token)
                    .query(&[("uploadType", "media"), ("fields", "id,name")])
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone())
            })
            .await?;
        if updated.id != blob_id {
            return Err(anyhow!(
                "drive files.update returned unexpected id {} for {}",
                updated.id,
                blob_id
            ));
        }
        info!(blob_id, "drive file updated");
        Ok(())
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut metadata = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent_id) = parent_id {
            metadata["parents"] = json!([parent_id]);
        }
        let created: DriveFile = self
            .request_json("files.create folder", RetryScope::NotApplied, |token| {
                self.http
                    .post(format!("{}/files", self.api_base))
                    .bearer_auth(token)
                    .query(&[("fields", "id,name")])
                    .json(&metadata)
            })
            .await?;
        info!(folder = name, folder_id = created.id, "drive folder created");
        Ok(created.id)
    }
}
