//! Access tokens for the Drive API.
//!
//! Service-account credentials are exchanged for short-lived bearer tokens via
//! the OAuth2 JWT-bearer grant; tokens are cached until shortly before expiry.

use std::{path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use hound_core::{refresh_deadline, truncate_chars, unix_now};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: u64 = 3_600;
const TOKEN_REFRESH_MARGIN_SECONDS: u64 = 60;

#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed bearer token, for emulators and tests.
#[derive(Debug, Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticAccessToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("credential_type", &self.credential_type)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credential file {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("invalid credential file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let credentials = serde_json::from_str::<Self>(raw)
            .context("failed to decode service account credentials")?;
        if let Some(kind) = credentials.credential_type.as_deref() {
            if kind != "service_account" {
                bail!("unsupported credential type '{kind}', expected 'service_account'");
            }
        }
        if credentials.client_email.trim().is_empty() {
            bail!("client_email must be set");
        }
        if !credentials.private_key.contains("PRIVATE KEY") {
            bail!("private_key must be a PEM encoded private key");
        }
        Ok(credentials)
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_after_unix: u64,
}

pub struct ServiceAccountTokenSource {
    http: reqwest::Client,
    credentials: ServiceAccountCredentials,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: ServiceAccountCredentials, request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create oauth token client")?;
        Ok(Self {
            http,
            credentials,
            scope: DRIVE_SCOPE.to_string(),
            cached: Mutex::new(None),
        })
    }

    fn signed_assertion(&self, now_unix: u64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: &self.scope,
            aud: self.credentials.token_uri(),
            iat: now_unix,
            exp: now_unix.saturating_add(ASSERTION_LIFETIME_SECONDS),
        };
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .context("failed to parse service account private key")?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("failed to sign service account assertion")
    }

    async fn exchange(&self, now_unix: u64) -> Result<CachedToken> {
        let assertion = self.signed_assertion(now_unix)?;
        let response = self
            .http
            .post(self.credentials.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("oauth token request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read oauth token response")?;
        if !status.is_success() {
            bail!(
                "oauth token exchange failed with status {}: {}",
                status.as_u16(),
                truncate_chars(&body, 400)
            );
        }
        let parsed = serde_json::from_str::<TokenResponse>(&body)
            .context("failed to decode oauth token response")?;
        let token = parsed
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "oauth token response missing access_token: {}",
                    parsed.error.unwrap_or_else(|| "unknown error".to_string())
                )
            })?;
        let lifetime = parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECONDS);
        debug!(lifetime_seconds = lifetime, "drive access token refreshed");
        Ok(CachedToken {
            token,
            refresh_after_unix: refresh_deadline(now_unix, lifetime, TOKEN_REFRESH_MARGIN_SECONDS),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now_unix = unix_now();
        if let Some(existing) = cached.as_ref() {
            if now_unix < existing.refresh_after_unix {
                return Ok(existing.token.clone());
            }
        }
        let fresh = self.exchange(now_unix).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{AccessTokenSource, ServiceAccountCredentials, ServiceAccountTokenSource};

    const TEST_PRIVATE_KEY: &str = include_str!("../testdata/service-account-test-key.pem");

    fn credentials_json(token_uri: &str) -> String {
        json!({
            "type": "service_account",
            "client_email": "recorder@example.iam.gserviceaccount.com",
            "private_key": TEST_PRIVATE_KEY,
            "token_uri": token_uri,
        })
        .to_string()
    }

    #[test]
    fn unit_parse_rejects_non_service_account_credentials() {
        let raw = json!({
            "type": "authorized_user",
            "client_email": "x@example.com",
            "private_key": TEST_PRIVATE_KEY,
        })
        .to_string();
        let error = ServiceAccountCredentials::parse(&raw).expect_err("wrong type");
        assert!(error.to_string().contains("unsupported credential type"));
    }

    #[test]
    fn unit_parse_defaults_token_uri_and_redacts_debug_output() {
        let raw = json!({
            "client_email": "x@example.com",
            "private_key": TEST_PRIVATE_KEY,
        })
        .to_string();
        let credentials = ServiceAccountCredentials::parse(&raw).expect("parse");
        assert_eq!(credentials.token_uri(), "https://oauth2.googleapis.com/token");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn regression_parse_rejects_missing_private_key_material() {
        let raw = json!({
            "client_email": "x@example.com",
            "private_key": "not a key",
        })
        .to_string();
        assert!(ServiceAccountCredentials::parse(&raw).is_err());
    }

    #[tokio::test]
    async fn integration_service_account_token_is_exchanged_once_and_cached() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_includes("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
                .body_includes("assertion=");
            then.status(200).json_body(json!({
                "access_token": "ya29.test",
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        });

        let credentials =
            ServiceAccountCredentials::parse(&credentials_json(&server.url("/token")))
                .expect("credentials");
        let source = ServiceAccountTokenSource::new(credentials, 2_000).expect("source");
        assert_eq!(source.access_token().await.expect("first"), "ya29.test");
        assert_eq!(source.access_token().await.expect("second"), "ya29.test");
        assert_eq!(token.calls(), 1);
    }

    #[tokio::test]
    async fn regression_service_account_token_exchange_failure_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400)
                .json_body(json!({"error": "invalid_grant"}));
        });
        let credentials =
            ServiceAccountCredentials::parse(&credentials_json(&server.url("/token")))
                .expect("credentials");
        let source = ServiceAccountTokenSource::new(credentials, 2_000).expect("source");
        let error = source.access_token().await.expect_err("exchange fails");
        assert!(error.to_string().contains("status 400"));
        assert!(error.to_string().contains("invalid_grant"));
    }
}
