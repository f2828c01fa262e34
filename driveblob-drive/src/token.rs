//! OAuth2 token holder with refresh-token renewal.

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DriveConfig;

/// Tokens this close to expiry are renewed before use.
const EXPIRY_DELTA_SECS: i64 = 10;
/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry - Duration::seconds(EXPIRY_DELTA_SECS) <= now
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// OAuth client credentials and endpoint used for the refresh grant.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Hands out a valid `Authorization` header value, renewing the access token
/// through the refresh grant when it is about to expire.
pub struct TokenSource {
    http: Client,
    oauth: Option<OAuthClient>,
    token: Mutex<Token>,
}

impl TokenSource {
    pub fn new(http: Client, token: Token, oauth: Option<OAuthClient>) -> Self {
        Self {
            http,
            oauth,
            token: Mutex::new(token),
        }
    }

    pub fn from_config(http: Client, config: &DriveConfig) -> Self {
        let token = Token {
            access_token: config.access_token.clone(),
            token_type: config.token_type.clone(),
            refresh_token: config.refresh_token.clone(),
            expiry: config.expiry,
        };
        let oauth = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Some(OAuthClient {
                client_id: id.clone(),
                client_secret: secret.clone(),
                token_url: config.token_url.clone(),
            }),
            _ => None,
        };
        Self::new(http, token, oauth)
    }

    pub async fn authorization(&self) -> anyhow::Result<String> {
        // Held across the refresh so concurrent callers wait for one renewal.
        let mut token = self.token.lock().await;
        if token.is_expired(Utc::now()) {
            let Some(oauth) = &self.oauth else {
                bail!(
                    "OAuth token expired at {} and no client credentials are configured to refresh it",
                    token.expiry.to_rfc3339()
                );
            };
            let refreshed = self.refresh(oauth, &token).await?;
            *token = refreshed;
            info!(expiry = %token.expiry.to_rfc3339(), "OAuth token refreshed");
        }
        Ok(token.authorization())
    }

    async fn refresh(&self, oauth: &OAuthClient, current: &Token) -> anyhow::Result<Token> {
        debug!(token_url = %oauth.token_url, "Refreshing OAuth token");
        let resp = self
            .http
            .post(&oauth.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .context("OAuth token refresh request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OAuth token refresh failed: HTTP {} - {}", status, body);
        }

        let body: RefreshResponse = resp
            .json()
            .await
            .context("Failed to parse OAuth token response")?;

        let lifetime = body.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        Ok(Token {
            access_token: body.access_token,
            token_type: body.token_type.unwrap_or_else(|| current.token_type.clone()),
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            expiry: Utc::now() + Duration::seconds(lifetime),
        })
    }
}
