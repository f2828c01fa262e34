use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Maximum number of entries in the ref → file ID cache. It only maps names
/// to IDs, so this is affordable on any host.
pub const LRU_SIZE: usize = 500;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Option keys recognized in a flat storage option map.
const OPT_ACCESS_TOKEN: &str = "accessToken";
const OPT_TOKEN_TYPE: &str = "tokenType";
const OPT_REFRESH_TOKEN: &str = "refreshToken";
const OPT_EXPIRY: &str = "expiry";
const OPT_CLIENT_ID: &str = "clientId";
const OPT_CLIENT_SECRET: &str = "clientSecret";
const OPT_CACHE_SIZE: &str = "cacheSize";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "missing required options: {}; need accessToken, tokenType, refreshToken, expiry",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),
    #[error("couldn't parse expiry {value:?}: {source}")]
    Expiry {
        value: String,
        source: chrono::ParseError,
    },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("client_id and client_secret must be set together")]
    PartialClient,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Everything needed to build an authenticated Drive storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_cache_size() -> usize {
    LRU_SIZE
}

fn default_api_base() -> String {
    DRIVE_API_BASE.to_string()
}

fn default_upload_base() -> String {
    DRIVE_UPLOAD_BASE.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn option<'a>(opts: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    opts.get(key).map(String::as_str)
}

impl DriveConfig {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            refresh_token: refresh_token.into(),
            expiry,
            client_id: None,
            client_secret: None,
            cache_size: LRU_SIZE,
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            token_url: default_token_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: DriveConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build from a flat option map. Every missing required key is reported
    /// in a single error.
    pub fn from_options(opts: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let missing: Vec<&'static str> = [OPT_ACCESS_TOKEN, OPT_TOKEN_TYPE, OPT_REFRESH_TOKEN, OPT_EXPIRY]
            .into_iter()
            .filter(|key| !opts.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let expiry = option(opts, OPT_EXPIRY).unwrap_or_default();
        let expiry = DateTime::parse_from_rfc3339(expiry)
            .map_err(|source| ConfigError::Expiry {
                value: expiry.to_string(),
                source,
            })?
            .with_timezone(&Utc);

        let mut config = Self::new(
            option(opts, OPT_ACCESS_TOKEN).unwrap_or_default(),
            option(opts, OPT_TOKEN_TYPE).unwrap_or_default(),
            option(opts, OPT_REFRESH_TOKEN).unwrap_or_default(),
            expiry,
        );
        config.client_id = option(opts, OPT_CLIENT_ID).map(str::to_string);
        config.client_secret = option(opts, OPT_CLIENT_SECRET).map(str::to_string);
        if let Some(size) = option(opts, OPT_CACHE_SIZE) {
            config.cache_size = size.parse().map_err(|_| ConfigError::Invalid {
                key: OPT_CACHE_SIZE,
                value: size.to_string(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.is_empty() {
            return Err(ConfigError::Empty("access_token"));
        }
        if self.token_type.is_empty() {
            return Err(ConfigError::Empty("token_type"));
        }
        if self.refresh_token.is_empty() {
            return Err(ConfigError::Empty("refresh_token"));
        }
        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(ConfigError::PartialClient);
        }
        Ok(())
    }
}
