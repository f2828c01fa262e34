//! Google Drive v3 files API, scoped to the application data folder.
//!
//! Drive addresses files by server-assigned ID and lets any number of files
//! share a name, so everything above this layer works through
//! [`DriveFiles::find_by_name`] to translate names into IDs.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::DriveConfig;
use crate::token::TokenSource;

/// Private per-application space, invisible in the user's own Drive.
pub const APP_DATA_FOLDER: &str = "appDataFolder";
pub const CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The subset of the Drive files API the storage adapter needs. All calls
/// operate inside [`APP_DATA_FOLDER`].
#[async_trait]
pub trait DriveFiles: Send + Sync {
    /// IDs of files named exactly `name`, in listing order.
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Vec<String>>;

    /// Files whose name contains `fragment`.
    async fn list_containing(&self, fragment: &str) -> anyhow::Result<Vec<DriveFile>>;

    async fn download(&self, id: &str) -> anyhow::Result<Bytes>;

    /// Create a new file and return its ID. Never replaces an existing file.
    async fn create(&self, name: &str, contents: Bytes) -> anyhow::Result<String>;

    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

/// [`DriveFiles`] over the Drive v3 REST API.
pub struct HttpFiles {
    client: Client,
    token: TokenSource,
    api_base: String,
    upload_base: String,
}

impl HttpFiles {
    pub fn new(config: &DriveConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            token: TokenSource::from_config(client.clone(), config),
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(id))
    }

    /// Run a files.list query, following page tokens when `fields` asks
    /// for `nextPageToken`.
    async fn list(&self, q: &str, fields: &str) -> anyhow::Result<Vec<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.token.authorization().await?;
            let mut req = self
                .client
                .get(&url)
                .header("Authorization", auth)
                .query(&[("spaces", APP_DATA_FOLDER), ("q", q), ("fields", fields)]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await.context("Drive list request failed")?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("Drive list failed: HTTP {} - {}", status, body);
            }

            let page: FileListResponse = resp
                .json()
                .await
                .context("Failed to parse Drive list response")?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }
}

/// Quote `value` as a Drive query string literal.
fn query_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Build a `multipart/related` upload body: JSON metadata part, then media.
fn multipart_body(boundary: &str, metadata: &serde_json::Value, contents: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(contents.len() + 256);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata.to_string().as_bytes());
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", CONTENT_TYPE).as_bytes());
    body.put_slice(contents);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

#[async_trait]
impl DriveFiles for HttpFiles {
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let q = format!("name={}", query_literal(name));
        let files = self.list(&q, "files(id)").await?;
        Ok(files.into_iter().map(|f| f.id).collect())
    }

    async fn list_containing(&self, fragment: &str) -> anyhow::Result<Vec<DriveFile>> {
        let q = format!("name contains {}", query_literal(fragment));
        self.list(&q, "nextPageToken,files(id,name)").await
    }

    async fn download(&self, id: &str) -> anyhow::Result<Bytes> {
        let auth = self.token.authorization().await?;
        let resp = self
            .client
            .get(self.file_url(id))
            .header("Authorization", auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .context("Drive GET request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Drive GET failed: HTTP {} - {}", status, body);
        }

        Ok(resp.bytes().await.context("Failed to read Drive response body")?)
    }

    async fn create(&self, name: &str, contents: Bytes) -> anyhow::Result<String> {
        let boundary = format!("driveblob-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": name,
            "parents": [APP_DATA_FOLDER],
        });
        let body = multipart_body(&boundary, &metadata, &contents);

        let auth = self.token.authorization().await?;
        let resp = self
            .client
            .post(format!("{}/files", self.upload_base))
            .header("Authorization", auth)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .body(body)
            .send()
            .await
            .context("Drive upload request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Drive upload failed: HTTP {} - {}", status, body);
        }

        let created: CreateResponse = resp
            .json()
            .await
            .context("Failed to parse Drive upload response")?;
        debug!(name = %name, id = %created.id, size = contents.len(), "Drive upload complete");
        Ok(created.id)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let auth = self.token.authorization().await?;
        let resp = self
            .client
            .delete(self.file_url(id))
            .header("Authorization", auth)
            .send()
            .await
            .context("Drive DELETE request failed")?;

        // A concurrent delete of the same file already did our work.
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Drive DELETE failed: HTTP {} - {}", status, body);
        }

        debug!(id = %id, "Drive delete complete");
        Ok(())
    }
}
