//! File-management backend over HTTP

use super::slots_http::{classify_status, classify_transport};
use super::{BlobEntry, BlobStore};
use crate::config::timeouts;
use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::naming::BLOB_EXTENSION;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Deserialize)]
struct FileRecord {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default, rename = "isDirectory")]
    is_directory: bool,
}

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    token: String,
}

/// `GET /files`, `DELETE /files/{name}` guarded by an anti-forgery token.
///
/// The token is fetched from `GET /csrf-token` on first delete and cached;
/// a 403 drops the cached token and the delete is retried once.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    token: Mutex<Option<String>>,
}

impl HttpBlobStore {
    pub fn new(files_url: &str, connect_timeout: Duration) -> SlotkeeperResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SlotkeeperError::backend(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, files_url))
    }

    pub fn with_client(client: Client, files_url: &str) -> Self {
        Self {
            client,
            base_url: files_url.trim_end_matches('/').to_string(),
            request_timeout: timeouts::network::files_request_timeout(),
            token: Mutex::new(None),
        }
    }

    fn file_url(&self, name: &str) -> SlotkeeperResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            SlotkeeperError::config(format!("Invalid files URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| SlotkeeperError::config(format!("Files URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("files")
            .push(name);
        Ok(url)
    }

    async fn csrf_token(&self) -> SlotkeeperResult<String> {
        if let Some(token) = self.token.lock().clone() {
            return Ok(token);
        }

        let budget = self.request_timeout.as_secs();
        let response = self
            .client
            .get(format!("{}/csrf-token", self.base_url))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, "Fetching CSRF token", budget))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "Fetching CSRF token"));
        }

        let body: CsrfResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(e, "Fetching CSRF token", budget))?;
        *self.token.lock() = Some(body.token.clone());
        debug!("cached CSRF token");
        Ok(body.token)
    }

    async fn try_delete(&self, url: &Url, token: &str) -> SlotkeeperResult<StatusCode> {
        let response = self
            .client
            .delete(url.clone())
            .header(CSRF_HEADER, token)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, "Deleting cache file", self.request_timeout.as_secs()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::FORBIDDEN {
            return Ok(status);
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(status, &text, "Deleting cache file"))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self), level = "debug")]
    async fn list(&self) -> SlotkeeperResult<Vec<BlobEntry>> {
        let budget = self.request_timeout.as_secs();
        let response = self
            .client
            .get(format!("{}/files", self.base_url))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, "Listing cache files", budget))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "Listing cache files"));
        }

        let records: Vec<FileRecord> = response
            .json()
            .await
            .map_err(|e| classify_transport(e, "Listing cache files", budget))?;

        Ok(records
            .into_iter()
            .filter(|r| !r.is_directory && r.name.ends_with(BLOB_EXTENSION))
            .map(|r| BlobEntry {
                name: r.name,
                size: r.size,
            })
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, name: &str) -> SlotkeeperResult<()> {
        let url = self.file_url(name)?;

        let token = self.csrf_token().await?;
        if self.try_delete(&url, &token).await? != StatusCode::FORBIDDEN {
            return Ok(());
        }

        debug!("CSRF token rejected, refreshing");
        *self.token.lock() = None;
        let token = self.csrf_token().await?;
        match self.try_delete(&url, &token).await? {
            StatusCode::FORBIDDEN => Err(SlotkeeperError::backend_status(
                format!("Deleting cache file '{}' was forbidden", name),
                StatusCode::FORBIDDEN.as_u16(),
            )),
            _ => Ok(()),
        }
    }
}
