//! HTTP client with bounded retries
//!
//! Every upstream call (Workshop details, aria2 RPC) goes through
//! [`RetryClient`]. Retries are immediate and counted by an explicit loop.

use futures::StreamExt;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::WorkshopConfig;
use crate::error::{Result, WorkshopError};

/// Body attached to an outgoing request
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    /// Sent verbatim, e.g. the `[id1,id2]` list the Workshop API expects
    Text(String),
    Json(serde_json::Value),
}

/// Run `op` once, then up to `max_retries` more times until it succeeds
///
/// Each retry is logged with its ordinal and the configured bound. When the
/// last attempt fails the error is replaced by
/// [`WorkshopError::RetryExhausted`] carrying `url`.
pub async fn with_retries<T, F, Fut>(url: &str, max_retries: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 0..=max_retries {
        if attempt > 0 {
            info!("{} request failed, retrying... {}/{}", url, attempt, max_retries);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                last_error = Some(e);
            }
        }
    }

    Err(WorkshopError::RetryExhausted {
        url: url.to_string(),
        max_retries,
        last_error: last_error.map_or("No specific error recorded".to_string(), |e| e.to_string()),
    })
}

/// Shared HTTP client carrying the retry bound
#[derive(Debug, Clone)]
pub struct RetryClient {
    client: Client,
    max_retries: usize,
    /// Per-request override for file downloads
    download_timeout: Duration,
}

impl RetryClient {
    pub fn new(config: &WorkshopConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| WorkshopError::HttpRequest {
                url: "<client>".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            max_retries: config.request_retries,
            download_timeout: config.download_timeout(),
        })
    }

    /// Use an existing client, e.g. one shared with the host application
    pub fn with_client(client: Client, max_retries: usize) -> Self {
        Self {
            client,
            max_retries,
            download_timeout: WorkshopConfig::default().download_timeout(),
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Send a request and decode the JSON response, retrying on any failure
    pub async fn request_with_retry<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<T> {
        with_retries(url, self.max_retries, || {
            self.send_once(method.clone(), url, body.clone())
        })
        .await
    }

    /// Send a single request and decode the JSON response
    pub async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<T> {
        let mut request = self.client.request(method, url);
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Text(text) => {
                request.header("Content-Type", "application/json").body(text)
            }
            RequestBody::Json(value) => request.json(&value),
        };

        let response = request.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| WorkshopError::Decode {
            context: format!("response from '{}'", url),
            source,
        })
    }

    /// Stream a file into a temporary path with a single GET
    ///
    /// The download timeout replaces the request timeout for this call. The
    /// file is deleted when the returned handle is dropped.
    pub async fn download_to_temp(&self, url: &str) -> Result<NamedTempFile> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?
            .error_for_status()?;

        let temp = NamedTempFile::new().map_err(|source| WorkshopError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let mut file = tokio::fs::File::create(temp.path())
            .await
            .map_err(|source| io_error(temp.path(), source))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| io_error(temp.path(), source))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|source| io_error(temp.path(), source))?;

        debug!("Fetched {} bytes from {} into {}", written, url, temp.path().display());
        Ok(temp)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> WorkshopError {
    WorkshopError::Io {
        path: path.to_path_buf(),
        source,
    }
}
