//! aria2 JSON-RPC client
//!
//! Downloads are queued on an external aria2 daemon with one
//! `system.multicall` round trip, then polled with batched
//! `aria2.tellStatus` calls until every job settles or the poll budget runs
//! out. Only the client side of the protocol lives here.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WorkshopConfig;
use crate::error::{Result, WorkshopError};
use crate::http::{RequestBody, RetryClient};

pub const METHOD_MULTICALL: &str = "system.multicall";
pub const METHOD_ADD_URI: &str = "aria2.addUri";
pub const METHOD_TELL_STATUS: &str = "aria2.tellStatus";

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcRequest {
    pub id: String,
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
}

/// One call inside a `system.multicall` batch
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

/// Error object returned for a whole request or for one batched call
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcFault {
    #[serde(alias = "faultCode")]
    pub code: i64,
    #[serde(alias = "faultString")]
    pub message: String,
}

impl From<RpcFault> for WorkshopError {
    fn from(fault: RpcFault) -> Self {
        WorkshopError::RpcFault { code: fault.code, message: fault.message }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RpcFault>,
}

/// Job state as reported by `aria2.tellStatus`
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aria2Status {
    Active,
    Waiting,
    Paused,
    Error,
    Complete,
    Removed,
}

/// Subset of the `aria2.tellStatus` result the poller needs
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TellStatus {
    pub gid: String,
    pub status: Aria2Status,
    #[serde(default)]
    pub completed_length: String,
    #[serde(default)]
    pub total_length: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TellStatus {
    fn describe_error(&self) -> String {
        match (&self.error_message, &self.error_code) {
            (Some(message), _) if !message.is_empty() => message.clone(),
            (_, Some(code)) => format!("aria2 error code {}", code),
            _ => "unknown aria2 error".to_string(),
        }
    }
}

/// A file to hand to the daemon
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedFile {
    pub item_id: u64,
    pub url: String,
    pub file_name: String,
}

/// A download queued on the daemon
#[derive(Debug, Clone, PartialEq)]
pub struct RpcJob {
    /// GID returned by aria2
    pub key: String,
    pub item_id: u64,
    pub file_name: String,
}

/// Terminal result of polling
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Complete,
    Error { key: String, message: String },
    Timeout { polls: usize },
}

impl Settled {
    pub fn into_result(self) -> Result<()> {
        match self {
            Settled::Complete => Ok(()),
            Settled::Error { key, message } => Err(WorkshopError::RpcJobError { key, message }),
            Settled::Timeout { polls } => Err(WorkshopError::PollTimeout { polls }),
        }
    }
}

/// Client for an aria2 daemon's JSON-RPC interface
#[derive(Debug, Clone)]
pub struct Aria2Client {
    http: RetryClient,
    endpoint: String,
    secret: Option<String>,
    download_dir: String,
    split: u32,
}

impl Aria2Client {
    pub fn new<E: Into<String>, D: Into<String>>(
        http: RetryClient,
        endpoint: E,
        download_dir: D,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            secret: None,
            download_dir: download_dir.into(),
            split: 1,
        }
    }

    /// Build a client when the configuration enables the RPC path
    pub fn from_config(config: &WorkshopConfig, http: RetryClient) -> Option<Self> {
        let endpoint = config.rpc_endpoint()?;
        let download_dir = config.rpc_download_dir.clone()?;
        let mut client = Self::new(http, endpoint, download_dir).with_split(config.thread_count);
        if let Some(token) = config.rpc_token() {
            client = client.with_secret(token);
        }
        Some(client)
    }

    pub fn with_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Connections aria2 may open per download
    pub fn with_split(mut self, split: u32) -> Self {
        self.split = split.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Positional params for one call, prefixed with the token when a secret is set
    fn call_params(&self, rest: impl IntoIterator<Item = Value>) -> Vec<Value> {
        self.secret
            .iter()
            .map(|secret| Value::String(format!("token:{}", secret)))
            .chain(rest)
            .collect()
    }

    fn multicall(&self, calls: Vec<MultiCall>) -> RpcRequest {
        RpcRequest {
            id: chrono::Utc::now().timestamp_millis().to_string(),
            jsonrpc: "2.0",
            method: METHOD_MULTICALL.to_string(),
            params: vec![json!(calls)],
        }
    }

    /// Batch body adding one `aria2.addUri` download per file
    pub fn add_uri_body(&self, files: &[QueuedFile]) -> RpcRequest {
        let calls = files
            .iter()
            .map(|file| MultiCall {
                method_name: METHOD_ADD_URI.to_string(),
                params: self.call_params([
                    json!([file.url]),
                    json!({
                        "dir": self.download_dir,
                        "out": file.file_name,
                        "split": self.split.to_string(),
                    }),
                ]),
            })
            .collect();
        self.multicall(calls)
    }

    /// Batch body querying `aria2.tellStatus` for every key
    pub fn tell_status_body(&self, keys: &[&str]) -> RpcRequest {
        let calls = keys
            .iter()
            .map(|key| MultiCall {
                method_name: METHOD_TELL_STATUS.to_string(),
                params: self.call_params([json!(key)]),
            })
            .collect();
        self.multicall(calls)
    }

    /// Queue every file in one round trip and return the job keys
    ///
    /// Fails if the daemon rejects the batch or any single call in it.
    pub async fn queue_download(&self, files: &[QueuedFile]) -> Result<Vec<RpcJob>> {
        let body = self.add_uri_body(files);
        debug!("aria2 addUri batch: {:?}", body);
        let response: RpcResponse = self
            .http
            .request_with_retry(Method::POST, &self.endpoint, RequestBody::Json(json!(body)))
            .await?;

        let keys = split_multicall::<String>(response, files.len())?;
        let mut jobs = Vec::with_capacity(files.len());
        for (file, key) in files.iter().zip(keys) {
            let key = key?;
            info!("Queued {} on aria2 as {}", file.file_name, key);
            jobs.push(RpcJob {
                key,
                item_id: file.item_id,
                file_name: file.file_name.clone(),
            });
        }
        Ok(jobs)
    }

    /// Query every job once; a failed request is not retried
    pub async fn tell_status(
        &self,
        jobs: &[RpcJob],
    ) -> Result<Vec<std::result::Result<TellStatus, RpcFault>>> {
        let keys: Vec<&str> = jobs.iter().map(|job| job.key.as_str()).collect();
        let body = self.tell_status_body(&keys);
        let response: RpcResponse = self
            .http
            .send_once(Method::POST, &self.endpoint, RequestBody::Json(json!(body)))
            .await?;
        split_multicall(response, jobs.len())
    }

    /// Poll until all jobs complete, one errors, or `max_polls` ticks pass
    ///
    /// Every tick waits `interval` first. A poll that fails outright is
    /// logged and uses up its tick like any other.
    pub async fn poll_until_settled(
        &self,
        jobs: &[RpcJob],
        interval: Duration,
        max_polls: usize,
    ) -> Settled {
        if jobs.is_empty() {
            return Settled::Complete;
        }

        for tick in 1..=max_polls {
            tokio::time::sleep(interval).await;

            let statuses = match self.tell_status(jobs).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    warn!("aria2 status poll {}/{} failed: {}", tick, max_polls, e);
                    continue;
                }
            };

            let mut complete = 0;
            for (job, status) in jobs.iter().zip(statuses) {
                match status {
                    Ok(status) if status.status == Aria2Status::Complete => complete += 1,
                    Ok(status) if status.status == Aria2Status::Error => {
                        return Settled::Error {
                            key: job.key.clone(),
                            message: status.describe_error(),
                        };
                    }
                    Ok(_) => {}
                    Err(fault) => {
                        return Settled::Error {
                            key: job.key.clone(),
                            message: fault.message,
                        };
                    }
                }
            }

            debug!("aria2 poll {}/{}: {}/{} complete", tick, max_polls, complete, jobs.len());
            if complete == jobs.len() {
                return Settled::Complete;
            }
        }

        Settled::Timeout { polls: max_polls }
    }
}

/// Unwrap the per-call results of a multicall response
///
/// Successful calls come back wrapped in a one-element array, failed calls
/// as a fault object.
fn split_multicall<T: DeserializeOwned>(
    response: RpcResponse,
    expected: usize,
) -> Result<Vec<std::result::Result<T, RpcFault>>> {
    if let Some(fault) = response.error {
        return Err(fault.into());
    }
    let results = response.result.unwrap_or_default();
    if results.len() != expected {
        return Err(WorkshopError::RpcFault {
            code: -1,
            message: format!("expected {} multicall results, got {}", expected, results.len()),
        });
    }

    results
        .into_iter()
        .map(|value| match value {
            Value::Array(mut wrapped) if !wrapped.is_empty() => {
                let inner = wrapped.swap_remove(0);
                serde_json::from_value(inner)
                    .map(Ok)
                    .map_err(|source| WorkshopError::Decode {
                        context: "multicall result".to_string(),
                        source,
                    })
            }
            other => serde_json::from_value::<RpcFault>(other)
                .map(Err)
                .map_err(|source| WorkshopError::Decode {
                    context: "multicall fault".to_string(),
                    source,
                }),
        })
        .collect()
}
