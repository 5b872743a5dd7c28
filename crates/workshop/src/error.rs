//! Error types for Workshop resolution and delivery with context and user-facing text

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

use crate::notice::Notice;

/// Everything that can go wrong while handling a Workshop command
#[derive(Error, Debug)]
pub enum WorkshopError {
    /// Transport-level HTTP failure
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: u16,
    },

    /// Retry exhaustion with the URL that kept failing
    #[error("Request failed, maximum retry attempts ({max_retries}) exceeded for '{url}'")]
    RetryExhausted {
        url: String,
        max_retries: usize,
        last_error: String,
    },

    /// Upstream returned no records for the requested id
    #[error("No Workshop records returned for id {id}")]
    EmptyResult {
        id: u64,
    },

    /// Input is not a Workshop sharing link
    #[error("Invalid Workshop link '{url}': {reason}")]
    InvalidLink {
        url: String,
        reason: String,
    },

    /// Items that could not be delivered after every retry round
    #[error("{} item(s) could not be delivered: {failed:?}", failed.len())]
    DeliveryFailed {
        failed: Vec<u64>,
    },

    /// The download daemon reports an error state for a queued job
    #[error("Download job '{key}' failed: {message}")]
    RpcJobError {
        key: String,
        message: String,
    },

    /// Polling ran out of attempts before the jobs settled
    #[error("Download jobs did not settle after {polls} polls")]
    PollTimeout {
        polls: usize,
    },

    /// JSON-RPC error object returned by the daemon
    #[error("RPC call failed with code {code}: {message}")]
    RpcFault {
        code: i64,
        message: String,
    },

    /// Response body could not be decoded
    #[error("Failed to decode {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// The chat collaborator could not carry out a request
    #[error("Chat session error: {message}")]
    Session {
        message: String,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, WorkshopError>;

impl WorkshopError {
    /// Check if error is recoverable (worth another attempt)
    pub fn is_recoverable(&self) -> bool {
        match self {
            WorkshopError::HttpRequest { source, .. } => {
                source.status().map_or(true, |status| status.is_server_error() || status == 429)
            }
            WorkshopError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            WorkshopError::Session { .. } => true,
            WorkshopError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            WorkshopError::RetryExhausted { .. } => false, // Already exhausted retries
            WorkshopError::EmptyResult { .. } => false,
            WorkshopError::InvalidLink { .. } => false,
            WorkshopError::DeliveryFailed { .. } => false,
            WorkshopError::RpcJobError { .. } => false,
            WorkshopError::PollTimeout { .. } => false,
            WorkshopError::RpcFault { .. } => false,
            WorkshopError::Decode { .. } => false,
            WorkshopError::Configuration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            WorkshopError::HttpRequest { .. } => "http_request",
            WorkshopError::HttpStatus { .. } => "http_status",
            WorkshopError::RetryExhausted { .. } => "retry_exhausted",
            WorkshopError::EmptyResult { .. } => "empty_result",
            WorkshopError::InvalidLink { .. } => "invalid_link",
            WorkshopError::DeliveryFailed { .. } => "delivery_failed",
            WorkshopError::RpcJobError { .. } => "rpc_job_error",
            WorkshopError::PollTimeout { .. } => "poll_timeout",
            WorkshopError::RpcFault { .. } => "rpc_fault",
            WorkshopError::Decode { .. } => "decode",
            WorkshopError::Configuration { .. } => "configuration",
            WorkshopError::Session { .. } => "session",
            WorkshopError::Io { .. } => "io",
        }
    }

    /// Get a suggestion for resolving the error, when one exists
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            WorkshopError::RetryExhausted { .. } => {
                Some("Check the network connection or raise requestRetries")
            }
            WorkshopError::EmptyResult { .. } => {
                Some("Check that the Workshop id exists and is public")
            }
            WorkshopError::InvalidLink { .. } => {
                Some("Use a link like https://steamcommunity.com/sharedfiles/filedetails/?id=123")
            }
            WorkshopError::PollTimeout { .. } => {
                Some("The download may still be running in the daemon")
            }
            WorkshopError::Configuration { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// The single chat notice a user sees for this error
    pub fn user_notice(&self) -> Notice {
        match self {
            WorkshopError::InvalidLink { .. } => Notice::InvalidLink,
            WorkshopError::DeliveryFailed { .. } => Notice::DownloadFailed,
            WorkshopError::RpcJobError { message, .. } => Notice::RpcError {
                message: message.clone(),
            },
            WorkshopError::PollTimeout { .. } => Notice::RpcTimeout,
            // RetryExhausted, EmptyResult and transport errors all read as a failed request
            _ => Notice::RequestFailed,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

impl From<reqwest::Error> for WorkshopError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());
        match error.status() {
            Some(status) => WorkshopError::HttpStatus {
                url,
                status: status.as_u16(),
            },
            None => WorkshopError::HttpRequest { url, source: error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failures_share_a_notice() {
        let exhausted = WorkshopError::RetryExhausted {
            url: "https://example.com".to_string(),
            max_retries: 3,
            last_error: "boom".to_string(),
        };
        let empty = WorkshopError::EmptyResult { id: 42 };

        assert_eq!(exhausted.user_notice(), Notice::RequestFailed);
        assert_eq!(empty.user_notice(), Notice::RequestFailed);
    }

    #[test]
    fn test_rpc_errors_are_distinct() {
        let job = WorkshopError::RpcJobError {
            key: "2089b05ecca3d829".to_string(),
            message: "Resource not found".to_string(),
        };
        let timeout = WorkshopError::PollTimeout { polls: 60 };

        assert_eq!(
            job.user_notice(),
            Notice::RpcError { message: "Resource not found".to_string() }
        );
        assert_eq!(timeout.user_notice(), Notice::RpcTimeout);
        assert_ne!(job.category(), timeout.category());
    }

    #[test]
    fn test_recoverable_statuses() {
        let server = WorkshopError::HttpStatus { url: "u".to_string(), status: 503 };
        let client = WorkshopError::HttpStatus { url: "u".to_string(), status: 404 };
        assert!(server.is_recoverable());
        assert!(!client.is_recoverable());
        assert!(!WorkshopError::EmptyResult { id: 1 }.is_recoverable());
    }

    #[test]
    fn test_detailed_report() {
        let error = WorkshopError::Configuration {
            message: "rpcHost is required".to_string(),
            field: Some("rpcHost".to_string()),
            suggestion: Some("Set rpcHost".to_string()),
        };
        let report = error.detailed_report();
        assert!(report.contains("Category: configuration"));
        assert!(report.contains("Suggestion: Set rpcHost"));
        assert!(report.contains("Recoverable: false"));
    }
}
