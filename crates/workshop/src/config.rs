//! Configuration for Workshop resolution, delivery and the aria2 RPC path
//!
//! The configuration is built once at startup and handed to every component
//! by reference. Nothing reads it from a global.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WorkshopError};

/// Workshop details endpoint
pub const WORKSHOP_API: &str = "https://steamworkshopdownloader.io/api/details/file";

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "WORKSHOP_";

/// Configuration for the Workshop command
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkshopConfig {
    /// Trigger the command on messages that start with a Workshop link
    pub auto_recognise: bool,
    /// Ask for confirmation before delivering files
    pub ask_download: bool,
    /// Deliver anyway when the confirmation prompt gets no reply
    pub proceed_on_prompt_timeout: bool,
    /// Extra attempts for metadata and RPC requests
    pub request_retries: usize,
    /// Extra delivery rounds for files that failed to send
    pub download_retries: usize,
    /// Connections per download job handed to the daemon
    pub thread_count: u32,
    pub input_timeout_ms: u64,
    /// Timeout for metadata and RPC requests
    pub request_timeout_ms: u64,
    /// Timeout for a whole file download, replacing the request timeout
    pub download_timeout_ms: u64,
    pub user_agent: String,
    pub workshop_api: String,

    /// Queue downloads through aria2 instead of uploading them
    pub rpc_enabled: bool,
    pub rpc_host: Option<String>,
    pub rpc_port: u16,
    pub rpc_secure: bool,
    pub rpc_secret: Option<String>,
    pub rpc_poll_interval_ms: u64,
    pub rpc_max_polls: usize,
    pub rpc_download_dir: Option<String>,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            auto_recognise: true,
            ask_download: true,
            proceed_on_prompt_timeout: false,
            request_retries: 5,
            download_retries: 5,
            thread_count: 4,
            input_timeout_ms: 60_000,
            request_timeout_ms: 30_000,
            download_timeout_ms: 600_000, // 10 minutes per file
            user_agent: format!("workshop/{}", env!("CARGO_PKG_VERSION")),
            workshop_api: WORKSHOP_API.to_string(),
            rpc_enabled: false,
            rpc_host: None,
            rpc_port: 6800,
            rpc_secure: false,
            rpc_secret: None,
            rpc_poll_interval_ms: 10_000,
            rpc_max_polls: 60,
            rpc_download_dir: None,
        }
    }
}

impl WorkshopConfig {
    /// Load a JSON configuration file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WorkshopError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| WorkshopError::Decode {
            context: format!("configuration file '{}'", path.display()),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from `WORKSHOP_*` environment variables
    ///
    /// A `.env` file is loaded first when present. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        let mut config = Self::default();

        read_env("AUTO_RECOGNISE", &mut config.auto_recognise)?;
        read_env("ASK_DOWNLOAD", &mut config.ask_download)?;
        read_env("PROCEED_ON_PROMPT_TIMEOUT", &mut config.proceed_on_prompt_timeout)?;
        read_env("REQUEST_RETRIES", &mut config.request_retries)?;
        read_env("DOWNLOAD_RETRIES", &mut config.download_retries)?;
        read_env("THREAD_COUNT", &mut config.thread_count)?;
        read_env("INPUT_TIMEOUT_MS", &mut config.input_timeout_ms)?;
        read_env("REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms)?;
        read_env("DOWNLOAD_TIMEOUT_MS", &mut config.download_timeout_ms)?;
        read_env("USER_AGENT", &mut config.user_agent)?;
        read_env("API", &mut config.workshop_api)?;
        read_env("RPC_ENABLED", &mut config.rpc_enabled)?;
        read_env_opt("RPC_HOST", &mut config.rpc_host);
        read_env("RPC_PORT", &mut config.rpc_port)?;
        read_env("RPC_SECURE", &mut config.rpc_secure)?;
        read_env_opt("RPC_SECRET", &mut config.rpc_secret);
        read_env("RPC_POLL_INTERVAL_MS", &mut config.rpc_poll_interval_ms)?;
        read_env("RPC_MAX_POLLS", &mut config.rpc_max_polls)?;
        read_env_opt("RPC_DOWNLOAD_DIR", &mut config.rpc_download_dir);

        config.validate()?;
        Ok(config)
    }

    /// Check ranges and the options the RPC path requires
    pub fn validate(&self) -> Result<()> {
        check_range("requestRetries", self.request_retries as u64, 0, 10)?;
        check_range("downloadRetries", self.download_retries as u64, 0, 10)?;
        check_range("threadCount", self.thread_count as u64, 1, 16)?;
        check_range("inputTimeoutMs", self.input_timeout_ms, 5_000, u64::MAX)?;
        check_range("requestTimeoutMs", self.request_timeout_ms, 1_000, u64::MAX)?;
        check_range("downloadTimeoutMs", self.download_timeout_ms, 1_000, u64::MAX)?;

        if self.workshop_api.trim().is_empty() {
            return Err(missing("workshopApi", "Set workshopApi to the Workshop details endpoint"));
        }

        if self.rpc_enabled {
            if self.rpc_host.as_deref().is_none_or(|host| host.trim().is_empty()) {
                return Err(missing("rpcHost", "Set rpcHost to the host running aria2"));
            }
            if self.rpc_download_dir.as_deref().is_none_or(|dir| dir.trim().is_empty()) {
                return Err(missing(
                    "rpcDownloadDir",
                    "Set rpcDownloadDir to the daemon's download directory",
                ));
            }
            check_range("rpcPort", self.rpc_port as u64, 1, 65_535)?;
            check_range("rpcPollIntervalMs", self.rpc_poll_interval_ms, 1_000, u64::MAX)?;
            check_range("rpcMaxPolls", self.rpc_max_polls as u64, 1, u64::MAX)?;
        }

        Ok(())
    }

    /// JSON-RPC endpoint of the download daemon, when the RPC path is enabled
    pub fn rpc_endpoint(&self) -> Option<String> {
        if !self.rpc_enabled {
            return None;
        }
        let host = self.rpc_host.as_deref()?;
        let scheme = if self.rpc_secure { "https" } else { "http" };
        Some(format!("{}://{}:{}/jsonrpc", scheme, host, self.rpc_port))
    }

    pub fn input_timeout(&self) -> Duration {
        Duration::from_millis(self.input_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn rpc_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc_poll_interval_ms)
    }

    /// Secret for the daemon, ignoring blank values
    pub fn rpc_token(&self) -> Option<&str> {
        self.rpc_secret.as_deref().filter(|secret| !secret.is_empty())
    }
}

fn read_env<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<()> {
    let key = format!("{}{}", ENV_PREFIX, name);
    if let Ok(value) = std::env::var(&key) {
        *target = value.trim().parse().map_err(|_| WorkshopError::Configuration {
            message: format!("{} has an unparseable value '{}'", key, value),
            field: Some(key.clone()),
            suggestion: None,
        })?;
    }
    Ok(())
}

fn read_env_opt(name: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(format!("{}{}", ENV_PREFIX, name)) {
        *target = Some(value);
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        let bounds = if max == u64::MAX {
            format!("at least {}", min)
        } else {
            format!("between {} and {}", min, max)
        };
        return Err(WorkshopError::Configuration {
            message: format!("{} is {}, expected {}", field, value, bounds),
            field: Some(field.to_string()),
            suggestion: Some(format!("Set {} to a value {}", field, bounds)),
        });
    }
    Ok(())
}

fn missing(field: &str, suggestion: &str) -> WorkshopError {
    WorkshopError::Configuration {
        message: format!("{} is required", field),
        field: Some(field.to_string()),
        suggestion: Some(suggestion.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rpc_config() -> WorkshopConfig {
        WorkshopConfig {
            rpc_enabled: true,
            rpc_host: Some("127.0.0.1".to_string()),
            rpc_download_dir: Some("/downloads".to_string()),
            ..WorkshopConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = WorkshopConfig::default();
        assert!(config.auto_recognise);
        assert!(config.ask_download);
        assert_eq!(config.request_retries, 5);
        assert_eq!(config.download_retries, 5);
        assert_eq!(config.input_timeout(), Duration::from_secs(60));
        assert_eq!(config.download_timeout(), Duration::from_secs(600));
        assert_eq!(config.rpc_port, 6800);
        assert_eq!(config.rpc_max_polls, 60);
        assert!(config.validate().is_ok());
        assert_eq!(config.rpc_endpoint(), None);
    }

    #[test]
    fn test_rpc_endpoint() {
        let mut config = rpc_config();
        assert_eq!(config.rpc_endpoint().as_deref(), Some("http://127.0.0.1:6800/jsonrpc"));

        config.rpc_secure = true;
        config.rpc_port = 443;
        assert_eq!(config.rpc_endpoint().as_deref(), Some("https://127.0.0.1:443/jsonrpc"));
    }

    #[test]
    fn test_rpc_requires_host_and_dir() {
        let mut config = rpc_config();
        config.rpc_host = None;
        match config.validate().unwrap_err() {
            WorkshopError::Configuration { field, .. } => {
                assert_eq!(field.as_deref(), Some("rpcHost"))
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }

        let mut config = rpc_config();
        config.rpc_download_dir = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_values() {
        let config = WorkshopConfig { request_retries: 11, ..WorkshopConfig::default() };
        assert!(config.validate().is_err());

        let config = WorkshopConfig { input_timeout_ms: 100, ..WorkshopConfig::default() };
        assert!(config.validate().is_err());

        let config = WorkshopConfig { thread_count: 0, ..WorkshopConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_secret_is_ignored() {
        let mut config = rpc_config();
        config.rpc_secret = Some(String::new());
        assert_eq!(config.rpc_token(), None);
        config.rpc_secret = Some("s3cret".to_string());
        assert_eq!(config.rpc_token(), Some("s3cret"));
    }

    #[test]
    fn test_from_file_uses_camel_case_and_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "askDownload": false,
                "requestRetries": 2,
                "rpcEnabled": true,
                "rpcHost": "nas.local",
                "rpcSecret": "token",
                "rpcDownloadDir": "/srv/downloads"
            }}"#
        )
        .unwrap();

        let config = WorkshopConfig::from_file(file.path()).unwrap();
        assert!(!config.ask_download);
        assert_eq!(config.request_retries, 2);
        assert_eq!(config.download_retries, 5);
        assert_eq!(config.rpc_endpoint().as_deref(), Some("http://nas.local:6800/jsonrpc"));
        assert_eq!(config.rpc_token(), Some("token"));
    }

    #[test]
    fn test_from_file_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rpcEnabled": true }}"#).unwrap();
        assert!(matches!(
            WorkshopConfig::from_file(file.path()),
            Err(WorkshopError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_env_overrides() {
        unsafe {
            std::env::set_var("WORKSHOP_DOWNLOAD_RETRIES", "3");
        }
        let config = WorkshopConfig::from_env().unwrap();
        unsafe {
            std::env::remove_var("WORKSHOP_DOWNLOAD_RETRIES");
        }
        assert_eq!(config.download_retries, 3);
        assert_eq!(config.request_retries, 5);
    }

    #[test]
    fn test_from_file_missing() {
        let result = WorkshopConfig::from_file("/nonexistent/workshop.json");
        assert!(matches!(result, Err(WorkshopError::Io { .. })));
    }
}
