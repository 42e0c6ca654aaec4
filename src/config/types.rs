use serde::{Deserialize, Serialize};

use crate::config::credentials::SecureString;

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Connection settings for the news backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the REST API (e.g., "https://news.example.com/api").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub api_token: Option<SecureString>,
}

/// List paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Articles requested per page (default: 20).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Retry policy for network-class failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts after the first failure; at most 1 (default: 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the retry in milliseconds (default: 250).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_page_size() -> u32 {
    20
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    250
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            api_token: None,
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}
