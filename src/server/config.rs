//! Server configuration types
//!
//! Contains all configuration structures for the Eventscope server.

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path; parent directories are created on startup
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Attempts before a failed write is dropped and counted
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Pending writes the retry queue holds before dropping new ones
    #[serde(default = "default_retry_queue_capacity")]
    pub retry_queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_queue_capacity: default_retry_queue_capacity(),
        }
    }
}

fn default_db_path() -> String {
    "data/events.db".to_string()
}
fn default_retry_max_attempts() -> u32 {
    5
}
fn default_retry_queue_capacity() -> usize {
    1024
}

/// Watch connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Kubernetes API server base URL
    #[serde(default = "default_api_server")]
    pub api_server: String,
    /// Namespace whose events are watched
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Service account token file; omit for anonymous access
    #[serde(default)]
    pub token_path: Option<String>,
    /// CA bundle for the API server; omit to use system roots
    #[serde(default)]
    pub ca_path: Option<String>,
    /// Accept any server certificate (local clusters only)
    #[serde(default)]
    pub insecure_skip_tls: bool,
    /// How long the initial listing may keep failing before startup aborts
    #[serde(default = "default_startup_grace_secs")]
    pub startup_grace_secs: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Repeats of the same event within this window increment one row
    #[serde(default = "default_coalesce_window_secs")]
    pub coalesce_window_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_server: default_api_server(),
            namespace: default_namespace(),
            token_path: None,
            ca_path: None,
            insecure_skip_tls: false,
            startup_grace_secs: default_startup_grace_secs(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            coalesce_window_secs: default_coalesce_window_secs(),
        }
    }
}

fn default_api_server() -> String {
    "https://kubernetes.default.svc".to_string()
}
fn default_namespace() -> String {
    "demo".to_string()
}
fn default_startup_grace_secs() -> u64 {
    30
}
fn default_backoff_initial_ms() -> u64 {
    500
}
fn default_backoff_max_secs() -> u64 {
    30
}
fn default_coalesce_window_secs() -> u64 {
    3600
}

/// Live stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Records kept in the recent-history ring
    #[serde(default = "default_recent_buffer")]
    pub recent_buffer: usize,
    /// Per-viewer delivery buffer; a viewer this far behind is disconnected
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Records per stream frame when the client does not ask for a limit
    #[serde(default = "default_stream_limit")]
    pub default_limit: u32,
    #[serde(default = "default_stream_max_limit")]
    pub max_limit: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            recent_buffer: default_recent_buffer(),
            subscriber_buffer: default_subscriber_buffer(),
            default_limit: default_stream_limit(),
            max_limit: default_stream_max_limit(),
        }
    }
}

fn default_recent_buffer() -> usize {
    500
}
fn default_subscriber_buffer() -> usize {
    64
}
fn default_stream_limit() -> u32 {
    100
}
fn default_stream_max_limit() -> u32 {
    500
}
