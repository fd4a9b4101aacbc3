use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// SQLite binds two parameters per lookup target and caps statements at 32766
pub const MAX_LOOKUP_TARGETS: usize = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub followgraph: FollowgraphConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Core service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FollowgraphConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Page sizes for list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Rows pulled from each index per step of the mutuals merge-join
    #[serde(default = "default_merge_batch_size")]
    pub merge_batch_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            merge_batch_size: default_merge_batch_size(),
        }
    }
}

/// Batch relationship lookup limits
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_targets: default_max_targets(),
        }
    }
}

/// Where user existence and privacy flags come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    Sqlite,
    Http,
}

/// User directory collaborator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_kind")]
    pub kind: DirectoryKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            kind: default_directory_kind(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Notification pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// When unset, events are only logged
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Per-user write throttling
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Follow-graph write actions allowed per user per minute; 0 disables
    #[serde(default = "default_actions_per_minute")]
    pub actions_per_minute: u32,
    /// Upper bound on users whose windows are held in memory
    #[serde(default = "default_tracked_users")]
    pub tracked_users: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            actions_per_minute: default_actions_per_minute(),
            tracked_users: default_tracked_users(),
        }
    }
}

/// Counter reconciliation configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    /// Interval of the background sweep; 0 disables it
    #[serde(default)]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Header carrying the caller id, set by the token-validating gateway
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
            identity_header: default_identity_header(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_merge_batch_size() -> usize {
    256
}

fn default_max_targets() -> usize {
    100
}

fn default_directory_kind() -> DirectoryKind {
    DirectoryKind::Sqlite
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_actions_per_minute() -> u32 {
    60
}

fn default_tracked_users() -> usize {
    10_000
}

fn default_sweep_batch_size() -> usize {
    500
}

fn default_http_port() -> u16 {
    8080
}

fn default_identity_header() -> String {
    "x-user-id".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in FOLLOWGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("FOLLOWGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.pagination.default_limit == 0 {
            anyhow::bail!("pagination.default_limit must be greater than 0");
        }

        if self.pagination.max_limit < self.pagination.default_limit {
            anyhow::bail!("pagination.max_limit must be at least pagination.default_limit");
        }

        if self.pagination.merge_batch_size == 0 {
            anyhow::bail!("pagination.merge_batch_size must be greater than 0");
        }

        if self.lookup.max_targets == 0 || self.lookup.max_targets > MAX_LOOKUP_TARGETS {
            anyhow::bail!("lookup.max_targets must be between 1 and {}", MAX_LOOKUP_TARGETS);
        }

        if self.directory.kind == DirectoryKind::Http && self.directory.base_url.is_none() {
            anyhow::bail!("directory.base_url is required when directory.kind = \"http\"");
        }

        if let Some(base) = &self.directory.base_url {
            url::Url::parse(base)
                .with_context(|| format!("directory.base_url is not a valid URL: {}", base))?;
        }

        if let Some(hook) = &self.events.webhook_url {
            url::Url::parse(hook)
                .with_context(|| format!("events.webhook_url is not a valid URL: {}", hook))?;
        }

        if self.rate_limit.actions_per_minute > 0 && self.rate_limit.tracked_users == 0 {
            anyhow::bail!("rate_limit.tracked_users must be greater than 0 when rate limiting is on");
        }

        if self.reconcile.sweep_interval_secs > 0 && self.reconcile.sweep_batch_size == 0 {
            anyhow::bail!("reconcile.sweep_batch_size must be greater than 0");
        }

        if self.http_server.identity_header.trim().is_empty() {
            anyhow::bail!("http_server.identity_header must not be empty");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.followgraph.db_path
    }
}
