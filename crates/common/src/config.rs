//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. Real-time events stay in-process when absent.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Attachment storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Dispute workflow settings.
    #[serde(default)]
    pub disputes: DisputeConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys and channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Local attachment storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix files are served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

/// Dispute workflow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeConfig {
    /// SLA window given to new disputes, in hours.
    #[serde(default = "default_sla_hours")]
    pub default_sla_hours: i32,
    /// Window used by the "due soon" dashboard filter, in hours.
    #[serde(default = "default_due_soon_hours")]
    pub due_soon_hours: i64,
    /// Maximum number of attachments per message.
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
    /// Maximum size of a single attachment in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,
    /// MIME types accepted as attachments.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Whether the background sweep closes overdue disputes.
    #[serde(default = "default_true")]
    pub expiry_sweep_enabled: bool,
    /// Interval between sweeps, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub expiry_sweep_interval_secs: u64,
    /// Extra time granted past the deadline before a dispute expires, in hours.
    #[serde(default)]
    pub expiry_grace_hours: i64,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            default_sla_hours: default_sla_hours(),
            due_soon_hours: default_due_soon_hours(),
            max_attachments: default_max_attachments(),
            max_attachment_bytes: default_max_attachment_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
            expiry_sweep_enabled: true,
            expiry_sweep_interval_secs: default_sweep_interval(),
            expiry_grace_hours: 0,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "mercado".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

const fn default_sla_hours() -> i32 {
    72
}

const fn default_due_soon_hours() -> i64 {
    24
}

const fn default_max_attachments() -> usize {
    3
}

const fn default_max_attachment_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "application/pdf",
        "text/plain",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

const fn default_true() -> bool {
    true
}

const fn default_sweep_interval() -> u64 {
    300
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `MERCADO_ENV`)
    /// 4. Environment variables with `MERCADO__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("MERCADO_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MERCADO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MERCADO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
