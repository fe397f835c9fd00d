use datapress_publish::{PublisherConfig, DEFAULT_IDENTIFIER_PREFIX};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

/// Process configuration, read once at startup from `DATAPRESS_*` variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub draft_root: PathBuf,
    pub published_root: PathBuf,
    /// When both base URLs are set the server talks to the remote blob
    /// store; otherwise it uses the local filesystem roots.
    pub blob_draft_base_url: Option<String>,
    pub blob_published_base_url: Option<String>,
    pub blob_bearer_token: Option<String>,
    pub blob_timeout: Duration,
    pub blob_allow_private_hosts: bool,
    pub identifier_prefix: String,
    pub skip_metadata_validation: bool,
    pub lease_ttl: Duration,
    pub max_concurrent_attempts: usize,
    pub shutdown_drain: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            db_path: PathBuf::from("artifacts/registry.db"),
            draft_root: PathBuf::from("artifacts/draft-store"),
            published_root: PathBuf::from("artifacts/published-store"),
            blob_draft_base_url: None,
            blob_published_base_url: None,
            blob_bearer_token: None,
            blob_timeout: Duration::from_secs(15),
            blob_allow_private_hosts: false,
            identifier_prefix: DEFAULT_IDENTIFIER_PREFIX.to_string(),
            skip_metadata_validation: false,
            lease_ttl: Duration::from_secs(900),
            max_concurrent_attempts: 4,
            shutdown_drain: Duration::from_millis(5000),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env::var("DATAPRESS_BIND").unwrap_or(defaults.bind_addr),
            db_path: env::var("DATAPRESS_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            draft_root: env::var("DATAPRESS_DRAFT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.draft_root),
            published_root: env::var("DATAPRESS_PUBLISHED_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.published_root),
            blob_draft_base_url: env::var("DATAPRESS_BLOB_DRAFT_BASE_URL").ok(),
            blob_published_base_url: env::var("DATAPRESS_BLOB_PUBLISHED_BASE_URL").ok(),
            blob_bearer_token: env::var("DATAPRESS_BLOB_BEARER").ok(),
            blob_timeout: env_duration_ms("DATAPRESS_BLOB_TIMEOUT_MS", 15_000),
            blob_allow_private_hosts: env_bool("DATAPRESS_BLOB_ALLOW_PRIVATE_HOSTS", false),
            identifier_prefix: env::var("DATAPRESS_IDENTIFIER_PREFIX")
                .unwrap_or(defaults.identifier_prefix),
            skip_metadata_validation: env_bool("DATAPRESS_SKIP_METADATA_VALIDATION", false),
            lease_ttl: env_duration_ms("DATAPRESS_LEASE_TTL_MS", 900_000),
            max_concurrent_attempts: env_usize("DATAPRESS_MAX_CONCURRENT_ATTEMPTS", 4),
            shutdown_drain: env_duration_ms("DATAPRESS_SHUTDOWN_DRAIN_MS", 5000),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| format!("invalid DATAPRESS_BIND `{}`: {err}", self.bind_addr))?;
        if self.blob_draft_base_url.is_some() != self.blob_published_base_url.is_some() {
            return Err(
                "DATAPRESS_BLOB_DRAFT_BASE_URL and DATAPRESS_BLOB_PUBLISHED_BASE_URL must be set together"
                    .to_string(),
            );
        }
        if self.identifier_prefix.trim().is_empty() {
            return Err("DATAPRESS_IDENTIFIER_PREFIX must not be empty".to_string());
        }
        if self.max_concurrent_attempts == 0 {
            return Err("DATAPRESS_MAX_CONCURRENT_ATTEMPTS must be at least 1".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            skip_metadata_validation: self.skip_metadata_validation,
            lease_ttl: self.lease_ttl,
            max_concurrent_attempts: self.max_concurrent_attempts,
        }
    }
}
