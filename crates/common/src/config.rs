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
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Moderation workflow configuration.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
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

/// Which blob store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Directory for the local backend.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// URL prefix the server exposes local blobs under.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// HMAC key for local signed URLs.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
    /// Lifetime of signed attachment URLs.
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,
    /// Upper bound on a single attachment.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// S3 endpoint URL (e.g. `MinIO` URL).
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Path prefix within the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            base_path: default_base_path(),
            base_url: default_base_url(),
            signing_secret: default_signing_secret(),
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            s3: None,
        }
    }
}

/// Which status transitions an admin may apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicyKind {
    /// Any status may follow any other.
    #[default]
    Permissive,
    /// Only forward moves, plus reopening a concluded issue.
    ForwardOnly,
}

/// Moderation workflow configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationConfig {
    #[serde(default)]
    pub transition_policy: TransitionPolicyKind,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Usernames that are granted admin rights at signup and signin.
    #[serde(default)]
    pub admin_usernames: Vec<String>,
}

impl AuthConfig {
    /// Whether `username` is configured as an admin (case-insensitive).
    #[must_use]
    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames
            .iter()
            .any(|name| name.eq_ignore_ascii_case(username))
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

fn default_base_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_base_url() -> String {
    "/files".to_string()
}

fn default_signing_secret() -> String {
    "change-me".to_string()
}

const fn default_signed_url_ttl_secs() -> u64 {
    60 * 60 * 24 * 365
}

const fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SINMUNGO_ENV`)
    /// 3. Environment variables with `SINMUNGO_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SINMUNGO_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SINMUNGO")
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
                config::Environment::with_prefix("SINMUNGO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"
            [database]
            url = "postgres://localhost/sinmungo"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackendKind::Local);
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.signed_url_ttl_secs, 31_536_000);
        assert_eq!(
            config.moderation.transition_policy,
            TransitionPolicyKind::Permissive
        );
        assert!(config.auth.admin_usernames.is_empty());
    }

    #[test]
    fn test_forward_only_policy() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"
            [database]
            url = "postgres://localhost/sinmungo"
            [moderation]
            transition_policy = "forward_only"
            [auth]
            admin_usernames = ["Root"]
            "#,
        );

        assert_eq!(
            config.moderation.transition_policy,
            TransitionPolicyKind::ForwardOnly
        );
        assert!(config.auth.is_admin_username("root"));
        assert!(!config.auth.is_admin_username("alice"));
    }
}
