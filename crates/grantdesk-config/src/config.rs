// grantdesk-config/src/config.rs
// ============================================================================
// Module: Grantdesk Configuration
// Description: Configuration loading and validation for Grantdesk.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: grantdesk-core, grantdesk-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed; defaults are
//! conservative and every limit has a hard ceiling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use grantdesk_core::MAX_DOCUMENT_BYTES;
use grantdesk_store_sqlite::SqliteJournalMode;
use grantdesk_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "grantdesk.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "GRANTDESK_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body: the document ceiling plus multipart slack.
const DEFAULT_MAX_BODY_BYTES: usize = MAX_DOCUMENT_BYTES + 64 * 1024;
/// Maximum allowed request body size in bytes.
const MAX_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
/// Default SQLite busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum SQLite busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Default session lifetime: 24 hours.
const DEFAULT_SESSION_TTL_MS: u64 = 24 * 60 * 60 * 1_000;
/// Default password-reset lifetime: 1 hour.
const DEFAULT_RESET_TTL_MS: u64 = 60 * 60 * 1_000;
/// Minimum allowed credential lifetime in milliseconds.
const MIN_TTL_MS: u64 = 60 * 1_000;
/// Maximum allowed session lifetime: 30 days.
const MAX_SESSION_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1_000;
/// Maximum allowed password-reset lifetime: 24 hours.
const MAX_RESET_TTL_MS: u64 = 24 * 60 * 60 * 1_000;
/// Default notification queue capacity.
const DEFAULT_QUEUE_CAPACITY: usize = 1_024;
/// Maximum notification queue capacity.
const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Default document storage directory.
const DEFAULT_DOCUMENT_ROOT: &str = "documents";
/// Default public base path for serving documents.
const DEFAULT_DOCUMENT_BASE_URL: &str = "/documents";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Grantdesk portal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantdeskConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Document storage configuration.
    #[serde(default)]
    pub documents: DocumentsConfig,
    /// Session and password-reset configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Notification delivery configuration.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Optional config source metadata (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl Default for GrantdeskConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            documents: DocumentsConfig::default(),
            auth: AuthConfig::default(),
            notify: NotifyConfig::default(),
            source_modified_at: None,
        }
    }
}

impl GrantdeskConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then `GRANTDESK_CONFIG`, then `grantdesk.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.documents.validate()?;
        self.auth.validate()?;
        self.notify.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, `host:port`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates bind address and body limits.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes < MAX_DOCUMENT_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be at least {MAX_DOCUMENT_BYTES} to admit documents"
            )));
        }
        if self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must not exceed {MAX_MAX_BODY_BYTES}"
            )));
        }
        Ok(())
    }

    /// Parses the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }
}

/// SQLite database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path.
    #[serde(default = "default_database_path")]
    pub path: String,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// SQLite synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Validates database path and timeout limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("database.path", &self.path)?;
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "database.busy_timeout_ms must not exceed {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Document storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Directory that receives uploaded documents.
    #[serde(default = "default_document_root")]
    pub root: String,
    /// Public base path under which documents are served.
    #[serde(default = "default_document_base_url")]
    pub public_base_url: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_document_root(),
            public_base_url: default_document_base_url(),
        }
    }
}

impl DocumentsConfig {
    /// Validates storage directory and public base path.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("documents.root", &self.root)?;
        let base = self.public_base_url.trim();
        if !base.starts_with('/') {
            return Err(ConfigError::Invalid(
                "documents.public_base_url must start with '/'".to_string(),
            ));
        }
        if base.len() > 1 && base.ends_with('/') {
            return Err(ConfigError::Invalid(
                "documents.public_base_url must not end with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session and password-reset configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in milliseconds.
    #[serde(default = "default_session_ttl_ms")]
    pub session_ttl_ms: u64,
    /// Password-reset token lifetime in milliseconds.
    #[serde(default = "default_reset_ttl_ms")]
    pub reset_ttl_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_ms: default_session_ttl_ms(),
            reset_ttl_ms: default_reset_ttl_ms(),
        }
    }
}

impl AuthConfig {
    /// Validates credential lifetimes against hard bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TTL_MS..=MAX_SESSION_TTL_MS).contains(&self.session_ttl_ms) {
            return Err(ConfigError::Invalid(format!(
                "auth.session_ttl_ms must be between {MIN_TTL_MS} and {MAX_SESSION_TTL_MS}"
            )));
        }
        if !(MIN_TTL_MS..=MAX_RESET_TTL_MS).contains(&self.reset_ttl_ms) {
            return Err(ConfigError::Invalid(format!(
                "auth.reset_ttl_ms must be between {MIN_TTL_MS} and {MAX_RESET_TTL_MS}"
            )));
        }
        Ok(())
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Bounded queue capacity between the write path and the worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl NotifyConfig {
    /// Validates queue capacity against hard bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "notify.queue_capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default database path.
fn default_database_path() -> String {
    "grantdesk.db".to_string()
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default document root directory.
fn default_document_root() -> String {
    DEFAULT_DOCUMENT_ROOT.to_string()
}

/// Default document public base path.
fn default_document_base_url() -> String {
    DEFAULT_DOCUMENT_BASE_URL.to_string()
}

/// Default session lifetime.
const fn default_session_ttl_ms() -> u64 {
    DEFAULT_SESSION_TTL_MS
}

/// Default password-reset lifetime.
const fn default_reset_ttl_ms() -> u64 {
    DEFAULT_RESET_TTL_MS
}

/// Default notification queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_validate() {
        let config = GrantdeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.auth.session_ttl_ms, 24 * 60 * 60 * 1_000);
        assert_eq!(config.auth.reset_ttl_ms, 60 * 60 * 1_000);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: GrantdeskConfig = toml::from_str("").expect("parse");
        assert!(config.validate().is_ok());
        assert_eq!(config.database.path, "grantdesk.db");
        assert_eq!(config.documents.root, "documents");
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let config: GrantdeskConfig =
            toml::from_str("[server]\nbind = \"not-an-address\"").expect("parse");
        let err = config.validate().expect_err("invalid bind");
        assert!(err.to_string().contains("server.bind"));
    }

    #[test]
    fn body_limit_must_admit_documents() {
        let config: GrantdeskConfig =
            toml::from_str("[server]\nmax_body_bytes = 1024").expect("parse");
        let err = config.validate().expect_err("too small");
        assert!(err.to_string().contains("max_body_bytes"));
    }

    #[test]
    fn ttl_bounds_are_enforced() {
        let config: GrantdeskConfig =
            toml::from_str("[auth]\nsession_ttl_ms = 1").expect("parse");
        assert!(config.validate().is_err());

        let config: GrantdeskConfig =
            toml::from_str("[auth]\nreset_ttl_ms = 999999999999").expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn queue_capacity_must_be_nonzero() {
        let config: GrantdeskConfig =
            toml::from_str("[notify]\nqueue_capacity = 0").expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn document_base_url_shape_is_enforced() {
        let config: GrantdeskConfig =
            toml::from_str("[documents]\npublic_base_url = \"documents\"").expect("parse");
        assert!(config.validate().is_err());

        let config: GrantdeskConfig =
            toml::from_str("[documents]\npublic_base_url = \"/documents/\"").expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("grantdesk.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(crate::examples::config_toml_example().as_bytes()).expect("write");
        drop(file);

        let config = GrantdeskConfig::load(Some(&path)).expect("load");
        assert!(config.source_modified_at.is_some());
        assert!(config.server.max_body_bytes >= MAX_DOCUMENT_BYTES);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("grantdesk.toml");
        std::fs::write(&path, "[server\nbind = 12").expect("write");
        let err = GrantdeskConfig::load(Some(&path)).expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn load_reports_missing_files_as_io() {
        let err = GrantdeskConfig::load(Some(Path::new("/definitely/not/here.toml")))
            .expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)), "{err}");
    }

    #[test]
    fn path_strings_are_bounded() {
        assert!(validate_path_string("test_path", "./documents").is_ok());
        assert!(validate_path_string("test_path", "").is_err());
        assert!(validate_path_string("test_path", "   ").is_err());
        let long = "x".repeat(MAX_TOTAL_PATH_LENGTH + 1);
        assert!(validate_path_string("test_path", &long).is_err());
    }
}
