// crates/tollgate-config/src/config.rs
// ============================================================================
// Module: Tollgate Configuration
// Description: Configuration loading and validation for Tollgate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tollgate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed to preserve the platform's
//! security posture: payment-provider credentials, the webhook callback URL,
//! and storage locations are all validated before any listener binds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tollgate_store_sqlite::SqliteJournalMode;
use tollgate_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tollgate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "TOLLGATE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default request body limit in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum allowed request body limit in bytes.
const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default payment provider request timeout in milliseconds.
const DEFAULT_PAYMENTS_TIMEOUT_MS: u64 = 10_000;
/// Minimum payment provider request timeout in milliseconds.
const MIN_PAYMENTS_TIMEOUT_MS: u64 = 500;
/// Maximum payment provider request timeout in milliseconds.
const MAX_PAYMENTS_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Messages never embed provider credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file I/O error.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config content failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Tollgate platform configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TollgateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared ledger store configuration.
    pub ledger_store: LedgerStoreConfig,
    /// Tenant namespace storage configuration.
    pub tenant_storage: TenantStorageConfig,
    /// Payment provider configuration.
    pub payments: PaymentsConfig,
}

impl TollgateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: the explicit `path` argument, then the
    /// `TOLLGATE_CONFIG` environment variable, then `tollgate.toml` in the
    /// working directory.
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
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
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
        self.ledger_store.validate()?;
        self.tenant_storage.validate()?;
        self.payments.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Validates server settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address or body limit is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid("server.bind must be a socket address".to_string()));
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes out of range (max {MAX_MAX_BODY_BYTES})"
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Shared ledger store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerStoreConfig {
    /// Path to the ledger `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Read connection pool size.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl LedgerStoreConfig {
    /// Validates ledger store settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path or pool size is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_configured_path(&self.path, "ledger_store.path")?;
        if self.read_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "ledger_store.read_pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tenant namespace storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantStorageConfig {
    /// Directory holding one `SQLite` file per account.
    pub data_dir: PathBuf,
}

impl TenantStorageConfig {
    /// Validates tenant storage settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the data directory path is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_configured_path(&self.data_dir, "tenant_storage.data_dir")
    }
}

/// Payment provider configuration.
///
/// # Invariants
/// - `refresh_token` is a credential and never appears in errors or logs.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Base URL of the payment provider API.
    pub api_url: String,
    /// Refresh token exchanged for short-lived access tokens.
    pub refresh_token: String,
    /// Provider wallet identifier invoices are issued against.
    pub wallet_id: String,
    /// Public base URL the provider calls back with settlement webhooks.
    pub webhook_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_payments_timeout_ms")]
    pub timeout_ms: u64,
    /// Allow cleartext HTTP provider URLs (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
}

impl PaymentsConfig {
    /// Validates payment provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when URLs, credentials, or timeouts are
    /// invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_provider_url(&self.api_url, "payments.api_url", self.allow_http)?;
        validate_provider_url(&self.webhook_url, "payments.webhook_url", self.allow_http)?;
        if self.refresh_token.trim().is_empty() {
            return Err(ConfigError::Invalid("payments.refresh_token must be set".to_string()));
        }
        if self.wallet_id.trim().is_empty() {
            return Err(ConfigError::Invalid("payments.wallet_id must be set".to_string()));
        }
        if !(MIN_PAYMENTS_TIMEOUT_MS ..= MAX_PAYMENTS_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "payments.timeout_ms out of range ({MIN_PAYMENTS_TIMEOUT_MS}..={MAX_PAYMENTS_TIMEOUT_MS})"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default server bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default ledger busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Returns the default ledger read pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Returns the default payment provider timeout.
const fn default_payments_timeout_ms() -> u64 {
    DEFAULT_PAYMENTS_TIMEOUT_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the effective config path from argument, env, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{CONFIG_ENV_VAR} must not be empty")));
        }
        return Ok(PathBuf::from(value));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the config file path for safety limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    validate_configured_path(path, "config path")
}

/// Validates a configured filesystem path for safety limits.
fn validate_configured_path(path: &Path, label: &str) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{label} must not be empty")));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{label} exceeds length limit")));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{label} contains an overlong component")));
        }
    }
    Ok(())
}

/// Validates a provider URL's scheme against the cleartext policy.
fn validate_provider_url(url: &str, label: &str, allow_http: bool) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{label} must be set")));
    }
    if trimmed.starts_with("https://") {
        return Ok(());
    }
    if trimmed.starts_with("http://") {
        if allow_http {
            return Ok(());
        }
        return Err(ConfigError::Invalid(format!("{label} uses http:// without allow_http")));
    }
    Err(ConfigError::Invalid(format!("{label} must include http:// or https://")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
