// crates/tollgate-api/src/server.rs
// ============================================================================
// Module: API Server
// Description: Server assembly and HTTP serving for the Tollgate API.
// Purpose: Wire stores, provider, and sinks from configuration and serve.
// Dependencies: axum, tollgate-config, tollgate-payments, tollgate-store-sqlite,
//               thiserror, tokio
// ============================================================================

//! ## Overview
//! The API server builds the application state from validated configuration:
//! the SQLite ledger store, the tenant namespace store, the payment provider
//! client, and the audit and metrics sinks. Serving binds a TCP listener and
//! runs the axum router until the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tollgate_config::TollgateConfig;
use tollgate_core::LedgerStore;
use tollgate_payments::HttpPaymentProvider;
use tollgate_payments::PaymentProviderConfig;
use tollgate_store_sqlite::SqliteLedgerConfig;
use tollgate_store_sqlite::SqliteLedgerStore;
use tollgate_store_sqlite::TenantStore;
use tollgate_store_sqlite::TenantStoreConfig;

use crate::audit::StderrAuditSink;
use crate::routes::AppState;
use crate::routes::router;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API server lifecycle errors.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(String),
    /// A component failed to initialize.
    #[error("init error: {0}")]
    Init(String),
    /// The HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Tollgate API server instance.
pub struct ApiServer {
    /// Validated platform configuration.
    config: TollgateConfig,
    /// Shared application state behind the router.
    state: Arc<AppState>,
}

impl ApiServer {
    /// Builds a new API server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when validation or initialization fails.
    pub fn from_config(config: TollgateConfig) -> Result<Self, ApiServerError> {
        config.validate().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let ledger = SqliteLedgerStore::new(&SqliteLedgerConfig {
            path: config.ledger_store.path.clone(),
            busy_timeout_ms: config.ledger_store.busy_timeout_ms,
            journal_mode: config.ledger_store.journal_mode,
            sync_mode: config.ledger_store.sync_mode,
            read_pool_size: config.ledger_store.read_pool_size,
        })
        .map_err(|err| ApiServerError::Init(err.to_string()))?;
        ledger.readiness().map_err(|err| ApiServerError::Init(err.to_string()))?;
        let tenants = TenantStore::new(&TenantStoreConfig {
            data_dir: config.tenant_storage.data_dir.clone(),
        })
        .map_err(|err| ApiServerError::Init(err.to_string()))?;
        let payments = HttpPaymentProvider::new(PaymentProviderConfig {
            api_url: config.payments.api_url.clone(),
            refresh_token: config.payments.refresh_token.clone(),
            wallet_id: config.payments.wallet_id.clone(),
            webhook_url: config.payments.webhook_url.clone(),
            timeout_ms: config.payments.timeout_ms,
            allow_http: config.payments.allow_http,
        })
        .map_err(|err| ApiServerError::Init(err.to_string()))?;
        let state = Arc::new(AppState {
            ledger: Arc::new(ledger),
            tenants,
            payments: Arc::new(payments),
            audit: Arc::new(StderrAuditSink),
            metrics: Arc::new(NoopMetrics),
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves the API until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .map_err(|_| ApiServerError::Config("invalid bind address".to_string()))?;
        let app = router(Arc::clone(&self.state), self.config.server.max_body_bytes);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ApiServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| ApiServerError::Transport("http server failed".to_string()))
    }
}
