// crates/tollgate-config/src/lib.rs
// ============================================================================
// Module: Tollgate Config
// Description: Canonical configuration model and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tollgate-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Canonical configuration model for the Tollgate platform: server bind and
//! body limits, ledger store settings, tenant storage location, and payment
//! provider credentials. Loading is strict and fail-closed with size and
//! path limits; every section validates itself before the server starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod config;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use config::ConfigError;
pub use config::LedgerStoreConfig;
pub use config::PaymentsConfig;
pub use config::ServerConfig;
pub use config::TenantStorageConfig;
pub use config::TollgateConfig;
