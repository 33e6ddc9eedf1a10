// crates/tollgate-api/src/telemetry.rs
// ============================================================================
// Module: API Telemetry
// Description: Observability hooks for API request handling.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for API request counters and
//! latency histograms. It is intentionally dependency-light so downstream
//! deployments can plug in Prometheus or OpenTelemetry without redesign.
//! Telemetry must avoid leaking credentials and treats labels as untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for API request histograms.
pub const API_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// API route classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiRoute {
    /// Account create/delete operations.
    Account,
    /// Token create/delete operations.
    Token,
    /// Invoice requests.
    Invoice,
    /// Settlement webhook deliveries.
    Webhook,
    /// Billed raw queries.
    Sql,
    /// Billed resource-instance inserts.
    Resource,
}

impl ApiRoute {
    /// Returns a stable label for the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Token => "token",
            Self::Invoice => "invoice",
            Self::Webhook => "webhook",
            Self::Sql => "sql",
            Self::Resource => "resource",
        }
    }
}

/// API request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiOutcomeLabel {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

/// API request metric event payload.
#[derive(Debug, Clone)]
pub struct ApiMetricEvent {
    /// Route classification.
    pub route: ApiRoute,
    /// Request outcome.
    pub outcome: ApiOutcomeLabel,
    /// HTTP status code.
    pub status: u16,
    /// Request body size in bytes.
    pub request_bytes: u64,
    /// Response body size in bytes.
    pub response_bytes: u64,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for API requests and latencies.
pub trait ApiMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: &ApiMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: &ApiMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl ApiMetrics for NoopMetrics {
    fn record_request(&self, _event: &ApiMetricEvent) {}

    fn record_latency(&self, _event: &ApiMetricEvent, _latency: Duration) {}
}
