// crates/tollgate-payments/src/client.rs
// ============================================================================
// Module: Payment Provider Client
// Description: Blocking HTTP client for the Lightning payment provider.
// Purpose: Issue invoices with webhook registration under strict limits.
// Dependencies: reqwest, serde, url
// ============================================================================

//! ## Overview
//! The HTTP payment provider issues bounded POST requests against the
//! provider API. Authentication exchanges a long-lived refresh token for a
//! short-lived access token, cached in memory and discarded on the first
//! authorization failure. Redirects are not followed and cleartext URLs
//! require explicit opt-in. A provider failure aborts invoice creation;
//! there is no retry or background queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Provider path for the refresh-token exchange.
const REFRESH_PATH: &str = "auth/refresh-access-token";
/// Provider path for invoice creation with webhook registration.
const INVOICE_PATH: &str = "invoice/rest/webhook";
/// User agent for outbound provider requests.
const USER_AGENT: &str = "tollgate/0.1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Payment provider errors.
///
/// # Invariants
/// - Messages never embed tokens or webhook secrets.
#[derive(Debug, Error, Clone)]
pub enum PaymentError {
    /// Provider configuration is invalid.
    #[error("payment provider config invalid: {0}")]
    Config(String),
    /// The outbound request failed or returned a non-success status.
    #[error("payment provider request failed: {0}")]
    Request(String),
    /// The provider response could not be interpreted.
    #[error("payment provider response invalid: {0}")]
    Protocol(String),
    /// The provider rejected the platform's credentials.
    #[error("payment provider authentication failed: {0}")]
    Auth(String),
}

// ============================================================================
// SECTION: Provider Seam
// ============================================================================

/// Invoice fields returned by the payment provider.
///
/// # Invariants
/// - `bolt11` is passed through to the caller unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInvoice {
    /// Provider-assigned payment hash.
    pub hash: String,
    /// BOLT11 payment request string.
    pub bolt11: String,
    /// Expiry timestamp in unix seconds.
    pub expires: i64,
}

/// Invoice-issuing capability of the external payment provider.
pub trait PaymentProvider: Send + Sync {
    /// Requests an invoice and registers the webhook secret with it.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] when the provider call fails; the caller
    /// must abort invoice creation in that case.
    fn create_invoice(
        &self,
        amount_msat: i64,
        webhook_secret: &str,
    ) -> Result<ProviderInvoice, PaymentError>;
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP payment provider.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone)]
pub struct PaymentProviderConfig {
    /// Base URL of the provider API.
    pub api_url: String,
    /// Refresh token exchanged for access tokens.
    pub refresh_token: String,
    /// Provider wallet identifier invoices are issued against.
    pub wallet_id: String,
    /// Public URL the provider calls back with settlements.
    pub webhook_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Refresh-token exchange request payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    /// Long-lived refresh token.
    refresh_token: &'a str,
}

/// Refresh-token exchange response payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    /// Short-lived access token.
    access_token: String,
}

/// Invoice creation request payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceRequest<'a> {
    /// Provider wallet identifier.
    wallet_id: &'a str,
    /// Invoiced amount in millisatoshis.
    amount_msat: i64,
    /// Webhook callback URL.
    webhook_url: &'a str,
    /// Webhook correlation secret.
    webhook_secret: &'a str,
}

/// Invoice creation response payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceResponse {
    /// Provider-assigned payment hash.
    hash: String,
    /// BOLT11 payment request string.
    bolt11: String,
    /// Expiry timestamp in unix seconds.
    expiration_utc: i64,
}

// ============================================================================
// SECTION: Provider Implementation
// ============================================================================

/// Blocking HTTP implementation of the payment provider seam.
///
/// # Invariants
/// - Redirects are not followed.
/// - The cached access token is dropped on the first authorization failure.
pub struct HttpPaymentProvider {
    /// Provider configuration, including limits and policy.
    config: PaymentProviderConfig,
    /// HTTP client used for outbound requests.
    client: Client,
    /// Cached short-lived access token.
    access_token: Mutex<Option<String>>,
}

impl HttpPaymentProvider {
    /// Creates a new provider client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] when the URLs are invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: PaymentProviderConfig) -> Result<Self, PaymentError> {
        validate_url(&config.api_url, config.allow_http)?;
        validate_url(&config.webhook_url, config.allow_http)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|_| PaymentError::Config("http client construction failed".to_string()))?;
        Ok(Self {
            config,
            client,
            access_token: Mutex::new(None),
        })
    }

    /// Returns the cached access token, exchanging the refresh token when
    /// no token is cached.
    fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self
            .access_token
            .lock()
            .map_err(|_| PaymentError::Request("access token mutex poisoned".to_string()))?;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let response = self
            .client
            .post(endpoint(&self.config.api_url, REFRESH_PATH)?)
            .json(&RefreshRequest {
                refresh_token: &self.config.refresh_token,
            })
            .send()
            .map_err(|_| PaymentError::Request("refresh-token exchange failed".to_string()))?;
        if !response.status().is_success() {
            return Err(PaymentError::Auth(format!(
                "refresh-token exchange returned status {}",
                response.status().as_u16()
            )));
        }
        let payload: RefreshResponse = response
            .json()
            .map_err(|_| PaymentError::Protocol("refresh response is not valid json".to_string()))?;
        if payload.access_token.is_empty() {
            return Err(PaymentError::Protocol("refresh response missing token".to_string()));
        }
        *cached = Some(payload.access_token.clone());
        Ok(payload.access_token)
    }

    /// Drops the cached access token after an authorization failure.
    fn invalidate_access_token(&self) {
        if let Ok(mut cached) = self.access_token.lock() {
            *cached = None;
        }
    }
}

impl PaymentProvider for HttpPaymentProvider {
    fn create_invoice(
        &self,
        amount_msat: i64,
        webhook_secret: &str,
    ) -> Result<ProviderInvoice, PaymentError> {
        let token = self.access_token()?;
        let response = self
            .client
            .post(endpoint(&self.config.api_url, INVOICE_PATH)?)
            .header("Authorization", token)
            .json(&InvoiceRequest {
                wallet_id: &self.config.wallet_id,
                amount_msat,
                webhook_url: &self.config.webhook_url,
                webhook_secret,
            })
            .send()
            .map_err(|_| PaymentError::Request("invoice request failed".to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.invalidate_access_token();
            return Err(PaymentError::Auth(format!(
                "invoice request returned status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(PaymentError::Request(format!(
                "invoice request returned status {}",
                status.as_u16()
            )));
        }
        let payload: InvoiceResponse = response
            .json()
            .map_err(|_| PaymentError::Protocol("invoice response is not valid json".to_string()))?;
        if payload.hash.is_empty() || payload.bolt11.is_empty() {
            return Err(PaymentError::Protocol("invoice response missing fields".to_string()));
        }
        Ok(ProviderInvoice {
            hash: payload.hash,
            bolt11: payload.bolt11,
            expires: payload.expiration_utc,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins the provider base URL with an endpoint path.
fn endpoint(base: &str, path: &str) -> Result<Url, PaymentError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|_| PaymentError::Config("provider url invalid".to_string()))
}

/// Validates a provider URL's scheme against the cleartext policy.
fn validate_url(raw: &str, allow_http: bool) -> Result<(), PaymentError> {
    let url =
        Url::parse(raw).map_err(|_| PaymentError::Config("provider url invalid".to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        _ => return Err(PaymentError::Config("unsupported provider url scheme".to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(PaymentError::Config("provider url must not embed credentials".to_string()));
    }
    Ok(())
}
