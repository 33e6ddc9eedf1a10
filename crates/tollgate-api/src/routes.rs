// crates/tollgate-api/src/routes.rs
// ============================================================================
// Module: API Routes
// Description: Route handlers for accounts, tokens, invoices, and data access.
// Purpose: Wire credential resolution, scope gates, and metering per route.
// Dependencies: axum, tollgate-core, tollgate-payments, tollgate-store-sqlite,
//               serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Each route follows the same shape: resolve the credential, evaluate the
//! route's scope gate, run the operation (behind the usage meter for billed
//! routes), and render a `{code, error}` envelope on failure. Handlers move
//! blocking store and provider work onto the runtime's blocking pool.
//! Authenticated responses carry the balance snapshot header; billed
//! responses carry the post-debit balance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tollgate_core::Account;
use tollgate_core::Invoice;
use tollgate_core::InvoiceStatus;
use tollgate_core::LedgerStore;
use tollgate_core::ResourceName;
use tollgate_core::Scope;
use tollgate_core::ScopeGate;
use tollgate_core::SettlementOutcome;
use tollgate_core::Token;
use tollgate_core::TokenId;
use tollgate_core::secrets;
use tollgate_payments::PaymentProvider;
use tollgate_store_sqlite::TenantStore;

use crate::audit::AccountAuditEvent;
use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::audit::SettlementAuditEvent;
use crate::auth;
use crate::error::ApiError;
use crate::metering::run_billed;
use crate::telemetry::ApiMetricEvent;
use crate::telemetry::ApiMetrics;
use crate::telemetry::ApiOutcomeLabel;
use crate::telemetry::ApiRoute;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response header carrying the balance snapshot in millisatoshis.
pub const BALANCE_HEADER: &str = "x-tollgate-balance";
/// Minimum invoice amount in millisatoshis.
const MIN_INVOICE_MSAT: i64 = 1000;

/// Gate for account creation: anonymous callers or `account/create` tokens.
const CREATE_ACCOUNT_GATE: ScopeGate = ScopeGate::with_anonymous(&[Scope::AccountCreate]);
/// Gate for self-service account deletion: any authenticated scope.
const ANY_SCOPE_GATE: ScopeGate =
    ScopeGate::authenticated(&[Scope::All, Scope::AllReadonly, Scope::AccountCreate]);
/// Gate for full-scope operations.
const FULL_GATE: ScopeGate = ScopeGate::authenticated(&[Scope::All]);
/// Gate for read-only raw queries.
const READONLY_GATE: ScopeGate = ScopeGate::authenticated(&[Scope::AllReadonly]);

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared state behind every route handler.
pub struct AppState {
    /// Shared ledger store.
    pub ledger: Arc<dyn LedgerStore>,
    /// Tenant namespace store.
    pub tenants: TenantStore,
    /// Payment provider client.
    pub payments: Arc<dyn PaymentProvider>,
    /// Audit sink for auth, lifecycle, and settlement events.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics sink for request counters and latencies.
    pub metrics: Arc<dyn ApiMetrics>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the API router with the configured body limit.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/account", post(create_account).delete(delete_account))
        .route("/token", post(create_token).delete(delete_token))
        .route("/invoice", post(create_invoice))
        .route("/webhook", post(webhook))
        .route("/sql", post(raw_query))
        .route("/resource/{resource}", post(create_resource))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Reply Envelope
// ============================================================================

/// Route outcome before rendering into an HTTP response.
#[derive(Debug)]
pub(crate) struct Reply {
    /// HTTP status code.
    pub(crate) status: StatusCode,
    /// JSON body.
    pub(crate) body: Value,
    /// Balance snapshot for the authenticated caller, when resolved.
    pub(crate) balance: Option<i64>,
}

impl Reply {
    /// Builds an error reply from the domain error envelope.
    fn error(error: &ApiError, balance: Option<i64>) -> Self {
        Self {
            status: error.status(),
            body: error.body(),
            balance,
        }
    }

    /// Folds an operation result into a reply.
    fn from_result(result: Result<(StatusCode, Value), ApiError>, balance: Option<i64>) -> Self {
        match result {
            Ok((status, body)) => Self {
                status,
                body,
                balance,
            },
            Err(error) => Self::error(&error, balance),
        }
    }
}

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Token creation request body.
#[derive(Debug, Deserialize)]
struct CreateTokenRequest {
    /// Requested scope wire form.
    scope: String,
}

/// Token deletion request body.
#[derive(Debug, Deserialize)]
struct DeleteTokenRequest {
    /// Identifier of the token to delete.
    id: String,
}

/// Invoice request body.
#[derive(Debug, Deserialize)]
struct CreateInvoiceRequest {
    /// Requested amount in millisatoshis.
    amount_msat: i64,
}

/// Settlement webhook notification body.
#[derive(Debug, Deserialize)]
struct WebhookRequest {
    /// Webhook correlation secret.
    secret: String,
}

/// Raw query request body.
#[derive(Debug, Deserialize)]
struct SqlRequest {
    /// Tenant-authored query text.
    query: String,
    /// Bound query parameters.
    #[serde(default)]
    args: Vec<Value>,
}

/// Resource instance request body.
#[derive(Debug, Deserialize)]
struct CreateResourceRequest {
    /// Opaque document to append.
    instance: Value,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `POST /account`.
async fn create_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Account, &headers, bytes, op_create_account).await
}

/// Handles `DELETE /account`.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Account, &headers, bytes, op_delete_account).await
}

/// Handles `POST /token`.
async fn create_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Token, &headers, bytes, op_create_token).await
}

/// Handles `DELETE /token`.
async fn delete_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Token, &headers, bytes, op_delete_token).await
}

/// Handles `POST /invoice`.
async fn create_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Invoice, &headers, bytes, op_create_invoice).await
}

/// Handles `POST /webhook`.
async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Webhook, &headers, bytes, op_webhook).await
}

/// Handles `POST /sql`.
async fn raw_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    dispatch(state, ApiRoute::Sql, &headers, bytes, op_raw_query).await
}

/// Handles `POST /resource/{resource}`.
async fn create_resource(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let started = Instant::now();
    let request_bytes = byte_len(&bytes);
    let header = auth_header(&headers);
    let worker = Arc::clone(&state);
    let reply = tokio::task::spawn_blocking(move || {
        op_create_resource(&worker, header.as_deref(), &resource, &bytes)
    })
    .await
    .unwrap_or_else(|_| Reply::error(&ApiError::Upstream("worker task failed".to_string()), None));
    finish(&state, ApiRoute::Resource, started, request_bytes, &reply)
}

/// Runs a route operation on the blocking pool and renders the reply.
async fn dispatch(
    state: Arc<AppState>,
    route: ApiRoute,
    headers: &HeaderMap,
    bytes: Bytes,
    op: fn(&AppState, Option<&str>, &[u8]) -> Reply,
) -> Response {
    let started = Instant::now();
    let request_bytes = byte_len(&bytes);
    let header = auth_header(headers);
    let worker = Arc::clone(&state);
    let reply = tokio::task::spawn_blocking(move || op(&worker, header.as_deref(), &bytes))
        .await
        .unwrap_or_else(|_| {
            Reply::error(&ApiError::Upstream("worker task failed".to_string()), None)
        });
    finish(&state, route, started, request_bytes, &reply)
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Creates an account and its root token.
pub(crate) fn op_create_account(state: &AppState, header: Option<&str>, _body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Account, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    let result = (|| {
        auth::authorize(state.audit.as_ref(), ApiRoute::Account, &caller, &CREATE_ACCOUNT_GATE)?;
        let parent = match caller.context() {
            Some(ctx) if ctx.account.parent.is_some() => return Err(ApiError::nesting()),
            Some(ctx) => Some(ctx.account.id.clone()),
            None => None,
        };
        let account = Account {
            id: secrets::new_account_id(),
            balance: 0,
            parent,
        };
        let token = Token {
            id: secrets::new_token_id(),
            account: account.id.clone(),
            value: secrets::new_token_value(),
            scope: Scope::All,
        };
        state.ledger.create_account(&account, &token)?;
        state.audit.record(&AuditEvent::Account(AccountAuditEvent::created(
            account.id.to_string(),
            account.parent.as_ref().map(ToString::to_string),
        )));
        Ok((StatusCode::CREATED, json!({"id": account.id, "token": token.value})))
    })();
    Reply::from_result(result, balance)
}

/// Deletes the caller's account, cascading to children.
pub(crate) fn op_delete_account(state: &AppState, header: Option<&str>, _body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Account, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    let result = (|| {
        auth::authorize(state.audit.as_ref(), ApiRoute::Account, &caller, &ANY_SCOPE_GATE)?;
        let Some(ctx) = caller.context() else {
            return Err(ApiError::Unauthorized);
        };
        let children = state.ledger.list_children(&ctx.account.id)?;
        // Storage removal is best-effort per tenant; one missing or broken
        // artifact must not abort teardown of the rest.
        for child in &children {
            let _ = state.tenants.remove_namespace(child);
            state.ledger.delete_tokens_for(child)?;
        }
        let _ = state.tenants.remove_namespace(&ctx.account.id);
        state.ledger.delete_tokens_for(&ctx.account.id)?;
        state.ledger.delete_children(&ctx.account.id)?;
        state.ledger.delete_account_row(&ctx.account.id)?;
        state.audit.record(&AuditEvent::Account(AccountAuditEvent::deleted(
            ctx.account.id.to_string(),
            children.len(),
        )));
        Ok((StatusCode::NO_CONTENT, json!({})))
    })();
    Reply::from_result(result, balance)
}

/// Creates an additional token for the caller's account.
pub(crate) fn op_create_token(state: &AppState, header: Option<&str>, body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Token, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    let result = (|| {
        auth::authorize(state.audit.as_ref(), ApiRoute::Token, &caller, &FULL_GATE)?;
        let Some(ctx) = caller.context() else {
            return Err(ApiError::Unauthorized);
        };
        let request: CreateTokenRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())?;
        let scope = Scope::parse(&request.scope).ok_or_else(ApiError::invalid_scope)?;
        let token = Token {
            id: secrets::new_token_id(),
            account: ctx.account.id.clone(),
            value: secrets::new_token_value(),
            scope,
        };
        state.ledger.insert_token(&token)?;
        Ok((StatusCode::CREATED, json!({"id": token.id, "token": token.value})))
    })();
    Reply::from_result(result, balance)
}

/// Deletes the requested token after verifying ownership.
pub(crate) fn op_delete_token(state: &AppState, header: Option<&str>, body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Token, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    let result = (|| {
        auth::authorize(state.audit.as_ref(), ApiRoute::Token, &caller, &FULL_GATE)?;
        let Some(ctx) = caller.context() else {
            return Err(ApiError::Unauthorized);
        };
        let request: DeleteTokenRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())?;
        let token_id = TokenId::parse(&request.id).map_err(|_| ApiError::Forbidden)?;
        let Some(token) = state.ledger.load_token(&token_id)? else {
            return Err(ApiError::Forbidden);
        };
        if token.account != ctx.account.id {
            return Err(ApiError::Forbidden);
        }
        // Delete the requested token, not the one that authenticated this
        // call.
        state.ledger.delete_token(&token_id)?;
        Ok((StatusCode::NO_CONTENT, json!({})))
    })();
    Reply::from_result(result, balance)
}

/// Requests a provider invoice and persists it pending.
pub(crate) fn op_create_invoice(state: &AppState, header: Option<&str>, body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Invoice, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    let result = (|| {
        auth::authorize(state.audit.as_ref(), ApiRoute::Invoice, &caller, &FULL_GATE)?;
        let Some(ctx) = caller.context() else {
            return Err(ApiError::Unauthorized);
        };
        let request: CreateInvoiceRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())?;
        if request.amount_msat < MIN_INVOICE_MSAT {
            return Err(ApiError::amount_below_minimum());
        }
        let secret = secrets::new_webhook_secret();
        let provider_invoice = state.payments.create_invoice(request.amount_msat, &secret)?;
        let invoice = Invoice {
            hash: provider_invoice.hash.clone(),
            account: ctx.account.id.clone(),
            bolt11: provider_invoice.bolt11.clone(),
            expires: provider_invoice.expires,
            amount_msat: request.amount_msat,
            secret,
            status: InvoiceStatus::Pending,
        };
        state.ledger.insert_invoice(&invoice)?;
        Ok((
            StatusCode::CREATED,
            json!({
                "hash": provider_invoice.hash,
                "bolt11": provider_invoice.bolt11,
                "expires": provider_invoice.expires,
            }),
        ))
    })();
    Reply::from_result(result, balance)
}

/// Processes an asynchronous settlement notification.
pub(crate) fn op_webhook(state: &AppState, _header: Option<&str>, body: &[u8]) -> Reply {
    // Unknown or malformed notifications return success with no mutation;
    // possession of a matching secret is the sole proof of authenticity.
    let Ok(request) = serde_json::from_slice::<WebhookRequest>(body) else {
        return Reply {
            status: StatusCode::OK,
            body: json!({}),
            balance: None,
        };
    };
    match state.ledger.settle_invoice(&request.secret) {
        Ok(outcome) => {
            let event = match outcome {
                SettlementOutcome::Credited {
                    account,
                    amount_msat,
                } => SettlementAuditEvent::credited(account.to_string(), amount_msat),
                SettlementOutcome::AlreadySettled => SettlementAuditEvent::already_settled(),
                SettlementOutcome::UnknownSecret => SettlementAuditEvent::unknown_secret(),
            };
            state.audit.record(&AuditEvent::Settlement(event));
            Reply {
                status: StatusCode::OK,
                body: json!({}),
                balance: None,
            }
        }
        Err(err) => Reply::error(&ApiError::from(err), None),
    }
}

/// Executes a billed raw query against the caller's namespace.
pub(crate) fn op_raw_query(state: &AppState, header: Option<&str>, body: &[u8]) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Sql, header) {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    if let Err(err) = auth::authorize(state.audit.as_ref(), ApiRoute::Sql, &caller, &READONLY_GATE)
    {
        return Reply::error(&err, balance);
    }
    let Some(ctx) = caller.context() else {
        return Reply::error(&ApiError::Unauthorized, balance);
    };
    let billed = run_billed(state.ledger.as_ref(), &ctx.account, byte_len(body), || {
        let request: SqlRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())?;
        let rows = state.tenants.raw_query(&ctx.account.id, &request.query, &request.args)?;
        Ok((StatusCode::OK, json!({"data": rows})))
    });
    match billed {
        Ok(reply) => Reply {
            status: reply.status,
            body: reply.body,
            balance: Some(reply.balance_msat),
        },
        Err(err) => Reply::error(&err, balance),
    }
}

/// Appends a billed resource instance in the caller's namespace.
pub(crate) fn op_create_resource(
    state: &AppState,
    header: Option<&str>,
    resource: &str,
    body: &[u8],
) -> Reply {
    let caller = match auth::resolve(state.ledger.as_ref(), state.audit.as_ref(), ApiRoute::Resource, header)
    {
        Ok(caller) => caller,
        Err(err) => return Reply::error(&err, None),
    };
    let balance = caller.balance();
    if let Err(err) =
        auth::authorize(state.audit.as_ref(), ApiRoute::Resource, &caller, &FULL_GATE)
    {
        return Reply::error(&err, balance);
    }
    let Some(ctx) = caller.context() else {
        return Reply::error(&ApiError::Unauthorized, balance);
    };
    let billed = run_billed(state.ledger.as_ref(), &ctx.account, byte_len(body), || {
        let name = ResourceName::parse(resource).map_err(|_| ApiError::resource_name())?;
        let request: CreateResourceRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())?;
        state.tenants.ensure_resource(&ctx.account.id, &name)?;
        let id = state.tenants.insert_resource(&ctx.account.id, &name, &request.instance)?;
        Ok((StatusCode::OK, json!({"id": id})))
    });
    match billed {
        Ok(reply) => Reply {
            status: reply.status,
            body: reply.body,
            balance: Some(reply.balance_msat),
        },
        Err(err) => Reply::error(&err, balance),
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a reply and records request metrics.
fn finish(
    state: &AppState,
    route: ApiRoute,
    started: Instant,
    request_bytes: u64,
    reply: &Reply,
) -> Response {
    let (response, response_bytes) = render(reply);
    let outcome = if reply.status.is_client_error() || reply.status.is_server_error() {
        ApiOutcomeLabel::Error
    } else {
        ApiOutcomeLabel::Ok
    };
    let event = ApiMetricEvent {
        route,
        outcome,
        status: reply.status.as_u16(),
        request_bytes,
        response_bytes,
    };
    state.metrics.record_request(&event);
    state.metrics.record_latency(&event, started.elapsed());
    response
}

/// Renders a reply into an HTTP response, returning the body size.
fn render(reply: &Reply) -> (Response, u64) {
    let payload = if reply.status == StatusCode::NO_CONTENT {
        Vec::new()
    } else {
        reply.body.to_string().into_bytes()
    };
    let response_bytes = byte_len(&payload);
    let mut builder = Response::builder()
        .status(reply.status)
        .header(CONTENT_TYPE, "application/json");
    if let Some(balance) = reply.balance {
        builder = builder.header(BALANCE_HEADER, balance.to_string());
    }
    match builder.body(Body::from(payload)) {
        Ok(response) => (response, response_bytes),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR.into_response(), 0),
    }
}

/// Returns the Authorization header value when it is valid UTF-8.
fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Returns a byte slice length as `u64`.
fn byte_len(bytes: &[u8]) -> u64 {
    u64::try_from(bytes.len()).unwrap_or(u64::MAX)
}
