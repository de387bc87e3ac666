//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the ledger node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                     |
//! |--------|----------------------------|---------------------------------|
//! | GET    | `/health`                  | Liveness probe                  |
//! | GET    | `/status`                  | Token metadata and flags        |
//! | POST   | `/rpc`                     | JSON-RPC 2.0 gateway            |
//! | GET    | `/ws`                      | WebSocket for live ledger events|
//! | GET    | `/accounts/:address`       | Balances and tag of one account |
//! | GET    | `/accounts/:address/locks` | Lock state of one account       |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use hena_token::clock::Clock;
use hena_token::events::TokenEvent;
use hena_token::service::TokenService;
use hena_token::types::Address;

use crate::metrics::SharedMetrics;
use crate::rpc::{self, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Params, RpcFailure};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The hosted ledger. Every state-changing call holds the write lock
    /// from validation through event recording.
    pub service: Arc<RwLock<TokenService>>,
    /// Source of the per-call instant.
    pub clock: Arc<dyn Clock>,
    /// Broadcast channel for live ledger events.
    pub event_tx: broadcast::Sender<TokenEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/accounts/:address/locks", get(account_locks_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Smallest-denomination supply, as a decimal string.
    pub total_supply: String,
    pub owner: String,
    pub manager: String,
    pub transfer_paused: bool,
    pub owner_transfer_available: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    /// Full balance.
    pub balance: String,
    /// Spendable right now.
    pub available: String,
    /// Restricted right now.
    pub locked: String,
    /// Whether the total-lock override is set.
    pub total_locked: bool,
    pub tag: String,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_address(err: impl std::fmt::Display) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: Returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: Token metadata and global flags.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.read().await;
    Json(StatusResponse {
        version: state.version.clone(),
        name: service.name().to_string(),
        symbol: service.symbol().to_string(),
        decimals: service.decimals(),
        total_supply: service.total_supply().to_string(),
        owner: service.owner().to_string(),
        manager: service.manager().to_string(),
        transfer_paused: service.is_transfer_paused(),
        owner_transfer_available: service.is_owner_transfer_available(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Read-only methods run under the read lock. Everything else needs a
/// `caller` parameter and runs under the write lock.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::failure(
            req.id,
            JsonRpcError {
                code: rpc::INVALID_REQUEST,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            },
        ));
    }

    let started = Instant::now();
    let outcome = execute(&state, &req).await;
    state
        .metrics
        .operation_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => Json(JsonRpcResponse::success(req.id, result)),
        Err(failure) => {
            if let RpcFailure::Token(err) = &failure {
                tracing::debug!(method = %req.method, error = %err, "rpc call rejected");
                let kind = format!("{:?}", err.kind());
                state
                    .metrics
                    .failed_operations_total
                    .with_label_values(&[kind.as_str()])
                    .inc();
            }
            Json(JsonRpcResponse::failure(req.id, failure.into()))
        }
    }
}

async fn execute(state: &AppState, req: &JsonRpcRequest) -> Result<serde_json::Value, RpcFailure> {
    let empty = serde_json::Map::new();
    let params = Params::new(req.params.as_ref(), &empty)?;
    let now = state.clock.now();

    {
        let service = state.service.read().await;
        if let Some(result) = rpc::query(&service, &req.method, &params, now) {
            return result;
        }
    }

    if !rpc::is_command(&req.method) {
        return Err(RpcFailure::MethodNotFound(req.method.clone()));
    }
    let ctx = state.clock.context(params.address("caller")?);
    let mut service = state.service.write().await;
    let result = rpc::command(&mut service, &req.method, &params, &ctx)?;
    state
        .metrics
        .set_total_supply(service.total_supply(), service.decimals());
    Ok(result)
}

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`TokenEvent`] messages. The connection is
/// push-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

/// `GET /accounts/:address`: Balance breakdown at the current instant.
///
/// Unknown addresses report zero balances.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let address = match Address::new(address) {
        Ok(a) => a,
        Err(e) => return bad_address(e),
    };
    let now = state.clock.now();
    let service = state.service.read().await;

    Json(AccountResponse {
        balance: service.balance_of(&address).to_string(),
        available: service.available_balance_of(&address, now).to_string(),
        locked: service.locked_balance_of(&address, now).to_string(),
        total_locked: service.is_total_locked(&address),
        tag: service.tag(&address).to_string(),
        address: address.to_string(),
    })
    .into_response()
}

/// `GET /accounts/:address/locks`: Override flag, tag and every lock entry.
async fn account_locks_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let address = match Address::new(address) {
        Ok(a) => a,
        Err(e) => return bad_address(e),
    };
    let service = state.service.read().await;
    Json(service.lock_state(&address)).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
