//! HTTP surface: the Cloud API webhook plus operator endpoints.

use std::{collections::HashMap, future::Future, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use shopbot_core::{
    admin,
    config::Config,
    dispatch::InboundQueue,
    domain::{BotState, Style},
    engine::ConversationEngine,
    Error,
};

use crate::webhook::WebhookPayload;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<ConversationEngine>,
    pub inbound: InboundQueue,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, engine: Arc<ConversationEngine>, inbound: InboundQueue) -> Self {
        Self {
            cfg,
            engine,
            inbound,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/send", post(send_message))
        .route("/metrics", get(metrics))
        .route("/catalog", get(catalog))
        .route("/conversation/:phone", get(conversation))
        .route("/conversation/:phone/confirm", post(confirm_order))
        .route("/conversation/:phone/escalate", post(escalate))
        .route("/orders", get(list_orders))
        .route("/orders/:number", get(get_order))
        .route("/orders/:number/status", patch(update_order_status))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `cfg.bind_addr` and serve until `shutdown` resolves.
pub async fn run_server(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&state.cfg.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "http server listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("http server stopped");
    Ok(())
}

// ============================================================
// Webhook
// ============================================================

/// Meta sends `hub.mode` / `hub.verify_token` / `hub.challenge`; the bare
/// names are accepted too.
fn query_param<'a>(q: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    q.get(&format!("hub.{name}"))
        .or_else(|| q.get(name))
        .map(String::as_str)
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let mode = query_param(&q, "mode");
    let token = query_param(&q, "verify_token").or_else(|| query_param(&q, "token"));
    let expected = state.cfg.whatsapp_webhook_token.as_str();

    if mode == Some("subscribe") && !expected.is_empty() && token == Some(expected) {
        info!("webhook verified");
        let challenge = query_param(&q, "challenge").unwrap_or_default().to_string();
        return (StatusCode::OK, challenge).into_response();
    }
    warn!(?mode, "webhook verification failed");
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "malformed webhook payload");
            return AppError::BadRequest(format!("invalid payload: {e}")).into_response();
        }
    };

    for s in payload.statuses() {
        debug!(message_id = %s.id, status = %s.status, "delivery status");
    }

    // Queued before the ack so arrival order is the processing order.
    for msg in payload.inbound() {
        if !state.inbound.enqueue(msg) {
            return AppError::Internal("inbound queue closed".to_string()).into_response();
        }
    }
    Json(json!({ "success": true })).into_response()
}

// ============================================================
// Operator endpoints
// ============================================================

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    to: String,
    #[serde(default, alias = "message")]
    text: String,
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, AppError> {
    if req.to.trim().is_empty() || req.text.trim().is_empty() {
        return Err(AppError::BadRequest(
            "both `to` and `text` are required".to_string(),
        ));
    }
    let sent = state
        .engine
        .gateway()
        .send_text(&req.to, &req.text, false)
        .await;
    Ok(Json(json!({ "success": sent, "to": req.to })))
}

#[derive(Debug, Serialize)]
struct ConversationSummary {
    phone: String,
    customer_name: String,
    state: BotState,
    style: Option<Style>,
    cart_size: usize,
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let engine = &state.engine;
    let m = admin::metrics(engine.conversations(), engine.catalog()).await;
    let active: Vec<ConversationSummary> = engine
        .conversations()
        .list_active()
        .await
        .into_iter()
        .map(|s| ConversationSummary {
            cart_size: s.cart.len(),
            phone: s.phone,
            customer_name: s.customer_name,
            state: s.state,
            style: s.style,
        })
        .collect();
    Json(json!({
        "success": true,
        "metrics": m,
        "active_conversations": active,
    }))
}

async fn catalog(State(state): State<AppState>) -> Json<Value> {
    let products = state.engine.catalog().all();
    Json(json!({
        "success": true,
        "count": products.len(),
        "products": products.as_ref(),
    }))
}

async fn conversation(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Value>, AppError> {
    let view = admin::session_view(state.engine.conversations(), &phone).await?;
    Ok(Json(json!({ "success": true, "conversation": view })))
}

async fn confirm_order(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Value>, AppError> {
    let order = state.engine.confirm_order(&phone).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

async fn escalate(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session = state.engine.escalate(&phone).await?;
    Ok(Json(json!({
        "success": true,
        "conversation": admin::SessionView::from(session),
    })))
}

async fn list_orders(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let store = state.engine.conversations().durable();
    let orders = admin::list_orders(store.as_ref()).await?;
    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}

async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<Value>, AppError> {
    let store = state.engine.conversations().durable();
    let order = admin::get_order(store.as_ref(), &number).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<Value>, AppError> {
    let store = state.engine.conversations().durable();
    let order = admin::update_order_status(store.as_ref(), &number, &req.status).await?;
    info!(order_number = %number, status = ?order.status, "order status updated");
    Ok(Json(json!({ "success": true, "order": order })))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "service": "WhatsApp ordering bot",
        "version": env!("CARGO_PKG_VERSION"),
        "configured": state.engine.gateway().is_configured(),
        "store_name": state.cfg.store_name,
        "catalog_size": state.engine.catalog().len(),
    }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            Error::InvalidState(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                warn!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = Json(ErrorResponse {
            success: false,
            error: message,
        });
        (status, body).into_response()
    }
}
