use crate::errors::{AppError, ResultExt};
use crate::handlers::{invalid_request, AppState};
use crate::models::{
    AskRequest, AskResponse, ChatHistoryQuery, ChatHistoryResponse, ChatMessage, ChatRole,
    MergeAnonRequest, NewChatMessage, Product, StoredChatMessage,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::HeaderMap,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the authenticated user id, set by the identity proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id from the `X-User-Id` header, if present.
pub fn caller_user_id(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = raw
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid X-User-Id header".to_string()))?
        .trim();
    if value.is_empty() {
        return Ok(None);
    }

    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| AppError::BadRequest("X-User-Id must be a UUID".to_string()))
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

/// Loads a product through the product cache.
async fn load_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    if let Some(product) = state.product_cache.get(&id).await {
        tracing::debug!("Product cache HIT: {}", id);
        return Ok(product);
    }

    tracing::debug!("Product cache MISS: {}", id);
    let product = state
        .catalog
        .get_product(id)
        .await
        .context("loading product for chat")?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    state.product_cache.insert(id, product.clone()).await;
    Ok(product)
}

/// POST /api/v1/ai/ask
///
/// Answers a question about one product using only that product's data.
///
/// Flow:
/// 1. Rate limit by user id (or client IP for anonymous callers)
/// 2. Validate the body
/// 3. Load the product (cached)
/// 4. Ask the grounded assistant (falls back on upstream failure)
/// 5. Persist the user and assistant messages (best effort)
pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    // 1. Rate limit before any expensive work
    let user_id = caller_user_id(&headers)?;
    let ip = client_ip(&headers);
    let key = user_id.map(|id| id.to_string()).unwrap_or_else(|| ip.clone());

    if !state.rate_limiter.allow(&key) {
        return Err(AppError::RateLimited(key));
    }

    // 2. Validate request body
    let Json(request) = payload.map_err(invalid_request)?;

    if request.message.trim().is_empty() {
        return Err(AppError::BadRequest("Invalid request".to_string()));
    }

    tracing::info!(
        "POST /ai/ask - product: {}, history: {} turn(s)",
        request.product_id,
        request.history.len()
    );

    // 3. Load product
    let product = load_product(&state, request.product_id).await?;

    // 4. Grounded answer
    let response = state
        .assistant
        .ask(&product, &request.message, &request.history)
        .await;

    // 5. Persist both sides of the exchange; a storage failure must not lose the answer
    let anon_id = request.anon_id.filter(|a| !a.trim().is_empty());
    let rows = [
        NewChatMessage {
            user_id,
            anon_id: anon_id.clone(),
            product_id: product.id,
            role: ChatRole::User,
            content: request.message,
            ip_address: ip.clone(),
        },
        NewChatMessage {
            user_id,
            anon_id,
            product_id: product.id,
            role: ChatRole::Assistant,
            content: response.answer.clone(),
            ip_address: ip,
        },
    ];
    if let Err(e) = state.chats.insert_messages(&rows).await {
        tracing::error!("Failed to save chat history: {}", e);
    }

    Ok(Json(response))
}

fn into_messages(rows: Vec<StoredChatMessage>) -> Vec<ChatMessage> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match ChatMessage::try_from(row) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    tracing::warn!("Skipping chat message {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// GET /api/v1/chat/history?productId=...&anonId=...
///
/// Authenticated callers get their own messages for the product; anonymous
/// callers get messages stored under `anonId`. Oldest first.
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ChatHistoryQuery>, QueryRejection>,
) -> Result<Json<ChatHistoryResponse>, AppError> {
    let Query(params) = params.map_err(invalid_request)?;
    let product_id = params
        .product_id
        .ok_or_else(|| AppError::BadRequest("productId required".to_string()))?;

    if let Some(user_id) = caller_user_id(&headers)? {
        let rows = state.chats.history_for_user(user_id, product_id).await?;
        return Ok(Json(ChatHistoryResponse {
            messages: into_messages(rows),
        }));
    }

    if let Some(anon_id) = params.anon_id.filter(|a| !a.trim().is_empty()) {
        let rows = state.chats.history_for_anon(&anon_id, product_id).await?;
        return Ok(Json(ChatHistoryResponse {
            messages: into_messages(rows),
        }));
    }

    Ok(Json(ChatHistoryResponse {
        messages: Vec::new(),
    }))
}

/// POST /api/v1/auth/merge-anon
///
/// Moves messages written under an anonymous id to the signed-in user.
pub async fn merge_anon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<MergeAnonRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = caller_user_id(&headers)?
        .ok_or_else(|| AppError::Unauthorized("merge-anon without user session".to_string()))?;

    let anon_id = payload
        .ok()
        .and_then(|Json(body)| body.anon_id)
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("anonId required".to_string()))?;

    let merged = state.chats.merge_anon(&anon_id, user_id).await?;
    tracing::info!("Merged {} anonymous message(s) into user {}", merged, user_id);

    Ok(Json(json!({ "ok": true })))
}
