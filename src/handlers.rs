use crate::assistant::GroundedAssistant;
use crate::badges::get_badges;
use crate::chat_handler;
use crate::db_storage::{CatalogStorage, ChatStorage};
use crate::errors::AppError;
use crate::models::*;
use crate::rate_limiter::RateLimiter;
use crate::scoring::{self, DEFAULT_TOP_N};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

/// Largest `limit` accepted by the matches endpoint.
pub const MAX_MATCHES: usize = 50;

/// Request body cap for API routes (1 MiB).
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Product catalog queries.
    pub catalog: CatalogStorage,
    /// AI chat message log.
    pub chats: ChatStorage,
    /// Grounded chat assistant (inference client + circuit breaker).
    pub assistant: GroundedAssistant,
    /// Token-bucket limiter for the AI endpoint, keyed by user id or client IP.
    pub rate_limiter: RateLimiter,
    /// Products looked up by the AI endpoint, so follow-up questions skip the database.
    pub product_cache: Cache<Uuid, Product>,
}

/// Builds the application router.
///
/// `/health` sits outside the body-size limit; everything else is under `/api/v1`.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/matches", post(top_matches))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/ai/ask", post(chat_handler::ask))
        .route("/api/v1/chat/history", get(chat_handler::chat_history))
        .route("/api/v1/auth/merge-anon", post(chat_handler::merge_anon))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Maps an extractor rejection to the JSON `400` used across the API.
pub fn invalid_request(rejection: impl std::fmt::Display) -> AppError {
    tracing::debug!("Rejected request: {}", rejection);
    AppError::BadRequest("Invalid request".to_string())
}

/// Wraps a product with its badges and optional match score.
pub fn product_card(product: Product, score: Option<f64>) -> ProductCard {
    let badges = get_badges(&product)
        .into_iter()
        .map(str::to_string)
        .collect();
    ProductCard {
        product,
        score,
        badges,
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "loan-compass-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/products
///
/// Filtered, paginated catalog listing. Filters: `bank` (substring,
/// case-insensitive), `type`, `aprMin`, `aprMax`, `minIncome`,
/// `minCreditScore`; pagination via `limit` and `offset`.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ProductQueryParams>, QueryRejection>,
) -> Result<Json<ProductsResponse>, AppError> {
    let Query(params) = params.map_err(invalid_request)?;
    tracing::info!("GET /products - params: {:?}", params);

    let filter = params.into_filter().map_err(AppError::BadRequest)?;
    let (products, total) = state.catalog.list_products(&filter).await?;

    Ok(Json(ProductsResponse {
        products: products
            .into_iter()
            .map(|p| product_card(p, None))
            .collect(),
        total,
    }))
}

/// GET /api/v1/products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProductCard>, AppError> {
    let Path(id) = id.map_err(invalid_request)?;
    tracing::info!("GET /products/{}", id);

    let product = state
        .catalog
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product with id {} not found", id)))?;

    Ok(Json(product_card(product, None)))
}

/// POST /api/v1/products
///
/// Validates and stores a new catalog product.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProductCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductCard>), AppError> {
    let Json(payload) = payload.map_err(invalid_request)?;
    tracing::info!("POST /products - name: {}", payload.name);

    let product = state.catalog.create_product(&payload).await?;

    Ok((StatusCode::CREATED, Json(product_card(product, None))))
}

/// POST /api/v1/products/matches
///
/// Ranks the whole catalog for the supplied borrower profile and returns the
/// best `limit` products (default 5), highest score first.
pub async fn top_matches(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchesResponse>, AppError> {
    let Json(payload) = payload.map_err(invalid_request)?;
    let profile = payload.profile;
    let limit = payload.limit.unwrap_or(DEFAULT_TOP_N);

    if limit == 0 || limit > MAX_MATCHES {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_MATCHES
        )));
    }
    if !profile.income.is_finite() || profile.income < 0.0 {
        return Err(AppError::BadRequest(
            "profile.income must be a non-negative number".to_string(),
        ));
    }

    tracing::info!(
        "POST /products/matches - loan_type: {}, urgency: {}, limit: {}",
        profile.loan_type,
        profile.urgency,
        limit
    );

    let catalog = state.catalog.all_products().await?;
    let matches = scoring::top_matches(&catalog, &profile, limit)
        .into_iter()
        .map(|scored| product_card(scored.product, Some(scored.score)))
        .collect();

    Ok(Json(MatchesResponse { matches }))
}
