//! HTTP API over the search service

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use crate::filter::{Filter, SearchParams};
use crate::models::{Lease, Manager, NewLease, NewManager, NewProperty, Property, PropertyUpdate, StatusUpdate};
use crate::search::SearchService;
use crate::store::StoreError;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
}

impl AppState {
    pub fn new(service: SearchService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Invalid(_) => ApiError::BadRequest(err.to_string()),
            StoreError::Conflict(_) => ApiError::Conflict(err.to_string()),
            other => {
                log::error!("Request failed: {}", other);
                ApiError::Internal(format!("Error retrieving properties: {}", other))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Worker task failed: {}", err))
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run store work off the async executor
async fn blocking<T, F>(service: &Arc<SearchService>, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&SearchService) -> std::result::Result<T, StoreError> + Send + 'static,
{
    let service = Arc::clone(service);
    let result = tokio::task::spawn_blocking(move || work(service.as_ref())).await?;
    Ok(result?)
}

fn property_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Property {} not found", id))
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/properties", get(search_properties).post(create_property))
        .route(
            "/properties/:id",
            get(get_property).put(update_property).delete(disable_property),
        )
        .route("/managers", post(create_manager))
        .route("/managers/:id/status", put(set_manager_status))
        .route("/leases", post(create_lease))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn search_properties(
    State(state): State<AppState>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Response> {
    // Raw pairs so a repeated key keeps its first value instead of failing
    let Query(pairs) = query?;
    let params = SearchParams::from_pairs(pairs);
    let filter = Filter::from_params(&params, state.service.config());
    log::debug!("GET /properties {:?}", filter);

    let outcome = blocking(&state.service, move |service| service.search(&filter)).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", outcome.ttl.as_secs()),
        ),
        (X_CACHE, if outcome.cache_hit { "HIT" } else { "MISS" }.to_string()),
    ];

    Ok((StatusCode::OK, headers, outcome.body).into_response())
}

async fn get_property(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Property>> {
    blocking(&state.service, move |service| service.get_property(id))
        .await?
        .map(Json)
        .ok_or_else(|| property_not_found(id))
}

async fn create_property(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewProperty>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Property>)> {
    let Json(property) = body?;
    let created = blocking(&state.service, move |service| service.create_property(&property)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: std::result::Result<Json<PropertyUpdate>, JsonRejection>,
) -> ApiResult<Json<Property>> {
    let Json(update) = body?;
    blocking(&state.service, move |service| service.update_property(id, update))
        .await?
        .map(Json)
        .ok_or_else(|| property_not_found(id))
}

async fn disable_property(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if blocking(&state.service, move |service| service.disable_property(id, None)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(property_not_found(id))
    }
}

async fn create_manager(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewManager>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Manager>)> {
    let Json(manager) = body?;
    let created = blocking(&state.service, move |service| service.create_manager(&manager)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn set_manager_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<Manager>> {
    let Json(update) = body?;
    blocking(&state.service, move |service| service.set_manager_status(id, update.status))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Manager {} not found", id)))
}

async fn create_lease(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewLease>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Lease>)> {
    let Json(lease) = body?;
    let created = blocking(&state.service, move |service| service.create_lease(&lease)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "digs is running")
}

/// Bind and serve until `shutdown` resolves
pub async fn serve_with_shutdown<F>(addr: &str, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    log::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    log::info!("Server stopped");
    Ok(())
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    serve_with_shutdown(addr, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        log::info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
