//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/v1/research` | List papers (`skip`, `limit`, `category`, `search`) |
//! | `POST` | `/api/v1/research` | Create and analyze a paper |
//! | `GET`  | `/api/v1/research/{id}` | Fetch a paper |
//! | `PUT`  | `/api/v1/research/{id}` | Partial update; re-analyzes when text changes |
//! | `DELETE` | `/api/v1/research/{id}` | Delete a paper and its index entries |
//! | `GET`  | `/api/v1/research/{id}/similar` | Nearest neighbours by embedding (`limit`) |
//! | `GET`  | `/api/v1/research/{id}/citations` | Citation metrics |
//! | `POST` | `/api/v1/research/{id}/analyze` | Force re-analysis |
//! | `GET`/`POST` | `/api/v1/categories` | List / create categories |
//! | `DELETE` | `/api/v1/categories/{id}` | Delete a category |
//! | `GET`/`POST` | `/api/v1/tags` | List / create tags |
//! | `DELETE` | `/api/v1/tags/{id}` | Delete a tag |
//! | `POST` | `/api/v1/analysis` | Score ad-hoc text without storing it |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title must be 1-255 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `analysis_failed` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::analysis::{AnalysisInput, AnalysisResult};
use crate::config::Config;
use crate::models::{
    Category, CitationMetrics, NewCategory, NewPaper, NewTag, Paper, PaperUpdate, SimilarPaper, Tag,
};
use crate::service::{ResearchService, ServiceError, DEFAULT_SIMILAR_LIMIT};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: ResearchService,
}

/// Opens the store, loads the models, and serves until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = ResearchService::open(config).await?;
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("folio listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the application router around `service`.
pub fn router(service: ResearchService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/research", get(handle_list).post(handle_create))
        .route(
            "/api/v1/research/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .route("/api/v1/research/{id}/similar", get(handle_similar))
        .route("/api/v1/research/{id}/citations", get(handle_citations))
        .route("/api/v1/research/{id}/analyze", post(handle_reanalyze))
        .route(
            "/api/v1/categories",
            get(handle_list_categories).post(handle_create_category),
        )
        .route(
            "/api/v1/categories/{id}",
            axum::routing::delete(handle_delete_category),
        )
        .route("/api/v1/tags", get(handle_list_tags).post(handle_create_tag))
        .route("/api/v1/tags/{id}", axum::routing::delete(handle_delete_tag))
        .route("/api/v1/analysis", post(handle_analyze_text))
        .layer(cors)
        .with_state(AppState { service })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => bad_request(msg),
            ServiceError::NotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            ServiceError::Analysis(_) => {
                tracing::error!(error = %err, "analysis failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "analysis_failed",
                    message: err.to_string(),
                }
            }
            ServiceError::Storage(_) => {
                tracing::error!(error = %err, "storage failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/v1/research ============

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_list_limit")]
    limit: i64,
    category: Option<String>,
    search: Option<String>,
}

fn default_list_limit() -> i64 {
    10
}

async fn handle_list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<Paper>> {
    let Query(params) = params?;
    let papers = state
        .service
        .list(params.skip, params.limit, params.category, params.search)
        .await?;
    Ok(Json(papers))
}

async fn handle_create(
    State(state): State<AppState>,
    body: Result<Json<NewPaper>, JsonRejection>,
) -> Result<(StatusCode, Json<Paper>), AppError> {
    let Json(new) = body?;
    let paper = state.service.create(new).await?;
    Ok((StatusCode::CREATED, Json(paper)))
}

async fn handle_get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Paper> {
    let Path(id) = id?;
    Ok(Json(state.service.get(id).await?))
}

async fn handle_update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<PaperUpdate>, JsonRejection>,
) -> ApiResult<Paper> {
    let Path(id) = id?;
    let Json(update) = body?;
    Ok(Json(state.service.update(id, update).await?))
}

async fn handle_delete(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SimilarParams {
    #[serde(default = "default_similar_limit")]
    limit: i64,
}

fn default_similar_limit() -> i64 {
    DEFAULT_SIMILAR_LIMIT
}

async fn handle_similar(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<SimilarParams>, QueryRejection>,
) -> ApiResult<Vec<SimilarPaper>> {
    let Path(id) = id?;
    let Query(params) = params?;
    Ok(Json(state.service.similar(id, params.limit).await?))
}

async fn handle_citations(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<CitationMetrics> {
    let Path(id) = id?;
    Ok(Json(state.service.citations(id).await?))
}

async fn handle_reanalyze(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Paper> {
    let Path(id) = id?;
    Ok(Json(state.service.reanalyze(id).await?))
}

// ============ /api/v1/categories ============

async fn handle_list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    Ok(Json(state.service.list_categories().await?))
}

async fn handle_create_category(
    State(state): State<AppState>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let Json(new) = body?;
    let category = state.service.create_category(new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn handle_delete_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ /api/v1/tags ============

async fn handle_list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    Ok(Json(state.service.list_tags().await?))
}

async fn handle_create_tag(
    State(state): State<AppState>,
    body: Result<Json<NewTag>, JsonRejection>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let Json(new) = body?;
    let tag = state.service.create_tag(new).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn handle_delete_tag(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.service.delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /api/v1/analysis ============

async fn handle_analyze_text(
    State(state): State<AppState>,
    body: Result<Json<AnalysisInput>, JsonRejection>,
) -> ApiResult<AnalysisResult> {
    let Json(input) = body?;
    Ok(Json(state.service.analyze(&input).await?))
}
