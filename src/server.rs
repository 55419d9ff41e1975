//! HTTP API server.
//!
//! Exposes the [`RagService`] as a JSON API under `/api/v1/rag`, plus a
//! health check and a small landing page.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/rag/upload` | Upload a document (multipart field `file`) |
//! | `POST` | `/api/v1/rag/query` | Ask a question over uploaded documents |
//! | `GET`  | `/api/v1/rag/documents` | List documents in upload order |
//! | `DELETE` | `/api/v1/rag/documents/{id}` | Delete a document |
//! | `GET`  | `/api/v1/rag/stats` | Document and chunk counts |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/` | Landing page |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "File type .exe not allowed. ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! served from elsewhere can call the API.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::RagError;
use crate::llm::Generator;
use crate::models::{DocumentResponse, QueryRequest, QueryResponse};
use crate::rag::{RagService, SystemStats};

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let generator = Generator::from_config(&config.llm)?;
    let service = Arc::new(RagService::new(config.clone(), generator)?);

    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("mini-rag listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router around a shared service.
pub fn router(service: Arc<RagService>) -> Router {
    let body_limit = service
        .config()
        .upload
        .max_file_size
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/upload", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/stats", get(handle_stats));

    Router::new()
        .nest("/api/v1/rag", api)
        .route("/health", get(handle_health))
        .route("/", get(handle_index))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Validation(_) | RagError::Extraction { .. } => bad_request(err.to_string()),
            RagError::Storage(e) => {
                tracing::error!("storage failure: {:#}", e);
                internal(format!("{:#}", e))
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"healthy"` when the server is running.
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

async fn handle_index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
  <head><title>Mini-RAG</title></head>
  <body>
    <h1>Mini-RAG</h1>
    <p>Personal knowledge base. Upload documents and ask questions about them.</p>
    <ul>
      <li><code>POST /api/v1/rag/upload</code> (multipart field <code>file</code>)</li>
      <li><code>POST /api/v1/rag/query</code></li>
      <li><code>GET /api/v1/rag/documents</code></li>
      <li><code>DELETE /api/v1/rag/documents/{id}</code></li>
      <li><code>GET /api/v1/rag/stats</code></li>
      <li><code>GET /health</code></li>
    </ul>
  </body>
</html>
"#,
    )
}

// ============ POST /api/v1/rag/upload ============

async fn handle_upload(
    State(service): State<Arc<RagService>>,
    mut multipart: Multipart,
) -> Result<Json<DocumentResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let response = service.upload_document(&bytes, &filename).await?;
        return Ok(Json(response));
    }
    Err(bad_request("missing multipart field 'file'"))
}

// ============ POST /api/v1/rag/query ============

async fn handle_query(
    State(service): State<Arc<RagService>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    Ok(Json(service.query(request).await?))
}

// ============ GET /api/v1/rag/documents ============

async fn handle_list_documents(
    State(service): State<Arc<RagService>>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    Ok(Json(service.list_documents().await?))
}

// ============ DELETE /api/v1/rag/documents/{id} ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_delete_document(
    State(service): State<Arc<RagService>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if service.delete_document(&id).await? {
        Ok(Json(MessageResponse {
            message: "Document deleted successfully".to_string(),
        }))
    } else {
        Err(not_found(format!("document not found: {}", id)))
    }
}

// ============ GET /api/v1/rag/stats ============

async fn handle_stats(
    State(service): State<Arc<RagService>>,
) -> Result<Json<SystemStats>, AppError> {
    Ok(Json(service.system_stats().await?))
}
