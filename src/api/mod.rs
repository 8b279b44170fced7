//! HTTP surface: axum routes translating verbs and paths onto the core
//! services. Handlers stay thin — deserialize, hop to the blocking pool
//! (the core holds CPU and locks, never await points), map errors to
//! statuses with stable machine codes in the body.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::embed::{EmbeddingClient, InputType};
use crate::error::{Error, Result};
use crate::index::registry::{IndexConfig, IndexRegistry};
use crate::model::{Chunk, ChunkPatch, DocumentPatch, LibraryPatch, Metadata};
use crate::search::{MetadataFilter, SearchService};
use crate::snapshot::SnapshotStore;
use crate::store::Repository;

pub struct AppState {
    pub repo: Arc<Repository>,
    pub registry: Arc<IndexRegistry>,
    pub search: Arc<SearchService>,
    pub snapshots: Arc<SnapshotStore>,
    pub embeddings: Option<Arc<EmbeddingClient>>,
}

/// Wire the core services together. The repository's invalidation sink
/// points at the registry, so chunk mutations evict compiled indices
/// before they return.
pub fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let registry = Arc::new(IndexRegistry::new(
        IndexConfig {
            algorithm: config.default_index,
            metric: config.default_metric,
        },
        config.lsh,
    ));
    let sink = registry.clone();
    let repo = Arc::new(Repository::new(Arc::new(move |id| sink.invalidate(id))));
    let search = Arc::new(SearchService::new(repo.clone(), registry.clone()));
    let snapshots = Arc::new(SnapshotStore::new(config.data_dir.clone(), config.lsh)?);
    let embeddings = EmbeddingClient::from_config(config).map(Arc::new);
    Ok(Arc::new(AppState {
        repo,
        registry,
        search,
        snapshots,
        embeddings,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/libraries", post(create_library).get(list_libraries))
        .route(
            "/libraries/:library_id",
            get(get_library).patch(update_library).delete(delete_library),
        )
        .route(
            "/libraries/:library_id/documents",
            post(create_document).get(list_documents),
        )
        .route(
            "/libraries/:library_id/documents/:document_id",
            get(get_document).patch(update_document).delete(delete_document),
        )
        .route(
            "/libraries/:library_id/chunks",
            post(create_chunk).get(list_chunks),
        )
        .route("/libraries/:library_id/chunks/search", post(search_chunks))
        .route(
            "/libraries/:library_id/chunks/:chunk_id",
            get(get_chunk).patch(update_chunk).delete(delete_chunk),
        )
        .route(
            "/libraries/:library_id/index",
            put(configure_index).get(describe_index).delete(drop_index),
        )
        .route("/admin/snapshots", post(create_snapshot).get(list_snapshots))
        .route(
            "/admin/snapshots/:snapshot_id",
            get(get_snapshot).delete(delete_snapshot),
        )
        .route("/admin/snapshots/:snapshot_id/restore", post(restore_snapshot))
        .route("/embeddings", post(generate_embeddings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a core call on the blocking pool; lock waits and index builds must
/// not pin a runtime worker.
async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}

// === Error mapping ===

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({
            "error": { "code": self.0.code(), "message": self.0.to_string() }
        }));
        (status, body).into_response()
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::DimensionMismatch { .. }
        | Error::InvalidVector(_)
        | Error::UnsupportedMetric { .. }
        | Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::SnapshotCorrupt(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// === DTOs ===

#[derive(Deserialize)]
struct CreateLibraryRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct CreateDocumentRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct CreateChunkRequest {
    document_id: Uuid,
    text: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct ListChunksQuery {
    document_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct SearchRequest {
    vector: Vec<f32>,
    k: usize,
    #[serde(default)]
    metadata_filters: Option<MetadataFilter>,
}

#[derive(serde::Serialize)]
struct SearchHit {
    chunk_id: Uuid,
    score: f32,
    chunk: Chunk,
}

#[derive(Deserialize)]
struct CreateSnapshotRequest {
    name: String,
}

#[derive(Deserialize)]
struct EmbeddingsRequest {
    texts: Vec<String>,
    #[serde(default)]
    input_type: Option<String>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn create_library(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLibraryRequest>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let library =
        blocking(move || repo.create_library(&req.name, req.description, req.metadata)).await?;
    Ok((StatusCode::CREATED, Json(library)))
}

async fn list_libraries(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let libraries = blocking(move || Ok(repo.list_libraries())).await?;
    Ok(Json(libraries))
}

async fn get_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let library = blocking(move || repo.get_library(library_id)).await?;
    Ok(Json(library))
}

async fn update_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(patch): Json<LibraryPatch>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let library = blocking(move || repo.update_library(library_id, patch)).await?;
    Ok(Json(library))
}

async fn delete_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    blocking(move || {
        repo.delete_library(library_id)?;
        registry.forget(library_id);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let document = blocking(move || {
        repo.create_document(library_id, &req.title, req.description, req.metadata)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let documents = blocking(move || repo.list_documents(library_id)).await?;
    Ok(Json(documents))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let document = blocking(move || repo.get_document(library_id, document_id)).await?;
    Ok(Json(document))
}

async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<DocumentPatch>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let document = blocking(move || repo.update_document(library_id, document_id, patch)).await?;
    Ok(Json(document))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    blocking(move || repo.delete_document(library_id, document_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_chunk(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<CreateChunkRequest>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let chunk = blocking(move || {
        repo.create_chunk(library_id, req.document_id, req.text, req.embedding, req.metadata)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(chunk)))
}

async fn list_chunks(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Query(query): Query<ListChunksQuery>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let chunks = blocking(move || repo.list_chunks(library_id, query.document_id)).await?;
    Ok(Json(chunks))
}

async fn get_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, chunk_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let chunk = blocking(move || repo.get_chunk(library_id, chunk_id)).await?;
    Ok(Json(chunk))
}

async fn update_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, chunk_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<ChunkPatch>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let chunk = blocking(move || repo.update_chunk(library_id, chunk_id, patch)).await?;
    Ok(Json(chunk))
}

async fn delete_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, chunk_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    blocking(move || repo.delete_chunk(library_id, chunk_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search_chunks(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<impl IntoResponse> {
    let search = state.search.clone();
    let matches = blocking(move || {
        search.search(library_id, &req.vector, req.k, req.metadata_filters.as_ref())
    })
    .await?;
    let hits: Vec<SearchHit> = matches
        .into_iter()
        .map(|m| SearchHit {
            chunk_id: m.chunk_id,
            score: m.score,
            chunk: m.chunk,
        })
        .collect();
    Ok(Json(hits))
}

/// PUT /libraries/{id}/index — record the pairing and build eagerly.
async fn configure_index(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(config): Json<IndexConfig>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    let description = blocking(move || {
        repo.get_library(library_id)?;
        registry.configure(library_id, config)?;
        repo.with_library_read(library_id, |state| {
            registry.get_or_build(library_id, state)?;
            Ok(registry.describe(library_id, state))
        })
    })
    .await?;
    Ok(Json(description))
}

async fn describe_index(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    let description = blocking(move || {
        repo.with_library_read(library_id, |state| Ok(registry.describe(library_id, state)))
    })
    .await?;
    Ok(Json(description))
}

async fn drop_index(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    blocking(move || {
        repo.get_library(library_id)?;
        registry.invalidate(library_id);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSnapshotRequest>,
) -> ApiResult<impl IntoResponse> {
    let snapshots = state.snapshots.clone();
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    let info = blocking(move || snapshots.create(&req.name, &repo, &registry)).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn list_snapshots(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let snapshots = state.snapshots.clone();
    let infos = blocking(move || snapshots.list()).await?;
    Ok(Json(infos))
}

async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(snapshot_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let snapshots = state.snapshots.clone();
    let info = blocking(move || snapshots.get(snapshot_id)).await?;
    Ok(Json(info))
}

/// POST /admin/snapshots/{id}/restore — synchronous, all-or-nothing.
async fn restore_snapshot(
    State(state): State<Arc<AppState>>,
    Path(snapshot_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let snapshots = state.snapshots.clone();
    let repo = state.repo.clone();
    let registry = state.registry.clone();
    blocking(move || snapshots.restore(snapshot_id, &repo, &registry)).await?;
    Ok(Json(json!({ "restored": snapshot_id })))
}

async fn generate_embeddings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmbeddingsRequest>,
) -> ApiResult<impl IntoResponse> {
    let client = state.embeddings.clone().ok_or_else(|| {
        Error::EmbeddingUnavailable("COHERE_API_KEY is not configured".into())
    })?;
    let input_type = match req.input_type.as_deref() {
        None | Some("search_document") => InputType::SearchDocument,
        Some("search_query") => InputType::SearchQuery,
        Some(other) => {
            return Err(Error::InvalidArgument(format!("unknown input_type: {other}")).into())
        }
    };
    let embeddings = client.embed(&req.texts, input_type).await?;
    Ok(Json(json!({ "embeddings": embeddings })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kinds() {
        assert_eq!(status_for(&Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::AlreadyExists("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::DimensionMismatch { expected: 1, got: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::EmbeddingUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::SnapshotCorrupt("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn search_request_accepts_optional_filters() {
        let req: SearchRequest = serde_json::from_value(serde_json::json!({
            "vector": [1.0, 0.0],
            "k": 5
        }))
        .unwrap();
        assert!(req.metadata_filters.is_none());

        let req: SearchRequest = serde_json::from_value(serde_json::json!({
            "vector": [1.0],
            "k": 2,
            "metadata_filters": { "lang": "en" }
        }))
        .unwrap();
        assert_eq!(req.metadata_filters.unwrap()["lang"], "en");
    }

    #[test]
    fn index_config_uses_lowercase_tags() {
        let config: IndexConfig = serde_json::from_value(serde_json::json!({
            "algorithm": "kdtree",
            "metric": "euclidean"
        }))
        .unwrap();
        assert_eq!(config.algorithm, crate::index::IndexKind::KdTree);
    }
}
