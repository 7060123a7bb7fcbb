use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::bail_blog;
use crate::error::BlogResult;
use crate::handler::{storage_error, BlogRequest, BlogService, StatusEnvelope};
use crate::jobs::JobRecord;
use crate::key::RequestId;

#[derive(Clone)]
pub struct AppState {
    pub service: BlogService,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LatestArtifact {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content: String,
}

pub fn router(state: AppState) -> Router {
    let blogs = Router::new()
        .route("/", post(handle_submit))
        .route("/latest", get(handle_latest))
        .route("/:id", get(handle_status))
        .route("/:id/content", get(handle_content));

    Router::new()
        .route("/blog-generation", post(handle_blog_generation))
        .route("/health", get(handle_health))
        .nest("/v1/blogs", blogs)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[axum_macros::debug_handler]
async fn handle_blog_generation(
    State(state): State<AppState>,
    body: String,
) -> BlogResult<(StatusCode, Json<StatusEnvelope>)> {
    let envelope = state.service.handle(&body).await?;
    let status = StatusCode::from_u16(envelope.status_code)?;
    Ok((status, Json(envelope)))
}

#[axum_macros::debug_handler]
async fn handle_submit(
    State(state): State<AppState>,
    body: String,
) -> BlogResult<(StatusCode, Json<JobRecord>)> {
    let request = BlogRequest::decode(&body)?;
    let record = state.service.submit(&request.blog_topic).await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

#[axum_macros::debug_handler]
async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> BlogResult<Json<JobRecord>> {
    let Some(id) = RequestId::parse(&id) else {
        bail_blog!(StatusCode::NOT_FOUND, "Job {} not found", id);
    };
    match state.service.job(&id).await? {
        Some(record) => Ok(Json(record)),
        None => bail_blog!(StatusCode::NOT_FOUND, "Job {} not found", id),
    }
}

#[axum_macros::debug_handler]
async fn handle_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> BlogResult<String> {
    let Some(id) = RequestId::parse(&id) else {
        bail_blog!(StatusCode::NOT_FOUND, "Job {} not found", id);
    };
    state.service.job_content(&id).await
}

#[axum_macros::debug_handler]
async fn handle_latest(State(state): State<AppState>) -> BlogResult<Json<LatestArtifact>> {
    match state.service.latest().await.map_err(storage_error)? {
        Some((meta, content)) => Ok(Json(LatestArtifact {
            key: meta.key,
            size: meta.size,
            last_modified: meta.last_modified,
            content,
        })),
        None => bail_blog!(StatusCode::NOT_FOUND, "No blog found yet"),
    }
}

async fn handle_health() -> &'static str {
    "ok"
}
