//! REST endpoints consumed by the web viewer.
//!
//! Two route families are served from the same handlers: the standalone
//! proxy routes (`/{series}/...`) and the plugin-style routes under
//! `/spectraloptica`, where position and image requests address an instance.

use std::{path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::{
    aggregator::aggregate,
    descriptor::SeriesDescriptor,
    projector::{Position, ProjectionError, project, project_instance},
    store::{DicomStore, StoreError},
    tags::TagError,
};

/// Path prefix of the plugin-style routes.
pub const PLUGIN_PREFIX: &str = "/spectraloptica";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DicomStore>,
    /// Directory of a built viewer (`index.html` and `static/`).
    pub viewer_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(store: Arc<dyn DicomStore>) -> Self {
        Self {
            store,
            viewer_dir: None,
        }
    }

    pub fn with_viewer_dir(mut self, viewer_dir: impl Into<PathBuf>) -> Self {
        self.viewer_dir = Some(viewer_dir.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("Viewer unavailable: {0}")]
    Viewer(std::io::Error),
}

impl From<ProjectionError> for ApiError {
    fn from(error: ProjectionError) -> Self {
        match error {
            ProjectionError::Store(error) => ApiError::Store(error),
            ProjectionError::Tag(error) => ApiError::Tag(error),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(
                StoreError::SeriesNotFound(_)
                | StoreError::InstanceNotFound(_)
                | StoreError::AttachmentNotFound { .. },
            ) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::BAD_GATEWAY,
            ApiError::Tag(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Viewer(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    pub x: f64,
    pub y: f64,
}

pub fn router(state: AppState) -> Router {
    let plugin = Router::new()
        .route("/{id}/images", get(series_images))
        .route("/{id}/position", get(instance_position))
        .route("/{id}/full-image", get(instance_full_image))
        .route("/{id}/thumbnail", get(instance_thumbnail));

    let mut router = Router::new()
        .nest(PLUGIN_PREFIX, plugin)
        .route("/{series}/images", get(series_images))
        .route("/{series}/position", get(series_position))
        .route("/{series}/{instance}/full-image", get(full_image))
        .route("/{series}/{instance}/thumbnail", get(thumbnail));

    if let Some(viewer_dir) = &state.viewer_dir {
        router = router
            .route("/{series}", get(viewer_page))
            .nest_service("/static", ServeDir::new(viewer_dir.join("static")));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn series_images(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> Result<Json<SeriesDescriptor>, ApiError> {
    Ok(Json(aggregate(state.store.as_ref(), &series_id).await?))
}

async fn series_position(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<Position>, ApiError> {
    debug!("Position of ({}, {}) in series {series_id}", query.x, query.y);
    let position = project(state.store.as_ref(), &series_id, query.x, query.y).await?;
    Ok(Json(position))
}

async fn instance_position(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<Position>, ApiError> {
    debug!("Position of ({}, {}) at {instance_id}", query.x, query.y);
    let position = project_instance(state.store.as_ref(), &instance_id, query.x, query.y).await?;
    Ok(Json(position))
}

fn jpeg(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
}

async fn full_image(
    State(state): State<AppState>,
    Path((series_id, instance_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    debug!("Full image of {instance_id} in series {series_id}");
    Ok(jpeg(state.store.frame(&instance_id).await?))
}

async fn thumbnail(
    State(state): State<AppState>,
    Path((series_id, instance_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    debug!("Thumbnail of {instance_id} in series {series_id}");
    Ok(jpeg(state.store.thumbnail(&instance_id).await?))
}

async fn instance_full_image(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(jpeg(state.store.frame(&instance_id).await?))
}

async fn instance_thumbnail(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(jpeg(state.store.thumbnail(&instance_id).await?))
}

async fn viewer_page(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    debug!("Viewer page for series {series_id}");
    let index = state
        .viewer_dir
        .as_ref()
        .map(|dir| dir.join("index.html"))
        .ok_or_else(|| {
            ApiError::Viewer(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no viewer directory configured",
            ))
        })?;
    let page = tokio::fs::read_to_string(&index)
        .await
        .map_err(ApiError::Viewer)?;
    Ok(Html(page))
}
