//! Media catalog routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use frames::{MediaListResponse, ProjectsResponse};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::services::catalog::{Catalog, CatalogError, CatalogSummary, Project, Thumbnail};
use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

pub(crate) fn catalog_error_to_status(err: &CatalogError) -> StatusCode {
    match err {
        CatalogError::ProjectNotFound(_) | CatalogError::SubfolderNotFound(_) | CatalogError::Empty(_) => {
            StatusCode::NOT_FOUND
        }
        CatalogError::InvalidMediaType(_) => StatusCode::BAD_REQUEST,
        CatalogError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: CatalogError) -> ApiError {
    let status = catalog_error_to_status(&err);
    if status.is_server_error() {
        warn!(error = %err, "media: lookup failed");
    }
    (status, Json(json!({ "error": err.to_string() })))
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub catalog: Catalog,
    pub summary: CatalogSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub project_name: String,
    #[serde(flatten)]
    pub project: Project,
}

#[derive(Serialize)]
pub struct ThumbnailsResponse {
    pub thumbnails: Vec<Thumbnail>,
    pub count: usize,
}

/// `GET /api/media` — full catalog plus summary.
pub async fn catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse { catalog: Catalog::clone(&state.catalog), summary: state.catalog.summary() })
}

/// `GET /api/media/projects` — project names.
pub async fn list_projects(State(state): State<AppState>) -> Json<ProjectsResponse> {
    let projects = state.catalog.project_names();
    Json(ProjectsResponse { count: projects.len(), projects })
}

/// `GET /api/media/projects/{project}` — one project's media.
pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let Some(project) = state.catalog.project(&name).cloned() else {
        return Err(api_error(CatalogError::ProjectNotFound(name)));
    };
    Ok(Json(ProjectResponse { project_name: name, project }))
}

/// `GET /api/media/thumbnails` — every project thumbnail.
pub async fn thumbnails(State(state): State<AppState>) -> Json<ThumbnailsResponse> {
    let thumbnails = state.catalog.thumbnails();
    Json(ThumbnailsResponse { count: thumbnails.len(), thumbnails })
}

/// `GET /api/media/projects/{project}/{mediaType}` — files of one media type.
pub async fn get_media(
    State(state): State<AppState>,
    Path((project, media_type)): Path<(String, String)>,
) -> Result<Json<MediaListResponse>, ApiError> {
    media_response(&state, project, media_type, None)
}

/// `GET /api/media/projects/{project}/{mediaType}/{subfolder}` — one album subfolder.
pub async fn get_media_subfolder(
    State(state): State<AppState>,
    Path((project, media_type, subfolder)): Path<(String, String, String)>,
) -> Result<Json<MediaListResponse>, ApiError> {
    media_response(&state, project, media_type, Some(subfolder))
}

fn media_response(
    state: &AppState,
    project_name: String,
    media_type: String,
    subfolder: Option<String>,
) -> Result<Json<MediaListResponse>, ApiError> {
    let data = state
        .catalog
        .media(&project_name, &media_type, subfolder.as_deref())
        .map_err(api_error)?;
    Ok(Json(MediaListResponse { project_name, media_type, data }))
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;
