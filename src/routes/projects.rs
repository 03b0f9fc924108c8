use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::tenant::{Project, ProjectCreateRequest, ProjectStatus, ProjectStatusUpdateRequest};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProjectListQuery {
    /// Restrict to one client.
    pub client_id: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(ProjectListQuery),
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let projects = state
        .admin
        .list_projects(&caller.ctx, query.client_id.as_deref(), query.status)
        .await?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    security(("bearerAuth" = [])),
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Client access and manage_projects required"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state.admin.create_project(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Project>> {
    let project = state.admin.get_project(&caller.ctx, &id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}/status",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Project id")),
    request_body = ProjectStatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = Project),
        (status = 403, description = "manage_projects required"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<ProjectStatusUpdateRequest>,
) -> AppResult<Json<Project>> {
    let project = state.admin.update_project_status(&caller, &id, payload.status).await?;
    Ok(Json(project))
}
