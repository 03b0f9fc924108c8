use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::user::{
    AssignClientRequest, AssignProjectRequest, UserClientAssignment, UserCreateRequest, UserProfile,
    UserProjectAssignment,
};

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 403, description = "manage_users required or role above the caller's"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    let user = state.admin.create_user(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let user = state.admin.get_user(&caller.ctx, &id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users/{id}/clients",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = AssignClientRequest,
    responses(
        (status = 201, description = "Assignment saved", body = UserClientAssignment),
        (status = 403, description = "Not allowed to grant this scope or role")
    )
)]
pub async fn assign_client(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<AssignClientRequest>,
) -> AppResult<(StatusCode, Json<UserClientAssignment>)> {
    let assignment = state.admin.assign_user_to_client(&caller, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/clients/{client_id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(
        ("id" = String, Path, description = "User id"),
        ("client_id" = String, Path, description = "Client id")
    ),
    responses(
        (status = 204, description = "Assignment revoked"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn revoke_client(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, client_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.admin.revoke_client_assignment(&caller, &id, &client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/users/{id}/projects",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = AssignProjectRequest,
    responses(
        (status = 201, description = "Assignment saved", body = UserProjectAssignment),
        (status = 403, description = "Not allowed to grant this scope or role")
    )
)]
pub async fn assign_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<AssignProjectRequest>,
) -> AppResult<(StatusCode, Json<UserProjectAssignment>)> {
    let assignment = state.admin.assign_user_to_project(&caller, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/projects/{project_id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(
        ("id" = String, Path, description = "User id"),
        ("project_id" = String, Path, description = "Project id")
    ),
    responses(
        (status = 204, description = "Assignment revoked"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn revoke_project(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, project_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.admin.revoke_project_assignment(&caller, &id, &project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
