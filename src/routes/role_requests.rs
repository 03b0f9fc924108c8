use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::access_request::ReviewRequest;
use crate::models::role_request::{RoleRequest, RoleRequestCreateRequest};
use crate::routes::access_requests::AccessRequestListQuery;

#[utoipa::path(
    post,
    path = "/role-requests",
    tag = "Role Requests",
    security(("bearerAuth" = [])),
    request_body = RoleRequestCreateRequest,
    responses(
        (status = 201, description = "Role request opened for the caller", body = RoleRequest),
        (status = 400, description = "Exactly one scope and a non super_admin role are required"),
        (status = 403, description = "Caller has no active profile"),
        (status = 409, description = "A pending request for this scope exists")
    )
)]
pub async fn create_role_request(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<RoleRequestCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleRequest>)> {
    let request = state.role_requests.create(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/role-requests",
    tag = "Role Requests",
    security(("bearerAuth" = [])),
    params(AccessRequestListQuery),
    responses((status = 200, description = "Own requests and those the caller may decide", body = [RoleRequest]))
)]
pub async fn list_role_requests(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AccessRequestListQuery>,
) -> AppResult<Json<Vec<RoleRequest>>> {
    let requests = state.role_requests.list(&caller.ctx, query.status, query.limit).await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/role-requests/{id}",
    tag = "Role Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Role request id")),
    responses(
        (status = 200, description = "Role request", body = RoleRequest),
        (status = 404, description = "Role request not found")
    )
)]
pub async fn get_role_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<RoleRequest>> {
    let request = state.role_requests.get(&caller.ctx, &id).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/role-requests/{id}/approve",
    tag = "Role Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Role request id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Role granted", body = RoleRequest),
        (status = 403, description = "Caller may not grant this role at the scope"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn approve_role_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<RoleRequest>> {
    let notes = payload.and_then(|Json(review)| review.notes);
    let request = state.role_requests.approve(&caller, &id, notes).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/role-requests/{id}/deny",
    tag = "Role Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Role request id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Request denied", body = RoleRequest),
        (status = 403, description = "manage_users required at the scope"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn deny_role_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<RoleRequest>> {
    let notes = payload.and_then(|Json(review)| review.notes);
    let request = state.role_requests.deny(&caller, &id, notes).await?;
    Ok(Json(request))
}
