use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::access_request::{
    AccessRequest, AccessRequestCreateRequest, AccessRequestStatus, BulkAccessRequest,
    BulkAccessRequestCreateRequest, BulkAccessRequestResponse, ReviewRequest,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AccessRequestListQuery {
    pub status: Option<AccessRequestStatus>,
    /// Maximum rows, newest first (default 100, at most 500)
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/documents/{id}/access-requests",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Document id")),
    request_body = AccessRequestCreateRequest,
    responses(
        (status = 201, description = "Access request opened", body = AccessRequest),
        (status = 400, description = "owner_email missing or contradicts the recorded owner"),
        (status = 403, description = "upload_documents or manage_documents required"),
        (status = 409, description = "Document is already gated")
    )
)]
pub async fn request_access(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<AccessRequestCreateRequest>,
) -> AppResult<(StatusCode, Json<AccessRequest>)> {
    let request = state.workflow.request_access(&caller, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/access-requests/bulk",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    request_body = BulkAccessRequestCreateRequest,
    responses(
        (status = 201, description = "Bulk access request opened", body = BulkAccessRequestResponse),
        (status = 409, description = "A document is already gated")
    )
)]
pub async fn request_bulk_access(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<BulkAccessRequestCreateRequest>,
) -> AppResult<(StatusCode, Json<BulkAccessRequestResponse>)> {
    let response = state.workflow.request_bulk_access(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/access-requests",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(AccessRequestListQuery),
    responses((status = 200, description = "Requests visible to the caller", body = [AccessRequest]))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AccessRequestListQuery>,
) -> AppResult<Json<Vec<AccessRequest>>> {
    let requests = state.workflow.list_requests(&caller.ctx, query.status, query.limit).await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/access-requests/{id}",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Access request id")),
    responses(
        (status = 200, description = "Access request", body = AccessRequest),
        (status = 404, description = "Access request not found")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<AccessRequest>> {
    let request = state.workflow.get_request(&caller.ctx, &id).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/access-requests/{id}/approve",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Access request id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Request approved", body = AccessRequest),
        (status = 403, description = "Caller is not the owner or a scoped administrator"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn approve_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<AccessRequest>> {
    let notes = payload.and_then(|Json(review)| review.notes);
    let request = state.workflow.approve(&caller, &id, notes).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/access-requests/{id}/deny",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Access request id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Request denied; the document is quarantined", body = AccessRequest),
        (status = 403, description = "Caller is not the owner or a scoped administrator"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn deny_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<AccessRequest>> {
    let notes = payload.and_then(|Json(review)| review.notes);
    let request = state.workflow.deny(&caller, &id, notes).await?;
    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/access-requests/bulk/{id}",
    tag = "Access Requests",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Bulk request id")),
    responses(
        (status = 200, description = "Bulk aggregate with counters", body = BulkAccessRequest),
        (status = 404, description = "Bulk request not found")
    )
)]
pub async fn get_bulk(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<BulkAccessRequest>> {
    let bulk = state.workflow.get_bulk(&caller.ctx, &id).await?;
    Ok(Json(bulk))
}
