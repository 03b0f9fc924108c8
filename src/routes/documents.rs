use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::document::{DocumentRef, DocumentRegisterRequest};

#[utoipa::path(
    post,
    path = "/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    request_body = DocumentRegisterRequest,
    responses(
        (status = 201, description = "Document registered", body = DocumentRef),
        (status = 403, description = "upload_documents required in the project")
    )
)]
pub async fn register_document(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<DocumentRegisterRequest>,
) -> AppResult<(StatusCode, Json<DocumentRef>)> {
    let document = state.documents.register_document(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document metadata", body = DocumentRef),
        (status = 404, description = "Document not found or not accessible")
    )
)]
pub async fn get_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<DocumentRef>> {
    let document = state.documents.get_document(&caller, &id).await?;
    Ok(Json(document))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 403, description = "delete_documents required in the document's scope"),
        (status = 404, description = "Document not found or outside the caller's scope"),
        (status = 409, description = "Document is waiting on its owner")
    )
)]
pub async fn delete_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.documents.delete_document(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/projects/{id}/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Accessible documents of the project", body = [DocumentRef]),
        (status = 403, description = "Project access required")
    )
)]
pub async fn list_project_documents(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<DocumentRef>>> {
    let documents = state.documents.list_project_documents(&caller, &id).await?;
    Ok(Json(documents))
}
