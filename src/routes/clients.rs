use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::Caller;
use crate::errors::AppResult;
use crate::models::tenant::{Client, ClientCreateRequest, ClientStatus, ClientStatusUpdateRequest};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ClientListQuery {
    pub status: Option<ClientStatus>,
}

#[utoipa::path(
    get,
    path = "/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(ClientListQuery),
    responses((status = 200, description = "Clients visible to the caller", body = [Client]))
)]
pub async fn list_clients(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ClientListQuery>,
) -> AppResult<Json<Vec<Client>>> {
    let clients = state.admin.list_clients(&caller.ctx, query.status).await?;
    Ok(Json(clients))
}

#[utoipa::path(
    post,
    path = "/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    request_body = ClientCreateRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 403, description = "manage_clients required"),
        (status = 409, description = "Client id already in use")
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ClientCreateRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let client = state.admin.create_client(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client detail", body = Client),
        (status = 404, description = "Client not found")
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Client>> {
    let client = state.admin.get_client(&caller.ctx, &id).await?;
    Ok(Json(client))
}

#[utoipa::path(
    put,
    path = "/clients/{id}/status",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Client id")),
    request_body = ClientStatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = Client),
        (status = 403, description = "manage_clients required"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn update_client_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<ClientStatusUpdateRequest>,
) -> AppResult<Json<Client>> {
    let client = state.admin.update_client_status(&caller, &id, payload.status).await?;
    Ok(Json(client))
}
