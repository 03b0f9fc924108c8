use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::audit::ChainReport;
use crate::authz::{Caller, Permission};
use crate::errors::AppResult;
use crate::models::audit::{AuditLogEntry, AuditQuery};

#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    security(("bearerAuth" = [])),
    params(
        ("resource_type" = Option<String>, Query, description = "Filter by resource type"),
        ("resource_id" = Option<String>, Query, description = "Filter by resource id"),
        ("actor_email" = Option<String>, Query, description = "Filter by actor"),
        ("limit" = Option<i64>, Query, description = "Maximum entries, newest first")
    ),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogEntry]),
        (status = 403, description = "manage_system required")
    )
)]
pub async fn list_entries(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    caller.ctx.require_permission(Permission::ManageSystem)?;
    let entries = state.audit.list(&query).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/audit/verify",
    tag = "Audit",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Hash chain verification result", body = ChainReport),
        (status = 403, description = "manage_system required")
    )
)]
pub async fn verify_chain(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ChainReport>> {
    caller.ctx.require_permission(Permission::ManageSystem)?;
    let report = state.audit.verify_chain().await?;
    Ok(Json(report))
}
