use axum::Json;

use crate::authz::{Caller, TenantContext};
use crate::errors::AppResult;

#[utoipa::path(
    get,
    path = "/me/context",
    tag = "Context",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Resolved tenant context of the caller", body = TenantContext),
        (status = 401, description = "Missing or invalid identity token")
    )
)]
pub async fn me(caller: Caller) -> AppResult<Json<TenantContext>> {
    Ok(Json(caller.ctx))
}
