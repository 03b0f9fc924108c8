use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::context::TenantContext;
use crate::app::AppState;
use crate::audit::RequestContext;
use crate::errors::AppError;

/// Authenticated caller of a request: the resolved tenant context plus the
/// request origin for audit entries.
#[derive(Debug, Clone)]
pub struct Caller {
    pub ctx: TenantContext,
    pub origin: RequestContext,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthenticated("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        if state.identity.require_domain_member && !claims.domain_member {
            tracing::debug!(email = %claims.sub, "identity outside the organisation domain rejected");
            return Err(AppError::forbidden("organisation domain membership required"));
        }

        let ctx = state.resolver.resolve_identity(&claims.sub, claims.domain_member).await;

        Ok(Caller {
            ctx,
            origin: RequestContext::from_headers(&parts.headers),
        })
    }
}
