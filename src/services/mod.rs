//! Authorization-checked operations behind the HTTP handlers.

pub mod access_requests;
pub mod admin;
pub mod answers;
pub mod documents;
pub mod role_requests;

pub use access_requests::AccessWorkflow;
pub use admin::TenantAdmin;
pub use answers::{AnswerBoundary, AnswerComposer, ExtractiveComposer};
pub use documents::DocumentRegistry;
pub use role_requests::RoleRequestWorkflow;

use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{Caller, Permission, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::tenant::Project;

/// Passes `check` through, appending a failed audit entry when it is an error.
pub(crate) async fn audited_check(
    audit: &AuditLogger,
    caller: &Caller,
    check: AppResult<()>,
    action: &str,
    resource_type: &str,
    resource_id: &str,
) -> AppResult<()> {
    if let Err(err) = check {
        tracing::debug!(
            actor = %caller.ctx.email(),
            action,
            resource_id,
            error = %err,
            "authorization rejected"
        );
        audit
            .log(
                AuditRecord::new(&caller.ctx, action, resource_type, resource_id)
                    .with_origin(&caller.origin)
                    .failed(&err),
            )
            .await;
        return Err(err);
    }
    Ok(())
}

/// `permission` at a project named by the caller.
///
/// Projects outside the caller's scope fail exactly like unknown ones; the
/// permission itself is only evaluated once the project is reachable.
pub(crate) fn project_permission(
    ctx: &TenantContext,
    project: Option<&Project>,
    project_id: &str,
    permission: Permission,
) -> AppResult<()> {
    match project {
        Some(project) if ctx.can_access_project(&project.id) || ctx.can_access_client(&project.client_id) => {
            ctx.require_permission_in(permission, Some(&project.client_id), Some(&project.id))
        }
        None if ctx.is_unrestricted() => Err(AppError::not_found("project not found")),
        _ => Err(AppError::forbidden(format!("project access required: {project_id}"))),
    }
}
