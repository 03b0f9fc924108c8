use std::sync::Arc;

use super::access_requests::request_scope;
use super::{audited_check, TenantAdmin};
use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{Caller, Permission, Role, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::access_request::{AccessRequestStatus, Decision};
use crate::models::role_request::{RoleRequest, RoleRequestCreateRequest};
use crate::models::user::{AssignClientRequest, AssignProjectRequest};
use crate::store::RoleRequestStore;
use crate::utils::{new_id, utc_now};

const ROLE_REQUEST_NOT_FOUND: &str = "role request not found";
const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

/// Users asking for a role on a client or project.
///
/// ```text
/// pending -> approved (assignment written through TenantAdmin)
///         \-> denied
/// ```
#[derive(Clone)]
pub struct RoleRequestWorkflow {
    store: Arc<dyn RoleRequestStore>,
    admin: TenantAdmin,
    audit: AuditLogger,
}

impl RoleRequestWorkflow {
    pub fn new(store: Arc<dyn RoleRequestStore>, admin: TenantAdmin, audit: AuditLogger) -> Self {
        Self { store, admin, audit }
    }

    /// Opens a request for the caller's own profile. The scope is not looked
    /// up here, so the response never tells whether it exists.
    pub async fn create(&self, caller: &Caller, req: RoleRequestCreateRequest) -> AppResult<RoleRequest> {
        let ctx = &caller.ctx;
        let id = new_id("rr");

        let user_id = ctx.user_id().map(str::to_string);
        let check = match user_id {
            Some(_) => Ok(()),
            None => Err(AppError::forbidden("an active user profile is required")),
        };
        audited_check(&self.audit, caller, check, "role_request.created", "role_request", &id).await?;
        let user_id = user_id.ok_or_else(|| AppError::forbidden("an active user profile is required"))?;

        let (client_id, project_id) = match (trimmed(req.client_id), trimmed(req.project_id)) {
            (Some(client_id), None) => (Some(client_id), None),
            (None, Some(project_id)) => (None, Some(project_id)),
            _ => return Err(AppError::validation("exactly one of client_id and project_id is required")),
        };
        if req.requested_role == Role::SuperAdmin {
            return Err(AppError::validation("super_admin cannot be requested"));
        }

        let request = RoleRequest {
            id,
            user_id,
            requester_email: ctx.email().to_string(),
            client_id,
            project_id,
            requested_role: req.requested_role,
            status: AccessRequestStatus::Pending,
            reason: req.reason,
            requested_at: utc_now(),
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            project_client_id: None,
        };
        self.store.create_role_request(&request).await?;

        tracing::info!(
            request_id = %request.id,
            user_id = %request.user_id,
            role = %request.requested_role,
            "role request opened"
        );
        self.audit
            .log(AuditRecord::for_entity(ctx, "created", &request).with_origin(&caller.origin))
            .await;

        Ok(request)
    }

    /// Grants the requested role through the regular assignment path; the
    /// reviewer needs the same rights as for a direct assignment.
    pub async fn approve(&self, caller: &Caller, id: &str, notes: Option<String>) -> AppResult<RoleRequest> {
        let request = self.decidable(caller, id, Decision::Approve).await?;

        match (request.client_id.as_deref(), request.project_id.as_deref()) {
            (Some(client_id), _) => {
                let assignment = AssignClientRequest {
                    client_id: client_id.to_string(),
                    role: request.requested_role,
                };
                self.admin
                    .assign_user_to_client(caller, &request.user_id, assignment)
                    .await?;
            }
            (None, Some(project_id)) => {
                let assignment = AssignProjectRequest {
                    project_id: project_id.to_string(),
                    role: request.requested_role,
                };
                self.admin
                    .assign_user_to_project(caller, &request.user_id, assignment)
                    .await?;
            }
            (None, None) => return Err(AppError::internal("role request without a scope")),
        }

        self.complete(caller, id, Decision::Approve, notes).await
    }

    pub async fn deny(&self, caller: &Caller, id: &str, notes: Option<String>) -> AppResult<RoleRequest> {
        let request = self.decidable(caller, id, Decision::Deny).await?;

        let check = if may_decide(&caller.ctx, &request) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "permission required: {}",
                Permission::ManageUsers
            )))
        };
        audited_check(&self.audit, caller, check, "role_request.denied", "role_request", id).await?;

        self.complete(caller, id, Decision::Deny, notes).await
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> AppResult<RoleRequest> {
        match self.store.get_role_request(id).await? {
            Some(request) if may_view(ctx, &request) => Ok(request),
            _ => Err(AppError::not_found(ROLE_REQUEST_NOT_FOUND)),
        }
    }

    /// Own requests plus those the caller may decide, newest first.
    pub async fn list(
        &self,
        ctx: &TenantContext,
        status: Option<AccessRequestStatus>,
        limit: Option<i64>,
    ) -> AppResult<Vec<RoleRequest>> {
        let scope = (!ctx.is_unrestricted()).then(|| request_scope(ctx));
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let requests = self.store.list_role_requests(status, scope.as_ref(), limit).await?;

        Ok(requests.into_iter().filter(|request| may_view(ctx, request)).collect())
    }

    /// Loads a pending request the caller may see; requesters never decide
    /// their own.
    async fn decidable(&self, caller: &Caller, id: &str, decision: Decision) -> AppResult<RoleRequest> {
        let ctx = &caller.ctx;
        let action = format!("role_request.{}", decision.status().as_str());
        let request = self.store.get_role_request(id).await?;

        let check = match request.as_ref() {
            Some(request) if may_view(ctx, request) => {
                if request.requester_email == ctx.email() && !ctx.is_unrestricted() {
                    Err(AppError::forbidden(format!("requesters cannot {} their own request", decision.action())))
                } else if request.status != AccessRequestStatus::Pending {
                    Err(AppError::conflict(format!("role request {id} is not pending")))
                } else {
                    Ok(())
                }
            }
            _ => Err(AppError::not_found(ROLE_REQUEST_NOT_FOUND)),
        };
        audited_check(&self.audit, caller, check, &action, "role_request", id).await?;

        request.ok_or_else(|| AppError::not_found(ROLE_REQUEST_NOT_FOUND))
    }

    async fn complete(
        &self,
        caller: &Caller,
        id: &str,
        decision: Decision,
        notes: Option<String>,
    ) -> AppResult<RoleRequest> {
        let ctx = &caller.ctx;
        let completed = match self
            .store
            .complete_role_request(id, decision, ctx.email(), notes.as_deref(), utc_now())
            .await
        {
            Ok(completed) => completed,
            Err(err) => {
                if matches!(err, AppError::Conflict(_)) {
                    let action = format!("role_request.{}", decision.status().as_str());
                    self.audit
                        .log(
                            AuditRecord::new(ctx, action, "role_request", id)
                                .with_origin(&caller.origin)
                                .failed(&err),
                        )
                        .await;
                }
                return Err(err);
            }
        };

        tracing::info!(
            request_id = %completed.id,
            user_id = %completed.user_id,
            decision = decision.action(),
            reviewer = %ctx.email(),
            "role request completed"
        );
        self.audit
            .log(
                AuditRecord::for_entity(ctx, decision.status().as_str(), &completed)
                    .with_description(format!(
                        "{} on {} for {}",
                        completed.requested_role,
                        completed.project_id.as_deref().or(completed.client_id.as_deref()).unwrap_or("-"),
                        completed.user_id
                    ))
                    .with_origin(&caller.origin),
            )
            .await;

        Ok(completed)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `manage_users` at the requested scope.
fn may_decide(ctx: &TenantContext, request: &RoleRequest) -> bool {
    if ctx.is_unrestricted() {
        return true;
    }
    match request.project_id.as_deref() {
        Some(project_id) => ctx.has_permission_in(Permission::ManageUsers, request.review_client(), Some(project_id)),
        None => request
            .client_id
            .as_deref()
            .is_some_and(|client_id| ctx.has_permission_in(Permission::ManageUsers, Some(client_id), None)),
    }
}

fn may_view(ctx: &TenantContext, request: &RoleRequest) -> bool {
    ctx.is_unrestricted() || (ctx.is_known() && request.requester_email == ctx.email()) || may_decide(ctx, request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_id: Option<&str>, project_id: Option<&str>, project_client: Option<&str>) -> RoleRequest {
        RoleRequest {
            id: "rr-1".to_string(),
            user_id: "u-bob".to_string(),
            requester_email: "bob@example.com".to_string(),
            client_id: client_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
            requested_role: Role::EndUser,
            status: AccessRequestStatus::Pending,
            reason: None,
            requested_at: utc_now(),
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            project_client_id: project_client.map(str::to_string),
        }
    }

    #[test]
    fn account_admin_decides_for_projects_of_its_client() {
        let admin = TenantContext::new("aa@example.com", Role::AccountAdmin)
            .with_user_id("u-aa")
            .with_client_role("client-a", Role::AccountAdmin);

        assert!(may_decide(&admin, &request(Some("client-a"), None, None)));
        assert!(may_decide(&admin, &request(None, Some("proj-1"), Some("client-a"))));
        assert!(!may_decide(&admin, &request(None, Some("proj-3"), Some("client-b"))));
        assert!(!may_decide(&admin, &request(None, Some("proj-x"), None)));
    }

    #[test]
    fn end_users_only_see_their_own_requests() {
        let bob = TenantContext::new("bob@example.com", Role::EndUser)
            .with_user_id("u-bob")
            .with_projects(["proj-1"]);
        let eve = TenantContext::new("eve@example.com", Role::EndUser)
            .with_user_id("u-eve")
            .with_projects(["proj-1"]);
        let pending = request(None, Some("proj-1"), Some("client-a"));

        assert!(may_view(&bob, &pending));
        assert!(!may_decide(&bob, &pending));
        assert!(!may_view(&eve, &pending));
    }
}
