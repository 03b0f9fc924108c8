use std::sync::Arc;

use super::{audited_check, project_permission};
use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{Caller, Permission, Role, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::tenant::{
    Client, ClientCreateRequest, ClientStatus, Project, ProjectCreateRequest, ProjectStatus,
};
use crate::models::user::{
    AssignClientRequest, AssignProjectRequest, UserClientAssignment, UserCreateRequest, UserProfile,
    UserProjectAssignment, UserStatus,
};
use crate::store::TenantDirectory;
use crate::utils::{new_id, normalize_email, utc_now};

const CLIENT_NOT_FOUND: &str = "client not found";
const PROJECT_NOT_FOUND: &str = "project not found";
const USER_NOT_FOUND: &str = "user not found";

/// Tenant directory mutations and scoped reads.
#[derive(Clone)]
pub struct TenantAdmin {
    directory: Arc<dyn TenantDirectory>,
    audit: AuditLogger,
}

impl TenantAdmin {
    pub fn new(directory: Arc<dyn TenantDirectory>, audit: AuditLogger) -> Self {
        Self { directory, audit }
    }

    // =========================================================================
    // CLIENTS
    // =========================================================================

    pub async fn create_client(&self, caller: &Caller, req: ClientCreateRequest) -> AppResult<Client> {
        let id = req.id.clone().unwrap_or_else(|| new_id("client"));
        audited_check(
            &self.audit,
            caller,
            caller.ctx.require_permission(Permission::ManageClients),
            "client.created",
            "client",
            &id,
        )
        .await?;

        let name = required("name", &req.name)?;
        let now = utc_now();
        let client = Client {
            id,
            name,
            domain: req.domain.map(|d| d.trim().to_lowercase()),
            status: ClientStatus::Active,
            created_by: caller.ctx.email().to_string(),
            contact_email: req.contact_email.as_deref().map(normalize_email),
            contact_name: req.contact_name,
            industry: req.industry,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };

        self.directory.create_client(&client).await?;
        tracing::info!(client_id = %client.id, actor = %caller.ctx.email(), "client created");
        self.audit
            .log(AuditRecord::for_entity(&caller.ctx, "created", &client).with_origin(&caller.origin))
            .await;

        Ok(client)
    }

    /// Missing and out-of-scope clients are indistinguishable.
    pub async fn get_client(&self, ctx: &TenantContext, id: &str) -> AppResult<Client> {
        if !ctx.can_access_client(id) {
            return Err(AppError::not_found(CLIENT_NOT_FOUND));
        }
        self.directory
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::not_found(CLIENT_NOT_FOUND))
    }

    pub async fn list_clients(&self, ctx: &TenantContext, status: Option<ClientStatus>) -> AppResult<Vec<Client>> {
        let clients = self.directory.list_clients(status).await?;
        Ok(clients
            .into_iter()
            .filter(|client| ctx.can_access_client(&client.id))
            .collect())
    }

    /// Status changes never cascade to projects or assignments.
    pub async fn update_client_status(
        &self,
        caller: &Caller,
        id: &str,
        status: ClientStatus,
    ) -> AppResult<Client> {
        audited_check(
            &self.audit,
            caller,
            caller.ctx.require_permission(Permission::ManageClients),
            "client.status_changed",
            "client",
            id,
        )
        .await?;

        if !self.directory.update_client_status(id, status).await? {
            return Err(AppError::not_found(CLIENT_NOT_FOUND));
        }
        let client = self
            .directory
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::not_found(CLIENT_NOT_FOUND))?;

        let action = match status {
            ClientStatus::Active => "activated",
            ClientStatus::Inactive => "deactivated",
        };
        tracing::info!(client_id = %id, status = status.as_str(), "client status changed");
        self.audit
            .log(AuditRecord::for_entity(&caller.ctx, action, &client).with_origin(&caller.origin))
            .await;

        Ok(client)
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    pub async fn create_project(&self, caller: &Caller, req: ProjectCreateRequest) -> AppResult<Project> {
        let id = req.id.clone().unwrap_or_else(|| new_id("proj"));
        let check = caller.ctx.require_client_access(&req.client_id).and_then(|_| {
            caller
                .ctx
                .require_permission_in(Permission::ManageProjects, Some(&req.client_id), None)
        });
        audited_check(&self.audit, caller, check, "project.created", "project", &id).await?;

        let name = required("name", &req.name)?;
        if self.directory.get_client(&req.client_id).await?.is_none() {
            return Err(AppError::not_found(CLIENT_NOT_FOUND));
        }

        let now = utc_now();
        let project = Project {
            id,
            client_id: req.client_id,
            name,
            code: req.code,
            status: ProjectStatus::Active,
            description: req.description,
            document_index: req.document_index,
            document_count: 0,
            created_by: caller.ctx.email().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.directory.create_project(&project).await?;
        tracing::info!(project_id = %project.id, client_id = %project.client_id, "project created");
        self.audit
            .log(AuditRecord::for_entity(&caller.ctx, "created", &project).with_origin(&caller.origin))
            .await;

        Ok(project)
    }

    /// A project is visible through a project assignment or its client.
    pub async fn get_project(&self, ctx: &TenantContext, id: &str) -> AppResult<Project> {
        match self.directory.get_project(id).await? {
            Some(project) if project_visible(ctx, &project) => Ok(project),
            _ => Err(AppError::not_found(PROJECT_NOT_FOUND)),
        }
    }

    pub async fn list_projects(
        &self,
        ctx: &TenantContext,
        client_id: Option<&str>,
        status: Option<ProjectStatus>,
    ) -> AppResult<Vec<Project>> {
        let projects = self.directory.list_projects(client_id, status).await?;
        Ok(projects
            .into_iter()
            .filter(|project| project_visible(ctx, project))
            .collect())
    }

    pub async fn update_project_status(
        &self,
        caller: &Caller,
        id: &str,
        status: ProjectStatus,
    ) -> AppResult<Project> {
        let project = self.get_project(&caller.ctx, id).await?;
        let check = caller.ctx.require_client_access(&project.client_id).and_then(|_| {
            caller.ctx.require_permission_in(
                Permission::ManageProjects,
                Some(&project.client_id),
                Some(&project.id),
            )
        });
        audited_check(&self.audit, caller, check, "project.status_changed", "project", id).await?;

        if !self.directory.update_project_status(id, status).await? {
            return Err(AppError::not_found(PROJECT_NOT_FOUND));
        }
        let project = self
            .directory
            .get_project(id)
            .await?
            .ok_or_else(|| AppError::not_found(PROJECT_NOT_FOUND))?;

        tracing::info!(project_id = %id, status = status.as_str(), "project status changed");
        self.audit
            .log(AuditRecord::for_entity(&caller.ctx, "status_changed", &project).with_origin(&caller.origin))
            .await;

        Ok(project)
    }

    // =========================================================================
    // USERS & ASSIGNMENTS
    // =========================================================================

    pub async fn create_user(&self, caller: &Caller, req: UserCreateRequest) -> AppResult<UserProfile> {
        let ctx = &caller.ctx;
        let id = req.id.clone().unwrap_or_else(|| new_id("user"));

        let check = ctx
            .require_permission(Permission::ManageUsers)
            .and_then(|_| ctx.require_grantable(req.role));
        audited_check(&self.audit, caller, check, "user.created", "user", &id).await?;

        let email = normalize_email(&req.email);
        if !email.contains('@') {
            return Err(AppError::validation("email must be a valid address"));
        }
        let name = required("name", &req.name)?;
        if !ctx.is_unrestricted() && req.client_ids.is_empty() && req.project_ids.is_empty() {
            return Err(AppError::validation("at least one client or project scope is required"));
        }

        let mut client_scopes = Vec::with_capacity(req.client_ids.len());
        for client_id in &req.client_ids {
            self.check_client_grant(caller, client_id, "user.created", &id).await?;
            client_scopes.push(client_id.clone());
        }
        let mut project_scopes = Vec::with_capacity(req.project_ids.len());
        for project_id in &req.project_ids {
            let project = self.check_project_grant(caller, project_id, "user.created", &id).await?;
            project_scopes.push(project.id);
        }

        let now = utc_now();
        let profile = UserProfile {
            id,
            email,
            name,
            role: req.role,
            status: UserStatus::Active,
            client_ids: Default::default(),
            project_ids: Default::default(),
            department: req.department,
            title: req.title,
            created_at: now,
            updated_at: now,
        };
        self.directory.create_user(&profile).await?;
        tracing::info!(user_id = %profile.id, role = %profile.role, "user created");
        self.audit
            .log(AuditRecord::for_entity(ctx, "created", &profile).with_origin(&caller.origin))
            .await;

        for client_id in client_scopes {
            let assignment = UserClientAssignment::new(&profile.id, &client_id, req.role, ctx.email(), now);
            self.directory.upsert_client_assignment(&assignment).await?;
            self.audit
                .log(AuditRecord::for_entity(ctx, "assigned", &assignment).with_origin(&caller.origin))
                .await;
        }
        for project_id in project_scopes {
            let assignment = UserProjectAssignment::new(&profile.id, &project_id, req.role, ctx.email(), now);
            self.directory.upsert_project_assignment(&assignment).await?;
            self.audit
                .log(AuditRecord::for_entity(ctx, "assigned", &assignment).with_origin(&caller.origin))
                .await;
        }

        self.directory
            .get_user(&profile.id)
            .await?
            .ok_or_else(|| AppError::internal("created user could not be read back"))
    }

    /// Creates a super admin outside any request, for first-time setup.
    ///
    /// `actor` names the operator tool in the audit entry.
    pub async fn bootstrap_super_admin(&self, actor: &str, email: &str, name: &str) -> AppResult<UserProfile> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AppError::validation("email must be a valid address"));
        }
        let name = required("name", name)?;

        let now = utc_now();
        let profile = UserProfile {
            id: new_id("user"),
            email,
            name,
            role: Role::SuperAdmin,
            status: UserStatus::Active,
            client_ids: Default::default(),
            project_ids: Default::default(),
            department: None,
            title: None,
            created_at: now,
            updated_at: now,
        };
        self.directory.create_user(&profile).await?;

        tracing::info!(user_id = %profile.id, actor, "super admin bootstrapped");
        self.audit
            .log(
                AuditRecord::for_entity(&TenantContext::minimal(actor), "created", &profile)
                    .with_description(format!("super admin {} created by {actor}", profile.email))
                    .critical(),
            )
            .await;

        Ok(profile)
    }

    /// Visible to the user themselves, to super admins, and to callers who
    /// manage users in one of the target's scopes.
    pub async fn get_user(&self, ctx: &TenantContext, id: &str) -> AppResult<UserProfile> {
        let Some(profile) = self.directory.get_user(id).await? else {
            return Err(AppError::not_found(USER_NOT_FOUND));
        };

        let is_self = ctx.user_id() == Some(profile.id.as_str());
        let manages = profile
            .client_ids
            .iter()
            .any(|client_id| ctx.has_permission_in(Permission::ManageUsers, Some(client_id), None))
            || profile
                .project_ids
                .iter()
                .any(|project_id| ctx.has_permission_in(Permission::ManageUsers, None, Some(project_id)));

        if is_self || ctx.is_unrestricted() || manages {
            Ok(profile)
        } else {
            Err(AppError::not_found(USER_NOT_FOUND))
        }
    }

    pub async fn assign_user_to_client(
        &self,
        caller: &Caller,
        user_id: &str,
        req: AssignClientRequest,
    ) -> AppResult<UserClientAssignment> {
        let user = self.require_user(user_id).await?;
        let resource_id = format!("uca-{}-{}", user.id, req.client_id);

        audited_check(
            &self.audit,
            caller,
            caller.ctx.require_grantable(req.role),
            "client_assignment.assigned",
            "client_assignment",
            &resource_id,
        )
        .await?;
        self.check_client_grant(caller, &req.client_id, "client_assignment.assigned", &resource_id)
            .await?;

        let assignment =
            UserClientAssignment::new(&user.id, &req.client_id, req.role, caller.ctx.email(), utc_now());
        self.directory.upsert_client_assignment(&assignment).await?;
        tracing::info!(user_id = %user.id, client_id = %req.client_id, role = %req.role, "client assignment saved");
        self.audit
            .log(AuditRecord::for_entity(&caller.ctx, "assigned", &assignment).with_origin(&caller.origin))
            .await;

        Ok(assignment)
    }

    pub async fn assign_user_to_project(
        &self,
        caller: &Caller,
        user_id: &str,
        req: AssignProjectRequest,
    ) -> AppResult<UserProjectAssignment> {
        let user = self.require_user(user_id).await?;
        let resource_id = format!("upa-{}-{}", user.id, req.project_id);

        audited_check(
            &self.audit,
            caller,
            caller.ctx.require_grantable(req.role),
            "project_assignment.assigned",
            "project_assignment",
            &resource_id,
        )
        .await?;
        let project = self
            .check_project_grant(caller, &req.project_id, "project_assignment.assigned", &resource_id)
            .await?;

        let assignment =
            UserProjectAssignment::new(&user.id, &project.id, req.role, caller.ctx.email(), utc_now());
        self.directory.upsert_project_assignment(&assignment).await?;
        tracing::info!(user_id = %user.id, project_id = %project.id, role = %req.role, "project assignment saved");
        self.audit
            .log(
                AuditRecord::for_entity(&caller.ctx, "assigned", &assignment)
                    .with_scope(Some(&project.client_id), Some(&project.id))
                    .with_origin(&caller.origin),
            )
            .await;

        Ok(assignment)
    }

    pub async fn revoke_client_assignment(&self, caller: &Caller, user_id: &str, client_id: &str) -> AppResult<()> {
        let resource_id = format!("uca-{user_id}-{client_id}");
        self.check_client_grant(caller, client_id, "client_assignment.revoked", &resource_id)
            .await?;

        if !self.directory.delete_client_assignment(user_id, client_id).await? {
            return Err(AppError::not_found("assignment not found"));
        }

        tracing::info!(user_id = %user_id, client_id = %client_id, "client assignment revoked");
        self.audit
            .log(
                AuditRecord::new(&caller.ctx, "client_assignment.revoked", "client_assignment", &resource_id)
                    .with_scope(Some(client_id), None)
                    .with_description(format!("revoked {user_id} from client {client_id}"))
                    .with_origin(&caller.origin)
                    .critical(),
            )
            .await;

        Ok(())
    }

    pub async fn revoke_project_assignment(&self, caller: &Caller, user_id: &str, project_id: &str) -> AppResult<()> {
        let resource_id = format!("upa-{user_id}-{project_id}");
        let project = self
            .check_project_grant(caller, project_id, "project_assignment.revoked", &resource_id)
            .await?;

        if !self.directory.delete_project_assignment(user_id, project_id).await? {
            return Err(AppError::not_found("assignment not found"));
        }

        tracing::info!(user_id = %user_id, project_id = %project_id, "project assignment revoked");
        self.audit
            .log(
                AuditRecord::new(&caller.ctx, "project_assignment.revoked", "project_assignment", &resource_id)
                    .with_scope(Some(&project.client_id), Some(project_id))
                    .with_description(format!("revoked {user_id} from project {project_id}"))
                    .with_origin(&caller.origin)
                    .critical(),
            )
            .await;

        Ok(())
    }

    async fn require_user(&self, user_id: &str) -> AppResult<UserProfile> {
        self.directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
    }

    /// Caller may manage users at `client_id`, and the client exists.
    async fn check_client_grant(
        &self,
        caller: &Caller,
        client_id: &str,
        action: &str,
        resource_id: &str,
    ) -> AppResult<()> {
        let check = caller.ctx.require_client_access(client_id).and_then(|_| {
            caller
                .ctx
                .require_permission_in(Permission::ManageUsers, Some(client_id), None)
        });
        audited_check(&self.audit, caller, check, action, resource_type_of(action), resource_id).await?;

        if self.directory.get_client(client_id).await?.is_none() {
            return Err(AppError::not_found(CLIENT_NOT_FOUND));
        }
        Ok(())
    }

    /// Caller may manage users at the project (directly or through its client).
    ///
    /// Unknown projects are reported exactly like unreachable ones.
    async fn check_project_grant(
        &self,
        caller: &Caller,
        project_id: &str,
        action: &str,
        resource_id: &str,
    ) -> AppResult<Project> {
        let project = self.directory.get_project(project_id).await?;
        let check = project_permission(&caller.ctx, project.as_ref(), project_id, Permission::ManageUsers);
        audited_check(&self.audit, caller, check, action, resource_type_of(action), resource_id).await?;

        project.ok_or_else(|| AppError::not_found(PROJECT_NOT_FOUND))
    }
}

fn project_visible(ctx: &TenantContext, project: &Project) -> bool {
    ctx.can_access_project(&project.id) || ctx.can_access_client(&project.client_id)
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn resource_type_of(action: &str) -> &str {
    action.split_once('.').map_or(action, |(resource, _)| resource)
}
