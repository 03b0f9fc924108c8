use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;

use super::{Permission, Role};
use crate::errors::{AppError, AppResult};

/// Resolved, per-request authorization snapshot for one identity.
///
/// Built by `TenantContextResolver` and never mutated afterwards. `is_unrestricted`
/// is the only way to see every tenant; empty id sets always mean "none".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TenantContext {
    email: String,
    user_id: Option<String>,
    role: Role,
    #[schema(value_type = Vec<Permission>)]
    permissions: BTreeSet<Permission>,
    #[schema(value_type = Vec<String>)]
    client_ids: BTreeSet<String>,
    #[schema(value_type = Vec<String>)]
    project_ids: BTreeSet<String>,
    #[schema(value_type = Object)]
    client_roles: BTreeMap<String, Role>,
    #[schema(value_type = Object)]
    project_roles: BTreeMap<String, Role>,
    is_unrestricted: bool,
    is_domain_member: bool,
}

impl TenantContext {
    /// Context for a directory user holding `role` globally.
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            user_id: None,
            role,
            permissions: role.permissions().iter().copied().collect(),
            client_ids: BTreeSet::new(),
            project_ids: BTreeSet::new(),
            client_roles: BTreeMap::new(),
            project_roles: BTreeMap::new(),
            is_unrestricted: role == Role::SuperAdmin,
            is_domain_member: false,
        }
    }

    /// Fail-closed context for identities without a usable directory record.
    pub fn minimal(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            user_id: None,
            role: Role::EndUser,
            permissions: BTreeSet::new(),
            client_ids: BTreeSet::new(),
            project_ids: BTreeSet::new(),
            client_roles: BTreeMap::new(),
            project_roles: BTreeMap::new(),
            is_unrestricted: false,
            is_domain_member: false,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_clients<I, S>(mut self, client_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_ids.extend(client_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_projects<I, S>(mut self, project_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_ids.extend(project_ids.into_iter().map(Into::into));
        self
    }

    /// Role held at one client through an assignment record.
    pub fn with_client_role(mut self, client_id: impl Into<String>, role: Role) -> Self {
        let client_id = client_id.into();
        self.client_ids.insert(client_id.clone());
        self.client_roles.insert(client_id, role);
        self
    }

    /// Role held at one project through an assignment record.
    pub fn with_project_role(mut self, project_id: impl Into<String>, role: Role) -> Self {
        let project_id = project_id.into();
        self.project_ids.insert(project_id.clone());
        self.project_roles.insert(project_id, role);
        self
    }

    pub fn with_domain_member(mut self, is_domain_member: bool) -> Self {
        self.is_domain_member = is_domain_member;
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    pub fn client_ids(&self) -> &BTreeSet<String> {
        &self.client_ids
    }

    pub fn project_ids(&self) -> &BTreeSet<String> {
        &self.project_ids
    }

    pub fn is_unrestricted(&self) -> bool {
        self.is_unrestricted
    }

    pub fn is_domain_member(&self) -> bool {
        self.is_domain_member
    }

    /// True when the identity was matched to an active directory profile.
    pub fn is_known(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn can_access_client(&self, client_id: &str) -> bool {
        self.is_unrestricted || self.client_ids.contains(client_id)
    }

    pub fn can_access_project(&self, project_id: &str) -> bool {
        self.is_unrestricted || self.project_ids.contains(project_id)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_unrestricted || self.permissions.contains(&permission)
    }

    /// Role that applies when acting on the given scope.
    ///
    /// A project assignment wins over a client assignment, which wins over the
    /// profile role.
    pub fn effective_role(&self, client_id: Option<&str>, project_id: Option<&str>) -> Role {
        if let Some(role) = project_id.and_then(|id| self.project_roles.get(id)) {
            return *role;
        }
        if let Some(role) = client_id.and_then(|id| self.client_roles.get(id)) {
            return *role;
        }
        self.role
    }

    /// Permission check bound to a client/project scope.
    ///
    /// The caller must be able to reach the scope and the effective role at that
    /// scope must grant the permission.
    pub fn has_permission_in(
        &self,
        permission: Permission,
        client_id: Option<&str>,
        project_id: Option<&str>,
    ) -> bool {
        if self.is_unrestricted {
            return true;
        }
        if !self.is_known() {
            return false;
        }

        let in_scope = project_id.is_some_and(|id| self.can_access_project(id))
            || client_id.is_some_and(|id| self.can_access_client(id));
        if !in_scope {
            return false;
        }

        self.effective_role(client_id, project_id).grants(permission)
    }

    pub fn require_role(&self, min_role: Role) -> AppResult<()> {
        if self.is_known() && self.role >= min_role {
            return Ok(());
        }
        Err(AppError::forbidden(format!("role required: {min_role}")))
    }

    pub fn require_permission(&self, permission: Permission) -> AppResult<()> {
        if self.has_permission(permission) {
            return Ok(());
        }
        Err(AppError::forbidden(format!("permission required: {permission}")))
    }

    pub fn require_permission_in(
        &self,
        permission: Permission,
        client_id: Option<&str>,
        project_id: Option<&str>,
    ) -> AppResult<()> {
        if self.has_permission_in(permission, client_id, project_id) {
            return Ok(());
        }
        Err(AppError::forbidden(format!("permission required: {permission}")))
    }

    pub fn require_client_access(&self, client_id: &str) -> AppResult<()> {
        if self.can_access_client(client_id) {
            return Ok(());
        }
        Err(AppError::forbidden(format!("client access required: {client_id}")))
    }

    pub fn require_project_access(&self, project_id: &str) -> AppResult<()> {
        if self.can_access_project(project_id) {
            return Ok(());
        }
        Err(AppError::forbidden(format!("project access required: {project_id}")))
    }

    /// Callers may only hand out roles up to their own.
    pub fn require_grantable(&self, role: Role) -> AppResult<()> {
        if self.is_unrestricted || role <= self.role {
            return Ok(());
        }
        Err(AppError::forbidden(format!("cannot grant role above own: {role}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_is_unrestricted_with_empty_scopes() {
        let ctx = TenantContext::new("root@example.com", Role::SuperAdmin).with_user_id("u-root");

        assert!(ctx.is_unrestricted());
        assert!(ctx.client_ids().is_empty());
        assert!(ctx.can_access_client("any-client"));
        assert!(ctx.can_access_project("any-project"));
        assert!(ctx.has_permission(Permission::ManageSystem));
    }

    #[test]
    fn empty_scopes_mean_none_for_other_roles() {
        let ctx = TenantContext::new("admin@example.com", Role::AccountAdmin).with_user_id("u-1");

        assert!(!ctx.is_unrestricted());
        assert!(!ctx.can_access_client("client-a"));
        assert!(!ctx.can_access_project("proj-1"));
    }

    #[test]
    fn minimal_context_holds_nothing() {
        let ctx = TenantContext::minimal("stranger@example.com");

        assert_eq!(ctx.role(), Role::EndUser);
        assert!(ctx.permissions().is_empty());
        assert!(!ctx.has_permission(Permission::ViewDocuments));
        assert!(ctx.require_role(Role::EndUser).is_err());
        assert!(!ctx.has_permission_in(Permission::ViewDocuments, None, Some("proj-1")));
    }

    #[test]
    fn account_admin_client_access_guard() {
        let ctx = TenantContext::new("admin@a.example", Role::AccountAdmin)
            .with_user_id("u-a")
            .with_clients(["client-A"]);

        assert!(ctx.require_client_access("client-A").is_ok());
        let err = ctx.require_client_access("client-B").unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn assignment_role_overrides_profile_role_at_that_scope() {
        let ctx = TenantContext::new("pm@example.com", Role::EndUser)
            .with_user_id("u-pm")
            .with_projects(["proj-1"])
            .with_project_role("proj-2", Role::ProjectAdmin);

        assert_eq!(ctx.effective_role(None, Some("proj-2")), Role::ProjectAdmin);
        assert_eq!(ctx.effective_role(None, Some("proj-1")), Role::EndUser);
        assert!(ctx.has_permission_in(Permission::ManageDocuments, None, Some("proj-2")));
        assert!(!ctx.has_permission_in(Permission::ManageDocuments, None, Some("proj-1")));
        // out of scope even though the role would grant it
        assert!(!ctx.has_permission_in(Permission::ViewDocuments, None, Some("proj-9")));
    }

    #[test]
    fn cannot_grant_above_own_role() {
        let ctx = TenantContext::new("admin@example.com", Role::AccountAdmin).with_user_id("u-1");

        assert!(ctx.require_grantable(Role::ProjectAdmin).is_ok());
        assert!(ctx.require_grantable(Role::AccountAdmin).is_ok());
        assert!(ctx.require_grantable(Role::SuperAdmin).is_err());
    }
}
