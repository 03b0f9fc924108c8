use std::sync::Arc;

use super::context::TenantContext;
use crate::errors::AppResult;
use crate::models::user::UserStatus;
use crate::store::TenantDirectory;
use crate::utils::normalize_email;

/// Builds a `TenantContext` for a verified identity from the tenant directory.
///
/// Resolution never fails: unknown emails, inactive profiles and directory
/// errors all produce `TenantContext::minimal`.
#[derive(Clone)]
pub struct TenantContextResolver {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantContextResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, email: &str) -> TenantContext {
        self.resolve_identity(email, false).await
    }

    /// Resolve with the identity layer's domain-membership flag attached.
    pub async fn resolve_identity(&self, email: &str, is_domain_member: bool) -> TenantContext {
        let email = normalize_email(email);

        match self.lookup(&email).await {
            Ok(Some(ctx)) => ctx.with_domain_member(is_domain_member),
            Ok(None) => TenantContext::minimal(email).with_domain_member(is_domain_member),
            Err(err) => {
                tracing::warn!(
                    email = %email,
                    error = %err,
                    "tenant context lookup failed, using minimal context"
                );
                TenantContext::minimal(email).with_domain_member(is_domain_member)
            }
        }
    }

    async fn lookup(&self, email: &str) -> AppResult<Option<TenantContext>> {
        let Some(profile) = self.directory.get_user_by_email(email).await? else {
            tracing::debug!(email = %email, "no directory profile, using minimal context");
            return Ok(None);
        };

        if profile.status != UserStatus::Active {
            tracing::debug!(
                email = %email,
                status = profile.status.as_str(),
                "profile not active, using minimal context"
            );
            return Ok(None);
        }

        let client_assignments = self.directory.client_assignments(&profile.id).await?;
        let project_assignments = self.directory.project_assignments(&profile.id).await?;

        let mut ctx = TenantContext::new(profile.email.clone(), profile.role)
            .with_user_id(profile.id.clone())
            .with_clients(profile.client_ids.iter().cloned())
            .with_projects(profile.project_ids.iter().cloned());

        for assignment in client_assignments {
            ctx = ctx.with_client_role(assignment.client_id, assignment.role);
        }
        for assignment in project_assignments {
            ctx = ctx.with_project_role(assignment.project_id, assignment.role);
        }

        tracing::debug!(
            email = %email,
            role = %ctx.role(),
            clients = ctx.client_ids().len(),
            projects = ctx.project_ids().len(),
            "tenant context resolved"
        );

        Ok(Some(ctx))
    }
}
