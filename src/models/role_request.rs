use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::Role;
use crate::errors::AppError;
use crate::models::access_request::AccessRequestStatus;
use crate::models::tenant::parse_stored;

/// A user asking for a role on one client or one project.
///
/// Exactly one of `client_id` and `project_id` is set. Approval goes through
/// the regular assignment path, so grant rules are the same as for a direct
/// assignment by the reviewer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleRequest {
    pub id: String,
    pub user_id: String,
    pub requester_email: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub requested_role: Role,
    pub status: AccessRequestStatus,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    /// Client owning `project_id`, when the project exists.
    #[serde(skip)]
    pub project_client_id: Option<String>,
}

impl RoleRequest {
    /// Client the request is reviewed under.
    pub fn review_client(&self) -> Option<&str> {
        self.client_id.as_deref().or(self.project_client_id.as_deref())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRoleRequest {
    pub id: String,
    pub user_id: String,
    pub requester_email: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub requested_role: String,
    pub status: String,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub project_client_id: Option<String>,
}

impl TryFrom<DbRoleRequest> for RoleRequest {
    type Error = AppError;

    fn try_from(value: DbRoleRequest) -> Result<Self, Self::Error> {
        Ok(RoleRequest {
            requested_role: parse_stored(&value.requested_role)?,
            status: parse_stored(&value.status)?,
            id: value.id,
            user_id: value.user_id,
            requester_email: value.requester_email,
            client_id: value.client_id,
            project_id: value.project_id,
            reason: value.reason,
            requested_at: value.requested_at,
            reviewed_at: value.reviewed_at,
            reviewed_by: value.reviewed_by,
            review_notes: value.review_notes,
            project_client_id: value.project_client_id,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequestCreateRequest {
    #[schema(example = "client-acme")]
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub requested_role: Role,
    pub reason: Option<String>,
}
