use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::{Permission, Role};
use crate::errors::AppError;
use crate::models::tenant::parse_stored;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(AppError::validation(format!("unknown user status: {other}"))),
        }
    }
}

/// User profile with its global role and scope assignments.
///
/// `client_ids` and `project_ids` are read from the assignment tables. For a
/// super admin they are conventionally empty and mean "all".
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    #[schema(value_type = Vec<String>)]
    pub client_ids: BTreeSet<String>,
    #[schema(value_type = Vec<String>)]
    pub project_ids: BTreeSet<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn into_profile(
        self,
        client_ids: BTreeSet<String>,
        project_ids: BTreeSet<String>,
    ) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            role: parse_stored(&self.role)?,
            status: parse_stored(&self.status)?,
            id: self.id,
            email: self.email,
            name: self.name,
            client_ids,
            project_ids,
            department: self.department,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    pub id: Option<String>,
    #[schema(example = "ada@acme.example")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    pub role: Role,
    /// Initial client scopes, granted at the profile role.
    #[serde(default)]
    pub client_ids: Vec<String>,
    /// Initial project scopes, granted at the profile role.
    #[serde(default)]
    pub project_ids: Vec<String>,
    pub department: Option<String>,
    pub title: Option<String>,
}

// =============================================================================
// SCOPE ASSIGNMENTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserClientAssignment {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub role: Role,
    /// Snapshot of the role's permissions when the assignment was made.
    pub permissions: Vec<Permission>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl UserClientAssignment {
    pub fn new(user_id: &str, client_id: &str, role: Role, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("uca-{user_id}-{client_id}"),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            role,
            permissions: role.permissions().to_vec(),
            created_by: created_by.to_string(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProjectAssignment {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl UserProjectAssignment {
    pub fn new(user_id: &str, project_id: &str, role: Role, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("upa-{user_id}-{project_id}"),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            role,
            permissions: role.permissions().to_vec(),
            created_by: created_by.to_string(),
            created_at: now,
        }
    }
}

/// Row shape shared by both assignment tables; `scope_id` is the client or project id.
#[derive(Debug, Clone, FromRow)]
pub struct DbAssignment {
    pub id: String,
    pub user_id: String,
    pub scope_id: String,
    pub role: String,
    pub permissions: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl DbAssignment {
    fn parts(&self) -> Result<(Role, Vec<Permission>), AppError> {
        let role = parse_stored(&self.role)?;
        let permissions = serde_json::from_str(&self.permissions)
            .map_err(|err| AppError::internal(format!("invalid permission snapshot: {err}")))?;
        Ok((role, permissions))
    }
}

impl TryFrom<DbAssignment> for UserClientAssignment {
    type Error = AppError;

    fn try_from(value: DbAssignment) -> Result<Self, Self::Error> {
        let (role, permissions) = value.parts()?;
        Ok(UserClientAssignment {
            id: value.id,
            user_id: value.user_id,
            client_id: value.scope_id,
            role,
            permissions,
            created_by: value.created_by,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<DbAssignment> for UserProjectAssignment {
    type Error = AppError;

    fn try_from(value: DbAssignment) -> Result<Self, Self::Error> {
        let (role, permissions) = value.parts()?;
        Ok(UserProjectAssignment {
            id: value.id,
            user_id: value.user_id,
            project_id: value.scope_id,
            role,
            permissions,
            created_by: value.created_by,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignClientRequest {
    #[schema(example = "client-acme")]
    pub client_id: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignProjectRequest {
    #[schema(example = "proj-launch")]
    pub project_id: String,
    pub role: Role,
}
