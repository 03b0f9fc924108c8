use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for ClientStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ClientStatus::Active),
            "inactive" => Ok(ClientStatus::Inactive),
            other => Err(AppError::validation(format!("unknown client status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub status: ClientStatus,
    pub created_by: String,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub industry: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbClient {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub status: String,
    pub created_by: String,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub industry: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbClient> for Client {
    type Error = AppError;

    fn try_from(value: DbClient) -> Result<Self, Self::Error> {
        Ok(Client {
            status: parse_stored(&value.status)?,
            id: value.id,
            name: value.name,
            domain: value.domain,
            created_by: value.created_by,
            contact_email: value.contact_email,
            contact_name: value.contact_name,
            industry: value.industry,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientCreateRequest {
    #[schema(example = "client-acme")]
    pub id: Option<String>,
    #[schema(example = "Acme Corp")]
    pub name: String,
    #[schema(example = "acme.example")]
    pub domain: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub industry: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// PROJECT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "archived" => Ok(ProjectStatus::Archived),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(AppError::validation(format!("unknown project status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub code: Option<String>,
    pub status: ProjectStatus,
    pub description: Option<String>,
    /// Reference to the external document index (e.g. a sheet URL).
    pub document_index: Option<String>,
    /// Eventually consistent counter maintained by document registration.
    pub document_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub code: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub document_index: Option<String>,
    pub document_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbProject> for Project {
    type Error = AppError;

    fn try_from(value: DbProject) -> Result<Self, Self::Error> {
        Ok(Project {
            status: parse_stored(&value.status)?,
            id: value.id,
            client_id: value.client_id,
            name: value.name,
            code: value.code,
            description: value.description,
            document_index: value.document_index,
            document_count: value.document_count,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "proj-launch")]
    pub id: Option<String>,
    #[schema(example = "client-acme")]
    pub client_id: String,
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "LP")]
    pub code: Option<String>,
    pub description: Option<String>,
    pub document_index: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientStatusUpdateRequest {
    pub status: ClientStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectStatusUpdateRequest {
    pub status: ProjectStatus,
}

/// Parse a stored enum column, reporting corruption as an internal error.
pub(crate) fn parse_stored<T: FromStr<Err = AppError>>(raw: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|err: AppError| AppError::internal(format!("invalid stored value: {err}")))
}
