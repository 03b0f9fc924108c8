use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::tenant::parse_stored;

/// Declared sharing scope of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Project,
    Client,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Project => "project",
            Visibility::Client => "client",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Visibility::Project),
            "client" => Ok(Visibility::Client),
            "public" => Ok(Visibility::Public),
            other => Err(AppError::validation(format!("unknown visibility: {other}"))),
        }
    }
}

/// Owner-approval gate of a document.
///
/// Only `NotRequired` and `AccessGranted` documents are eligible for the access
/// filter. `AccessDenied` is terminal quarantine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    #[default]
    NotRequired,
    PendingAccess,
    AccessGranted,
    AccessDenied,
}

impl AccessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessState::NotRequired => "not_required",
            AccessState::PendingAccess => "pending_access",
            AccessState::AccessGranted => "access_granted",
            AccessState::AccessDenied => "access_denied",
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, AccessState::NotRequired | AccessState::AccessGranted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AccessState::AccessGranted | AccessState::AccessDenied)
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(AccessState::NotRequired),
            "pending_access" => Ok(AccessState::PendingAccess),
            "access_granted" => Ok(AccessState::AccessGranted),
            "access_denied" => Ok(AccessState::AccessDenied),
            other => Err(AppError::validation(format!("unknown access state: {other}"))),
        }
    }
}

/// Visibility-relevant projection of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub visibility: Visibility,
    pub owner_email: Option<String>,
    pub access_state: AccessState,
}

impl DocumentRef {
    /// A project-scoped document with no owner gate.
    pub fn new(id: impl Into<String>, client_id: Option<&str>, project_id: Option<&str>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            client_id: client_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
            visibility: Visibility::Project,
            owner_email: None,
            access_state: AccessState::NotRequired,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_access_state(mut self, access_state: AccessState) -> Self {
        self.access_state = access_state;
        self
    }

    pub fn with_owner(mut self, owner_email: impl Into<String>) -> Self {
        self.owner_email = Some(owner_email.into());
        self
    }

    /// Empty strings are treated as "no assignment".
    pub fn project(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn client(&self) -> Option<&str> {
        self.client_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub title: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub visibility: String,
    pub owner_email: Option<String>,
    pub access_state: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbDocument> for DocumentRef {
    type Error = AppError;

    fn try_from(value: DbDocument) -> Result<Self, Self::Error> {
        Ok(DocumentRef {
            id: value.id,
            title: value.title,
            client_id: value.client_id,
            project_id: value.project_id,
            visibility: parse_stored(&value.visibility)?,
            owner_email: value.owner_email,
            access_state: parse_stored(&value.access_state)?,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentRegisterRequest {
    #[schema(example = "doc-sow-2025-001")]
    pub id: Option<String>,
    #[schema(example = "Statement of Work 2025")]
    pub title: String,
    #[schema(example = "proj-launch")]
    pub project_id: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[schema(example = "owner@client.example")]
    pub owner_email: Option<String>,
    /// Documents owned outside the workspace stay hidden until the owner approves.
    #[serde(default)]
    pub requires_owner_approval: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_required_and_granted_are_eligible() {
        assert!(AccessState::NotRequired.is_eligible());
        assert!(AccessState::AccessGranted.is_eligible());
        assert!(!AccessState::PendingAccess.is_eligible());
        assert!(!AccessState::AccessDenied.is_eligible());
    }

    #[test]
    fn empty_project_id_counts_as_unassigned() {
        let doc = DocumentRef::new("d", Some("client-a"), Some(""));
        assert_eq!(doc.project(), None);
        assert_eq!(doc.client(), Some("client-a"));
    }
}
