use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::access_request::{AccessRequest, BulkAccessRequest};
use crate::models::document::DocumentRef;
use crate::models::role_request::RoleRequest;
use crate::models::tenant::{Client, Project};
use crate::models::user::{UserClientAssignment, UserProfile, UserProjectAssignment};

/// Severity levels for audit entries.
/// Controls retention and review filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Permission changes and rejected decisions: never trimmed
    Critical,
    /// Routine mutations (default)
    #[default]
    Important,
    /// Read-side events
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities whose mutations end up in the audit log.
pub trait Auditable: Send + Sync {
    /// Resource type name, also the prefix of action names like `client.created`.
    fn resource_type() -> &'static str;

    fn resource_id(&self) -> &str;

    fn client_scope(&self) -> Option<&str> {
        None
    }

    fn project_scope(&self) -> Option<&str> {
        None
    }

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Revocations and denials are always critical.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "revoked" | "denied" | "deactivated" => Severity::Critical,
            "viewed" => Severity::Noise,
            _ => self.severity(),
        }
    }
}

impl Auditable for Client {
    fn resource_type() -> &'static str {
        "client"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client_scope(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Auditable for Project {
    fn resource_type() -> &'static str {
        "project"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client_scope(&self) -> Option<&str> {
        Some(&self.client_id)
    }

    fn project_scope(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Auditable for UserProfile {
    fn resource_type() -> &'static str {
        "user"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

impl Auditable for UserClientAssignment {
    fn resource_type() -> &'static str {
        "client_assignment"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client_scope(&self) -> Option<&str> {
        Some(&self.client_id)
    }

    // every assignment widens or narrows someone's permissions
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

impl Auditable for UserProjectAssignment {
    fn resource_type() -> &'static str {
        "project_assignment"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn project_scope(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

impl Auditable for DocumentRef {
    fn resource_type() -> &'static str {
        "document"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client_scope(&self) -> Option<&str> {
        self.client()
    }

    fn project_scope(&self) -> Option<&str> {
        self.project()
    }
}

impl Auditable for AccessRequest {
    fn resource_type() -> &'static str {
        "access_request"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

impl Auditable for BulkAccessRequest {
    fn resource_type() -> &'static str {
        "bulk_access_request"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

impl Auditable for RoleRequest {
    fn resource_type() -> &'static str {
        "role_request"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client_scope(&self) -> Option<&str> {
        self.review_client()
    }

    fn project_scope(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
}
