//! Storage seams for the engine.
//!
//! The services only talk to these traits. SQLite implementations live in
//! `crate::db`; the document catalog stands in for the external document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppResult;
use crate::models::access_request::{
    AccessRequest, AccessRequestQuery, AccessRequestStatus, BulkAccessRequest, Decision, RequestScope,
};
use crate::models::document::{AccessState, DocumentRef};
use crate::models::role_request::RoleRequest;
use crate::models::tenant::{Client, ClientStatus, Project, ProjectStatus};
use crate::models::user::{UserClientAssignment, UserProfile, UserProjectAssignment};

/// Owner of clients, projects, user profiles and scope assignments.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn create_client(&self, client: &Client) -> AppResult<()>;
    async fn get_client(&self, id: &str) -> AppResult<Option<Client>>;
    async fn list_clients(&self, status: Option<ClientStatus>) -> AppResult<Vec<Client>>;
    /// Returns false when no client matched.
    async fn update_client_status(&self, id: &str, status: ClientStatus) -> AppResult<bool>;

    async fn create_project(&self, project: &Project) -> AppResult<()>;
    async fn get_project(&self, id: &str) -> AppResult<Option<Project>>;
    async fn list_projects(
        &self,
        client_id: Option<&str>,
        status: Option<ProjectStatus>,
    ) -> AppResult<Vec<Project>>;
    async fn update_project_status(&self, id: &str, status: ProjectStatus) -> AppResult<bool>;

    async fn create_user(&self, user: &UserProfile) -> AppResult<()>;
    async fn get_user(&self, id: &str) -> AppResult<Option<UserProfile>>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<UserProfile>>;

    async fn upsert_client_assignment(&self, assignment: &UserClientAssignment) -> AppResult<()>;
    async fn upsert_project_assignment(&self, assignment: &UserProjectAssignment) -> AppResult<()>;
    async fn delete_client_assignment(&self, user_id: &str, client_id: &str) -> AppResult<bool>;
    async fn delete_project_assignment(&self, user_id: &str, project_id: &str) -> AppResult<bool>;
    async fn client_assignments(&self, user_id: &str) -> AppResult<Vec<UserClientAssignment>>;
    async fn project_assignments(&self, user_id: &str) -> AppResult<Vec<UserProjectAssignment>>;
}

/// Visibility metadata of documents held by the document store.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentRef>>;
    async fn query_documents_by_project(&self, project_id: &str) -> AppResult<Vec<DocumentRef>>;
    /// Inserts the document and counts it on its project in one step.
    async fn insert_document(&self, document: &DocumentRef, created_by: &str) -> AppResult<()>;
    /// Removes the document with its completed access requests and uncounts it
    /// from its project. Fails with `Conflict` while the document is
    /// `pending_access`; returns false when nothing matched.
    async fn delete_document(&self, id: &str) -> AppResult<bool>;
}

/// Persistence for the access request workflow.
///
/// Implementations must apply every method atomically: a request row, its
/// document's gate state and its bulk counters change together or not at all.
#[async_trait]
pub trait AccessRequestStore: Send + Sync {
    /// Inserts the requests (and the bulk aggregate, if any) and moves every
    /// referenced document from `from` to `pending_access`. Fails with
    /// `Conflict` if any document is no longer in `from`.
    async fn open_requests(
        &self,
        bulk: Option<&BulkAccessRequest>,
        requests: &[AccessRequest],
        from: AccessState,
    ) -> AppResult<()>;

    /// Inserts a document that is born in `pending_access` together with its
    /// opening request, counting it on its project.
    async fn register_gated(&self, document: &DocumentRef, created_by: &str, request: &AccessRequest) -> AppResult<()>;

    async fn get_request(&self, id: &str) -> AppResult<Option<AccessRequest>>;
    /// Newest first, at most `query.limit` rows.
    async fn list_requests(&self, query: &AccessRequestQuery) -> AppResult<Vec<AccessRequest>>;

    /// Moves a pending request to its terminal status. Fails with `Conflict`
    /// when the request is no longer pending.
    async fn complete_request(
        &self,
        id: &str,
        decision: Decision,
        reviewed_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<AccessRequest>;

    async fn get_bulk(&self, id: &str) -> AppResult<Option<BulkAccessRequest>>;
}

/// Persistence for role and scope requests.
#[async_trait]
pub trait RoleRequestStore: Send + Sync {
    /// Fails with `Conflict` when the user already has a pending request for
    /// the same scope.
    async fn create_role_request(&self, request: &RoleRequest) -> AppResult<()>;
    async fn get_role_request(&self, id: &str) -> AppResult<Option<RoleRequest>>;
    /// Newest first. `involving` narrows the rows to the caller's own requests
    /// and those on scopes it can reach.
    async fn list_role_requests(
        &self,
        status: Option<AccessRequestStatus>,
        involving: Option<&RequestScope>,
        limit: i64,
    ) -> AppResult<Vec<RoleRequest>>;
    /// Same contract as `AccessRequestStore::complete_request`.
    async fn complete_role_request(
        &self,
        id: &str,
        decision: Decision,
        reviewed_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<RoleRequest>;
}
