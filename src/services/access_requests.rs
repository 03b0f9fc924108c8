use std::collections::HashSet;
use std::sync::Arc;

use super::audited_check;
use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{AccessFilter, Caller, Permission, Role, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::access_request::{
    AccessRequest, AccessRequestCreateRequest, AccessRequestQuery, AccessRequestStatus, BulkAccessRequest,
    BulkAccessRequestCreateRequest, BulkAccessRequestResponse, Decision, RequestScope,
};
use crate::models::document::{AccessState, DocumentRef};
use crate::store::{AccessRequestStore, DocumentCatalog};
use crate::utils::{new_id, normalize_email, utc_now};

const REQUEST_NOT_FOUND: &str = "access request not found";
const DOCUMENT_NOT_FOUND: &str = "document not found";
const MAX_BULK_DOCUMENTS: usize = 500;
const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

/// Owner-approval workflow over document gate states.
///
/// ```text
/// not_required -> pending_access -> access_granted
///                               \-> access_denied (terminal)
/// ```
#[derive(Clone)]
pub struct AccessWorkflow {
    catalog: Arc<dyn DocumentCatalog>,
    store: Arc<dyn AccessRequestStore>,
    audit: AuditLogger,
}

impl AccessWorkflow {
    pub fn new(catalog: Arc<dyn DocumentCatalog>, store: Arc<dyn AccessRequestStore>, audit: AuditLogger) -> Self {
        Self { catalog, store, audit }
    }

    pub async fn request_access(
        &self,
        caller: &Caller,
        document_id: &str,
        req: AccessRequestCreateRequest,
    ) -> AppResult<AccessRequest> {
        let document = self.requestable_document(caller, document_id).await?;
        let owner_email = resolve_owner(req.owner_email.as_deref(), &document)?;

        let request = new_request(&caller.ctx, &document, &owner_email, req.reason, None);
        self.store
            .open_requests(None, std::slice::from_ref(&request), AccessState::NotRequired)
            .await?;

        tracing::info!(
            request_id = %request.id,
            document_id = %document.id,
            owner = %owner_email,
            "access request opened"
        );
        self.audit
            .log(
                AuditRecord::for_entity(&caller.ctx, "created", &request)
                    .with_scope(document.client(), document.project())
                    .with_origin(&caller.origin),
            )
            .await;

        Ok(request)
    }

    /// Opens one request per document under a shared bulk aggregate. Either
    /// every document moves to `pending_access` or none does.
    pub async fn request_bulk_access(
        &self,
        caller: &Caller,
        req: BulkAccessRequestCreateRequest,
    ) -> AppResult<BulkAccessRequestResponse> {
        let requested_owner = req.owner_email.as_deref().map(owner_address).transpose()?;
        if req.document_ids.is_empty() {
            return Err(AppError::validation("document_ids must not be empty"));
        }
        if req.document_ids.len() > MAX_BULK_DOCUMENTS {
            return Err(AppError::validation(format!(
                "at most {MAX_BULK_DOCUMENTS} documents per bulk request"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = req.document_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(AppError::validation(format!("duplicate document id: {duplicate}")));
        }

        let mut documents = Vec::with_capacity(req.document_ids.len());
        for document_id in &req.document_ids {
            documents.push(self.requestable_document(caller, document_id).await?);
        }

        let owner_email = match requested_owner {
            Some(owner_email) => owner_email,
            None => documents
                .iter()
                .find_map(|document| document.owner_email.clone())
                .ok_or_else(|| AppError::validation("owner_email is required"))?,
        };
        for document in &documents {
            resolve_owner(Some(&owner_email), document)?;
        }

        let now = utc_now();
        let total = documents.len() as i64;
        let bulk = BulkAccessRequest {
            id: new_id("bulk"),
            owner_email: owner_email.clone(),
            requested_by: caller.ctx.email().to_string(),
            total_documents: total,
            pending_count: total,
            approved_count: 0,
            denied_count: 0,
            created_at: now,
            updated_at: now,
        };
        let requests: Vec<AccessRequest> = documents
            .iter()
            .map(|document| new_request(&caller.ctx, document, &owner_email, req.reason.clone(), Some(&bulk.id)))
            .collect();

        self.store
            .open_requests(Some(&bulk), &requests, AccessState::NotRequired)
            .await?;

        tracing::info!(bulk_id = %bulk.id, documents = total, owner = %owner_email, "bulk access request opened");
        self.audit
            .log(
                AuditRecord::for_entity(&caller.ctx, "created", &bulk)
                    .with_description(format!("bulk access request for {total} documents"))
                    .with_origin(&caller.origin),
            )
            .await;
        for (request, document) in requests.iter().zip(&documents) {
            self.audit
                .log(
                    AuditRecord::for_entity(&caller.ctx, "created", request)
                        .with_scope(document.client(), document.project())
                        .with_origin(&caller.origin),
                )
                .await;
        }

        Ok(BulkAccessRequestResponse { bulk, requests })
    }

    pub async fn approve(&self, caller: &Caller, request_id: &str, notes: Option<String>) -> AppResult<AccessRequest> {
        self.transition(caller, request_id, Decision::Approve, notes).await
    }

    pub async fn deny(&self, caller: &Caller, request_id: &str, notes: Option<String>) -> AppResult<AccessRequest> {
        self.transition(caller, request_id, Decision::Deny, notes).await
    }

    async fn transition(
        &self,
        caller: &Caller,
        request_id: &str,
        decision: Decision,
        notes: Option<String>,
    ) -> AppResult<AccessRequest> {
        let ctx = &caller.ctx;
        let action = format!("access_request.{}", decision.status().as_str());

        let Some(request) = self.store.get_request(request_id).await? else {
            return Err(AppError::not_found(REQUEST_NOT_FOUND));
        };
        let document = self.catalog.get_document_metadata(&request.document_id).await?;

        let check = if may_review(ctx, &request, document.as_ref()) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "only the document owner or an administrator of its scope may {} this request",
                decision.action()
            )))
        };
        audited_check(&self.audit, caller, check, &action, "access_request", request_id).await?;

        let completed = match self
            .store
            .complete_request(request_id, decision, ctx.email(), notes.as_deref(), utc_now())
            .await
        {
            Ok(completed) => completed,
            Err(err) => {
                if matches!(err, AppError::Conflict(_)) {
                    self.audit
                        .log(
                            AuditRecord::new(ctx, action.as_str(), "access_request", request_id)
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
            document_id = %completed.document_id,
            decision = decision.action(),
            reviewer = %ctx.email(),
            "access request completed"
        );
        let mut record = AuditRecord::for_entity(ctx, decision.status().as_str(), &completed)
            .with_description(format!(
                "document {} is now {}",
                completed.document_id,
                decision.access_state()
            ))
            .with_origin(&caller.origin);
        if let Some(document) = document.as_ref() {
            record = record.with_scope(document.client(), document.project());
        }
        self.audit.log(record).await;

        Ok(completed)
    }

    /// Visible to requester, owner and scoped reviewers.
    pub async fn get_request(&self, ctx: &TenantContext, request_id: &str) -> AppResult<AccessRequest> {
        let Some(request) = self.store.get_request(request_id).await? else {
            return Err(AppError::not_found(REQUEST_NOT_FOUND));
        };
        if self.may_view(ctx, &request).await? {
            Ok(request)
        } else {
            Err(AppError::not_found(REQUEST_NOT_FOUND))
        }
    }

    /// Requests visible to the caller, newest first.
    ///
    /// The store narrows rows to the caller's own requests and its scopes;
    /// scope matches are then checked for review rights.
    pub async fn list_requests(
        &self,
        ctx: &TenantContext,
        status: Option<AccessRequestStatus>,
        limit: Option<i64>,
    ) -> AppResult<Vec<AccessRequest>> {
        let query = AccessRequestQuery {
            status,
            involving: (!ctx.is_unrestricted()).then(|| request_scope(ctx)),
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        };
        let requests = self.store.list_requests(&query).await?;
        if ctx.is_unrestricted() {
            return Ok(requests);
        }

        let mut visible = Vec::with_capacity(requests.len());
        for request in requests {
            if self.may_view(ctx, &request).await? {
                visible.push(request);
            }
        }
        Ok(visible)
    }

    pub async fn get_bulk(&self, ctx: &TenantContext, bulk_id: &str) -> AppResult<BulkAccessRequest> {
        match self.store.get_bulk(bulk_id).await? {
            Some(bulk)
                if ctx.is_unrestricted()
                    || bulk.requested_by == ctx.email()
                    || bulk.owner_email == ctx.email() =>
            {
                Ok(bulk)
            }
            _ => Err(AppError::not_found("bulk access request not found")),
        }
    }

    async fn may_view(&self, ctx: &TenantContext, request: &AccessRequest) -> AppResult<bool> {
        if ctx.is_unrestricted() || request.requester_email == ctx.email() || request.owner_email == ctx.email() {
            return Ok(true);
        }
        let document = self.catalog.get_document_metadata(&request.document_id).await?;
        Ok(may_review(ctx, request, document.as_ref()))
    }

    /// Loads a document the caller may put behind the owner gate.
    ///
    /// Documents outside the caller's reach are reported as missing; reachable
    /// ones without the upload/manage permission are `Forbidden`.
    async fn requestable_document(&self, caller: &Caller, document_id: &str) -> AppResult<DocumentRef> {
        let ctx = &caller.ctx;
        let document = self.catalog.get_document_metadata(document_id).await?;

        let check = match document.as_ref() {
            None => Err(AppError::not_found(DOCUMENT_NOT_FOUND)),
            Some(doc) if !AccessFilter::in_scope(ctx, doc) => Err(AppError::not_found(DOCUMENT_NOT_FOUND)),
            Some(doc) => {
                let (client_id, project_id) = (doc.client(), doc.project());
                if ctx.has_permission_in(Permission::UploadDocuments, client_id, project_id)
                    || ctx.has_permission_in(Permission::ManageDocuments, client_id, project_id)
                {
                    Ok(())
                } else {
                    Err(AppError::forbidden("permission required: upload_documents"))
                }
            }
        };
        audited_check(&self.audit, caller, check, "access_request.created", "document", document_id).await?;

        let document = document.ok_or_else(|| AppError::not_found(DOCUMENT_NOT_FOUND))?;
        if document.access_state != AccessState::NotRequired {
            let err = AppError::conflict(format!(
                "document {} is {}, only not_required documents can be gated",
                document.id, document.access_state
            ));
            self.audit
                .log(
                    AuditRecord::new(ctx, "access_request.created", "document", document_id)
                        .with_origin(&caller.origin)
                        .failed(&err),
                )
                .await;
            return Err(err);
        }

        Ok(document)
    }
}

/// Owner, `manage_documents` at the project, an account admin (or above) over
/// the client, or a super admin.
fn may_review(ctx: &TenantContext, request: &AccessRequest, document: Option<&DocumentRef>) -> bool {
    if ctx.is_unrestricted() {
        return true;
    }
    if !ctx.is_known() {
        return false;
    }
    if request.owner_email == ctx.email() {
        return true;
    }

    let Some(document) = document else {
        return false;
    };
    let (client_id, project_id) = (document.client(), document.project());

    if project_id.is_some() && ctx.has_permission_in(Permission::ManageDocuments, client_id, project_id) {
        return true;
    }

    client_id.is_some_and(|client| {
        ctx.can_access_client(client) && ctx.effective_role(Some(client), None) >= Role::AccountAdmin
    })
}

/// Rows a non-unrestricted caller can possibly see.
pub(crate) fn request_scope(ctx: &TenantContext) -> RequestScope {
    RequestScope {
        email: ctx.email().to_string(),
        client_ids: ctx.client_ids().iter().cloned().collect(),
        project_ids: ctx.project_ids().iter().cloned().collect(),
    }
}

/// The owner recorded on the document wins. A requested owner is only taken
/// for documents without one, and must not contradict a recorded owner.
fn resolve_owner(requested: Option<&str>, document: &DocumentRef) -> AppResult<String> {
    let requested = requested.map(owner_address).transpose()?;
    match (requested, document.owner_email.as_deref()) {
        (Some(requested), Some(recorded)) if requested != recorded => Err(AppError::validation(format!(
            "owner_email does not match the recorded owner of document {}",
            document.id
        ))),
        (_, Some(recorded)) => Ok(recorded.to_string()),
        (Some(requested), None) => Ok(requested),
        (None, None) => Err(AppError::validation("owner_email is required")),
    }
}

fn owner_address(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("owner_email must be a valid address"));
    }
    Ok(email)
}

fn new_request(
    ctx: &TenantContext,
    document: &DocumentRef,
    owner_email: &str,
    reason: Option<String>,
    bulk_request_id: Option<&str>,
) -> AccessRequest {
    AccessRequest {
        id: new_id("ar"),
        requester_email: ctx.email().to_string(),
        owner_email: owner_email.to_string(),
        document_id: document.id.clone(),
        status: AccessRequestStatus::Pending,
        bulk_request_id: bulk_request_id.map(str::to_string),
        reason,
        requested_at: utc_now(),
        reviewed_at: None,
        reviewed_by: None,
        review_notes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(owner: &str) -> AccessRequest {
        AccessRequest {
            id: "ar-1".to_string(),
            requester_email: "pm@example.com".to_string(),
            owner_email: owner.to_string(),
            document_id: "doc-1".to_string(),
            status: AccessRequestStatus::Pending,
            bulk_request_id: None,
            reason: None,
            requested_at: utc_now(),
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
        }
    }

    fn document() -> DocumentRef {
        DocumentRef::new("doc-1", Some("client-a"), Some("proj-1")).with_access_state(AccessState::PendingAccess)
    }

    #[test]
    fn owner_may_review_without_scope() {
        let ctx = TenantContext::new("owner@client.example", Role::EndUser).with_user_id("u-owner");
        assert!(may_review(&ctx, &request("owner@client.example"), Some(&document())));
    }

    #[test]
    fn unknown_identity_never_reviews_even_as_named_owner() {
        let ctx = TenantContext::minimal("owner@client.example");
        assert!(!may_review(&ctx, &request("owner@client.example"), Some(&document())));
    }

    #[test]
    fn end_user_in_project_may_not_review() {
        let ctx = TenantContext::new("user@example.com", Role::EndUser)
            .with_user_id("u-1")
            .with_projects(["proj-1"]);
        assert!(!may_review(&ctx, &request("owner@client.example"), Some(&document())));
    }

    #[test]
    fn project_admin_and_account_admin_may_review_in_scope() {
        let project_admin = TenantContext::new("pa@example.com", Role::ProjectAdmin)
            .with_user_id("u-pa")
            .with_project_role("proj-1", Role::ProjectAdmin);
        let account_admin = TenantContext::new("aa@example.com", Role::AccountAdmin)
            .with_user_id("u-aa")
            .with_client_role("client-a", Role::AccountAdmin);
        let other_admin = TenantContext::new("ab@example.com", Role::AccountAdmin)
            .with_user_id("u-ab")
            .with_client_role("client-b", Role::AccountAdmin);

        let req = request("owner@client.example");
        assert!(may_review(&project_admin, &req, Some(&document())));
        assert!(may_review(&account_admin, &req, Some(&document())));
        assert!(!may_review(&other_admin, &req, Some(&document())));
    }

    #[test]
    fn recorded_owner_wins_over_the_request_body() {
        let owned = DocumentRef::new("doc-o", Some("client-a"), Some("proj-1")).with_owner("owner@client.example");
        let unowned = document();

        assert_eq!(resolve_owner(None, &owned).unwrap(), "owner@client.example");
        assert_eq!(resolve_owner(Some("OWNER@client.example"), &owned).unwrap(), "owner@client.example");
        assert!(resolve_owner(Some("someone-else@anywhere.example"), &owned).is_err());
        assert_eq!(resolve_owner(Some("a@b.example"), &unowned).unwrap(), "a@b.example");
        assert!(resolve_owner(None, &unowned).is_err());
    }

    #[test]
    fn owner_address_is_normalized() {
        assert_eq!(owner_address(" Owner@Client.Example ").unwrap(), "owner@client.example");
        assert!(owner_address("not-an-email").is_err());
    }
}
