use std::sync::Arc;

use super::{audited_check, project_permission};
use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{AccessFilter, Caller, Permission};
use crate::errors::{AppError, AppResult};
use crate::models::access_request::{AccessRequest, AccessRequestStatus};
use crate::models::document::{AccessState, DocumentRef, DocumentRegisterRequest};
use crate::store::{AccessRequestStore, DocumentCatalog, TenantDirectory};
use crate::utils::{new_id, normalize_email, utc_now};

const DOCUMENT_NOT_FOUND: &str = "document not found";

/// Document registration and filtered reads.
#[derive(Clone)]
pub struct DocumentRegistry {
    directory: Arc<dyn TenantDirectory>,
    catalog: Arc<dyn DocumentCatalog>,
    requests: Arc<dyn AccessRequestStore>,
    filter: AccessFilter,
    audit: AuditLogger,
}

impl DocumentRegistry {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        catalog: Arc<dyn DocumentCatalog>,
        requests: Arc<dyn AccessRequestStore>,
        filter: AccessFilter,
        audit: AuditLogger,
    ) -> Self {
        Self {
            directory,
            catalog,
            requests,
            filter,
            audit,
        }
    }

    /// Registers a document under a project. Documents that need owner
    /// approval start in `pending_access` with an open access request.
    pub async fn register_document(&self, caller: &Caller, req: DocumentRegisterRequest) -> AppResult<DocumentRef> {
        let ctx = &caller.ctx;
        let id = req.id.clone().unwrap_or_else(|| new_id("doc"));

        let project = self.directory.get_project(&req.project_id).await?;
        let check = project_permission(ctx, project.as_ref(), &req.project_id, Permission::UploadDocuments);
        audited_check(&self.audit, caller, check, "document.registered", "document", &id).await?;
        let project = project.ok_or_else(|| AppError::not_found("project not found"))?;

        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }
        let owner_email = req.owner_email.as_deref().map(normalize_email);
        if req.requires_owner_approval && owner_email.is_none() {
            return Err(AppError::validation("owner_email is required when owner approval is required"));
        }

        let access_state = if req.requires_owner_approval {
            AccessState::PendingAccess
        } else {
            AccessState::NotRequired
        };
        let mut document = DocumentRef::new(id, Some(&project.client_id), Some(&project.id))
            .with_visibility(req.visibility)
            .with_access_state(access_state);
        document.title = title.to_string();
        document.owner_email = owner_email.clone();

        // gated documents are born together with their opening request
        let gate = owner_email.filter(|_| req.requires_owner_approval).map(|owner_email| AccessRequest {
            id: new_id("ar"),
            requester_email: ctx.email().to_string(),
            owner_email,
            document_id: document.id.clone(),
            status: AccessRequestStatus::Pending,
            bulk_request_id: None,
            reason: Some("owner approval required at registration".to_string()),
            requested_at: utc_now(),
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
        });
        match gate.as_ref() {
            Some(request) => self.requests.register_gated(&document, ctx.email(), request).await?,
            None => self.catalog.insert_document(&document, ctx.email()).await?,
        }

        tracing::info!(
            document_id = %document.id,
            project_id = %project.id,
            access_state = %document.access_state,
            "document registered"
        );
        self.audit
            .log(AuditRecord::for_entity(ctx, "registered", &document).with_origin(&caller.origin))
            .await;
        if let Some(request) = gate.as_ref() {
            self.audit
                .log(
                    AuditRecord::for_entity(ctx, "created", request)
                        .with_scope(document.client(), document.project())
                        .with_origin(&caller.origin),
                )
                .await;
        }

        Ok(document)
    }

    /// Direct fetch. Missing and inaccessible documents yield the same
    /// `NotFound`; every outcome is audited.
    pub async fn get_document(&self, caller: &Caller, id: &str) -> AppResult<DocumentRef> {
        match self.filter.load_visible(&caller.ctx, id).await {
            Some(document) => {
                self.audit
                    .log(AuditRecord::for_entity(&caller.ctx, "viewed", &document).with_origin(&caller.origin))
                    .await;
                Ok(document)
            }
            None => {
                let err = AppError::not_found(DOCUMENT_NOT_FOUND);
                self.audit
                    .log(
                        AuditRecord::new(&caller.ctx, "document.viewed", "document", id)
                            .with_origin(&caller.origin)
                            .failed(&err),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Removes a document from the catalog.
    ///
    /// Documents outside the caller's scope are reported like missing ones.
    /// Inside the scope `delete_documents` is required, and a document waiting
    /// on its owner must be decided first.
    pub async fn delete_document(&self, caller: &Caller, id: &str) -> AppResult<()> {
        let ctx = &caller.ctx;
        let document = self.catalog.get_document_metadata(id).await?;

        let check = match document.as_ref() {
            Some(doc) if AccessFilter::in_scope(ctx, doc) => {
                ctx.require_permission_in(Permission::DeleteDocuments, doc.client(), doc.project())
            }
            _ => Err(AppError::not_found(DOCUMENT_NOT_FOUND)),
        };
        audited_check(&self.audit, caller, check, "document.deleted", "document", id).await?;
        let document = document.ok_or_else(|| AppError::not_found(DOCUMENT_NOT_FOUND))?;

        match self.catalog.delete_document(id).await {
            Ok(true) => {}
            Ok(false) => return Err(AppError::not_found(DOCUMENT_NOT_FOUND)),
            Err(err) => {
                if matches!(err, AppError::Conflict(_)) {
                    self.audit
                        .log(
                            AuditRecord::for_entity(ctx, "deleted", &document)
                                .with_origin(&caller.origin)
                                .failed(&err),
                        )
                        .await;
                }
                return Err(err);
            }
        }

        tracing::info!(document_id = %id, actor = %ctx.email(), "document deleted");
        self.audit
            .log(
                AuditRecord::for_entity(ctx, "deleted", &document)
                    .with_origin(&caller.origin)
                    .critical(),
            )
            .await;

        Ok(())
    }

    /// Project listing, filtered again so gated documents never leak.
    pub async fn list_project_documents(&self, caller: &Caller, project_id: &str) -> AppResult<Vec<DocumentRef>> {
        audited_check(
            &self.audit,
            caller,
            caller.ctx.require_project_access(project_id),
            "project.documents_listed",
            "project",
            project_id,
        )
        .await?;

        let documents = self.catalog.query_documents_by_project(project_id).await?;
        Ok(AccessFilter::filter_documents(&caller.ctx, documents))
    }
}
