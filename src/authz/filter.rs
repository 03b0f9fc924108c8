use std::sync::Arc;

use super::context::TenantContext;
use crate::models::document::{DocumentRef, Visibility};
use crate::store::DocumentCatalog;

/// Anything that carries a document's visibility fields.
pub trait HasDocumentRef {
    fn document_ref(&self) -> &DocumentRef;
}

impl HasDocumentRef for DocumentRef {
    fn document_ref(&self) -> &DocumentRef {
        self
    }
}

/// Items that passed the access filter for one context.
///
/// Only `AccessFilter::check` builds this type, so consumers that require it
/// (answer composition) cannot be handed unfiltered documents.
#[derive(Debug, Clone)]
pub struct AccessChecked<T> {
    items: Vec<T>,
    withheld: usize,
}

impl<T> AccessChecked<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of input items removed by the filter.
    pub fn withheld(&self) -> usize {
        self.withheld
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

/// Document visibility evaluator.
///
/// List, direct-fetch and composition paths all go through `is_visible`, so a
/// single document is accessible exactly when it survives `filter_documents`.
#[derive(Clone)]
pub struct AccessFilter {
    catalog: Arc<dyn DocumentCatalog>,
}

impl AccessFilter {
    pub fn new(catalog: Arc<dyn DocumentCatalog>) -> Self {
        Self { catalog }
    }

    /// Visibility predicate.
    ///
    /// Evaluation order:
    /// 1. owner gate not passed (pending or quarantined) -> deny
    /// 2. unrestricted context -> allow
    /// 3. project in scope -> allow
    /// 4. no project, client in scope -> allow
    /// 5. public -> allow
    /// 6. deny
    pub fn is_visible(ctx: &TenantContext, doc: &DocumentRef) -> bool {
        if !doc.access_state.is_eligible() {
            return false;
        }
        if ctx.is_unrestricted() {
            return true;
        }

        match doc.project() {
            Some(project_id) if ctx.project_ids().contains(project_id) => return true,
            Some(_) => {}
            None => {
                if doc.client().is_some_and(|client_id| ctx.client_ids().contains(client_id)) {
                    return true;
                }
            }
        }

        doc.visibility == Visibility::Public
    }

    /// Whether the document sits inside the caller's client or project scope,
    /// regardless of its gate state. Management operations (gating, deletion)
    /// use this instead of `is_visible`.
    pub fn in_scope(ctx: &TenantContext, doc: &DocumentRef) -> bool {
        ctx.is_unrestricted()
            || doc.project().is_some_and(|id| ctx.can_access_project(id))
            || doc.client().is_some_and(|id| ctx.can_access_client(id))
    }

    /// Accessible subset of `docs`, in input order. Pure, no I/O.
    pub fn filter_documents<T: HasDocumentRef>(ctx: &TenantContext, docs: Vec<T>) -> Vec<T> {
        docs.into_iter()
            .filter(|item| Self::is_visible(ctx, item.document_ref()))
            .collect()
    }

    /// Filters `docs` and seals the result for consumers that demand checked input.
    pub fn check<T: HasDocumentRef>(ctx: &TenantContext, docs: Vec<T>) -> AccessChecked<T> {
        let total = docs.len();
        let items = Self::filter_documents(ctx, docs);
        let withheld = total - items.len();

        if withheld > 0 {
            tracing::debug!(
                actor = %ctx.email(),
                kept = items.len(),
                withheld,
                "access filter withheld documents"
            );
        }

        AccessChecked { items, withheld }
    }

    /// Metadata of `doc_id` if the context may see it.
    ///
    /// Missing documents and catalog failures both yield `None`.
    pub async fn load_visible(&self, ctx: &TenantContext, doc_id: &str) -> Option<DocumentRef> {
        let doc = match self.catalog.get_document_metadata(doc_id).await {
            Ok(doc) => doc?,
            Err(err) => {
                tracing::warn!(
                    document_id = %doc_id,
                    error = %err,
                    "document lookup failed, denying access"
                );
                return None;
            }
        };

        Self::is_visible(ctx, &doc).then_some(doc)
    }

    pub async fn can_access_document(&self, ctx: &TenantContext, doc_id: &str) -> bool {
        self.load_visible(ctx, doc_id).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::authz::Role;
    use crate::errors::{AppError, AppResult};
    use crate::models::document::AccessState;

    struct MapCatalog(HashMap<String, DocumentRef>);

    #[async_trait]
    impl DocumentCatalog for MapCatalog {
        async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentRef>> {
            Ok(self.0.get(id).cloned())
        }

        async fn query_documents_by_project(&self, project_id: &str) -> AppResult<Vec<DocumentRef>> {
            Ok(self
                .0
                .values()
                .filter(|d| d.project() == Some(project_id))
                .cloned()
                .collect())
        }

        async fn insert_document(&self, _document: &DocumentRef, _created_by: &str) -> AppResult<()> {
            Ok(())
        }

        async fn delete_document(&self, id: &str) -> AppResult<bool> {
            Ok(self.0.contains_key(id))
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl DocumentCatalog for BrokenCatalog {
        async fn get_document_metadata(&self, _id: &str) -> AppResult<Option<DocumentRef>> {
            Err(AppError::internal("store unavailable"))
        }

        async fn query_documents_by_project(&self, _project_id: &str) -> AppResult<Vec<DocumentRef>> {
            Err(AppError::internal("store unavailable"))
        }

        async fn insert_document(&self, _document: &DocumentRef, _created_by: &str) -> AppResult<()> {
            Err(AppError::internal("store unavailable"))
        }

        async fn delete_document(&self, _id: &str) -> AppResult<bool> {
            Err(AppError::internal("store unavailable"))
        }
    }

    fn sample_docs() -> Vec<DocumentRef> {
        vec![
            DocumentRef::new("p1-doc", Some("client-a"), Some("P1")),
            DocumentRef::new("p2-doc", Some("client-a"), Some("P2")),
            DocumentRef::new("client-doc", Some("client-a"), None).with_visibility(Visibility::Client),
            DocumentRef::new("public-doc", Some("client-b"), Some("P9")).with_visibility(Visibility::Public),
            DocumentRef::new("orphan", None, None),
            DocumentRef::new("pending", Some("client-a"), Some("P1"))
                .with_access_state(AccessState::PendingAccess),
            DocumentRef::new("quarantined", Some("client-a"), Some("P1"))
                .with_access_state(AccessState::AccessDenied),
            DocumentRef::new("granted", Some("client-a"), Some("P1"))
                .with_access_state(AccessState::AccessGranted),
        ]
    }

    fn contexts() -> Vec<TenantContext> {
        vec![
            TenantContext::minimal("nobody@example.com"),
            TenantContext::new("root@example.com", Role::SuperAdmin).with_user_id("u-root"),
            TenantContext::new("user@example.com", Role::EndUser)
                .with_user_id("u-1")
                .with_projects(["P1"]),
            TenantContext::new("admin@example.com", Role::AccountAdmin)
                .with_user_id("u-2")
                .with_clients(["client-a"]),
        ]
    }

    fn ids(docs: &[DocumentRef]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn project_scope_rejects_other_projects_and_client_only_documents() {
        let ctx = TenantContext::new("user@example.com", Role::EndUser)
            .with_user_id("u-1")
            .with_projects(["P1"]);
        let docs = vec![
            DocumentRef::new("in-p1", Some("client-a"), Some("P1")),
            DocumentRef::new("in-p2", Some("client-a"), Some("P2")),
            DocumentRef::new("client-only", Some("client-a"), None).with_visibility(Visibility::Client),
        ];

        let visible = AccessFilter::filter_documents(&ctx, docs);
        assert_eq!(ids(&visible), vec!["in-p1"]);
    }

    #[test]
    fn super_admin_keeps_eligible_input_unchanged() {
        let ctx = TenantContext::new("root@example.com", Role::SuperAdmin).with_user_id("u-root");
        let eligible: Vec<DocumentRef> = sample_docs()
            .into_iter()
            .filter(|d| d.access_state.is_eligible())
            .collect();

        let mut reversed = eligible.clone();
        reversed.reverse();

        assert_eq!(AccessFilter::filter_documents(&ctx, eligible.clone()), eligible);
        assert_eq!(AccessFilter::filter_documents(&ctx, reversed.clone()), reversed);
        assert!(AccessFilter::filter_documents(&ctx, Vec::<DocumentRef>::new()).is_empty());
    }

    #[test]
    fn client_scope_only_covers_unassigned_documents() {
        let ctx = TenantContext::new("admin@example.com", Role::AccountAdmin)
            .with_user_id("u-2")
            .with_clients(["client-a"]);

        let visible = AccessFilter::filter_documents(&ctx, sample_docs());
        assert_eq!(ids(&visible), vec!["client-doc", "public-doc"]);
    }

    #[test]
    fn quarantined_and_pending_documents_never_pass() {
        for ctx in contexts() {
            let visible = AccessFilter::filter_documents(&ctx, sample_docs());
            assert!(!ids(&visible).contains(&"quarantined"));
            assert!(!ids(&visible).contains(&"pending"));
        }
    }

    #[test]
    fn orphan_documents_are_super_admin_only() {
        for ctx in contexts() {
            let visible = AccessFilter::filter_documents(&ctx, sample_docs());
            assert_eq!(ids(&visible).contains(&"orphan"), ctx.is_unrestricted());
        }
    }

    #[test]
    fn check_reports_withheld_count() {
        let ctx = TenantContext::new("user@example.com", Role::EndUser)
            .with_user_id("u-1")
            .with_projects(["P1"]);

        let checked = AccessFilter::check(&ctx, sample_docs());
        assert_eq!(ids(checked.items()), vec!["p1-doc", "public-doc", "granted"]);
        assert_eq!(checked.withheld(), 5);
    }

    #[test]
    fn scope_ignores_gate_but_not_tenancy() {
        let ctx = TenantContext::new("pm@example.com", Role::ProjectAdmin)
            .with_user_id("u-pm")
            .with_projects(["P1"]);
        let gated = DocumentRef::new("gated", Some("client-a"), Some("P1")).with_access_state(AccessState::AccessDenied);
        let foreign = DocumentRef::new("foreign", Some("client-b"), Some("P9")).with_visibility(Visibility::Public);

        assert!(!AccessFilter::is_visible(&ctx, &gated));
        assert!(AccessFilter::in_scope(&ctx, &gated));
        assert!(AccessFilter::is_visible(&ctx, &foreign));
        assert!(!AccessFilter::in_scope(&ctx, &foreign));
    }

    #[tokio::test]
    async fn single_document_check_matches_list_filter() {
        let docs = sample_docs();
        let catalog = MapCatalog(docs.iter().map(|d| (d.id.clone(), d.clone())).collect());
        let filter = AccessFilter::new(Arc::new(catalog));

        for ctx in contexts() {
            for doc in &docs {
                let listed = !AccessFilter::filter_documents(&ctx, vec![doc.clone()]).is_empty();
                let direct = filter.can_access_document(&ctx, &doc.id).await;
                assert_eq!(listed, direct, "divergence for {} as {}", doc.id, ctx.email());
            }
        }
    }

    #[tokio::test]
    async fn unknown_document_is_not_accessible() {
        let filter = AccessFilter::new(Arc::new(MapCatalog(HashMap::new())));
        let ctx = TenantContext::new("root@example.com", Role::SuperAdmin).with_user_id("u-root");

        assert!(!filter.can_access_document(&ctx, "missing").await);
    }

    #[tokio::test]
    async fn catalog_failure_fails_closed() {
        let filter = AccessFilter::new(Arc::new(BrokenCatalog));
        let ctx = TenantContext::new("root@example.com", Role::SuperAdmin).with_user_id("u-root");

        assert!(!filter.can_access_document(&ctx, "any").await);
    }
}
