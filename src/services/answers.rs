//! Pre-filtering boundary in front of answer composition.
//!
//! Retrieval hands over candidate passages; the boundary re-reads document
//! metadata from the catalog, runs the access filter and only then lets the
//! composer see any content. `AnswerComposer` accepts `AccessChecked` input
//! only, so there is no compose-then-filter path.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::{AuditLogger, AuditRecord};
use crate::authz::{AccessChecked, AccessFilter, Caller, HasDocumentRef, Permission, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::document::DocumentRef;
use crate::store::DocumentCatalog;
use crate::utils::new_id;

/// Retrieved passage as supplied by the retrieval layer. Scope fields are
/// never taken from here.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnswerCandidate {
    #[schema(example = "doc-sow-2025-001")]
    pub document_id: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    #[schema(example = "What is the delivery date?")]
    pub question: String,
    pub candidates: Vec<AnswerCandidate>,
}

/// Candidate joined with authoritative catalog metadata.
#[derive(Debug, Clone)]
pub struct CandidatePassage {
    pub document: DocumentRef,
    pub snippet: String,
}

impl HasDocumentRef for CandidatePassage {
    fn document_ref(&self) -> &DocumentRef {
        &self.document
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Citation {
    pub document_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComposedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Candidates dropped before composition (unknown or inaccessible).
    pub withheld: usize,
}

/// Turns access-checked passages into an answer.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(&self, question: &str, passages: &AccessChecked<CandidatePassage>) -> AppResult<ComposedAnswer>;
}

/// Quotes the passages it was given, one line per passage, and cites each
/// document once.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveComposer;

pub const NO_ACCESSIBLE_CONTENT: &str = "No accessible documents contain an answer to this question.";

#[async_trait]
impl AnswerComposer for ExtractiveComposer {
    async fn compose(&self, _question: &str, passages: &AccessChecked<CandidatePassage>) -> AppResult<ComposedAnswer> {
        if passages.is_empty() {
            return Ok(ComposedAnswer {
                answer: NO_ACCESSIBLE_CONTENT.to_string(),
                citations: Vec::new(),
            });
        }

        let mut lines = Vec::with_capacity(passages.len());
        let mut citations: Vec<Citation> = Vec::new();
        for passage in passages.items() {
            lines.push(format!("{} [{}]", passage.snippet.trim(), passage.document.id));
            if !citations.iter().any(|c| c.document_id == passage.document.id) {
                citations.push(Citation {
                    document_id: passage.document.id.clone(),
                    title: passage.document.title.clone(),
                });
            }
        }

        Ok(ComposedAnswer {
            answer: lines.join("\n"),
            citations,
        })
    }
}

#[derive(Clone)]
pub struct AnswerBoundary {
    catalog: Arc<dyn DocumentCatalog>,
    composer: Arc<dyn AnswerComposer>,
    audit: Option<AuditLogger>,
}

impl AnswerBoundary {
    pub fn new(catalog: Arc<dyn DocumentCatalog>, composer: Arc<dyn AnswerComposer>) -> Self {
        Self {
            catalog,
            composer,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// `compose` for a request, with the outcome appended to the audit log.
    pub async fn answer(
        &self,
        caller: &Caller,
        question: &str,
        candidates: Vec<AnswerCandidate>,
    ) -> AppResult<AnswerResponse> {
        let submitted = candidates.len();
        let result = self.compose(&caller.ctx, question, candidates).await;

        if let Some(audit) = self.audit.as_ref() {
            let record = AuditRecord::new(&caller.ctx, "answer.composed", "answer", new_id("answer"))
                .with_origin(&caller.origin);
            let record = match result.as_ref() {
                Ok(response) => {
                    let cited: Vec<&str> = response.citations.iter().map(|c| c.document_id.as_str()).collect();
                    Some(
                        record
                            .with_description(format!(
                                "{submitted} candidates, {} withheld, cited [{}]",
                                response.withheld,
                                cited.join(", ")
                            ))
                            .noise(),
                    )
                }
                Err(err) if err.is_forbidden() => Some(record.failed(err)),
                Err(_) => None,
            };
            if let Some(record) = record {
                audit.log(record).await;
            }
        }

        result
    }

    pub async fn compose(
        &self,
        ctx: &TenantContext,
        question: &str,
        candidates: Vec<AnswerCandidate>,
    ) -> AppResult<AnswerResponse> {
        ctx.require_permission(Permission::ChatWithDocuments)?;
        if question.trim().is_empty() {
            return Err(AppError::validation("question must not be empty"));
        }

        let submitted = candidates.len();
        let mut passages = Vec::with_capacity(submitted);
        for candidate in candidates {
            // unknown ids are dropped and count as withheld
            if let Some(document) = self.catalog.get_document_metadata(&candidate.document_id).await? {
                passages.push(CandidatePassage {
                    document,
                    snippet: candidate.snippet,
                });
            }
        }

        let checked = AccessFilter::check(ctx, passages);
        let withheld = submitted - checked.len();
        let composed = self.composer.compose(question, &checked).await?;

        tracing::info!(
            actor = %ctx.email(),
            candidates = submitted,
            used = checked.len(),
            withheld,
            "answer composed"
        );

        Ok(AnswerResponse {
            answer: composed.answer,
            citations: composed.citations,
            withheld,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::authz::Role;
    use crate::models::document::AccessState;

    struct MapCatalog(HashMap<String, DocumentRef>);

    #[async_trait]
    impl DocumentCatalog for MapCatalog {
        async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentRef>> {
            Ok(self.0.get(id).cloned())
        }

        async fn query_documents_by_project(&self, _project_id: &str) -> AppResult<Vec<DocumentRef>> {
            Ok(Vec::new())
        }

        async fn insert_document(&self, _document: &DocumentRef, _created_by: &str) -> AppResult<()> {
            Ok(())
        }

        async fn delete_document(&self, id: &str) -> AppResult<bool> {
            Ok(self.0.contains_key(id))
        }
    }

    fn boundary() -> AnswerBoundary {
        let docs = [
            DocumentRef::new("a", Some("client-a"), Some("proj-1")),
            DocumentRef::new("b", Some("client-a"), Some("proj-2")),
            DocumentRef::new("q", Some("client-a"), Some("proj-1")).with_access_state(AccessState::AccessDenied),
        ];
        let catalog = MapCatalog(docs.into_iter().map(|d| (d.id.clone(), d)).collect());
        AnswerBoundary::new(Arc::new(catalog), Arc::new(ExtractiveComposer))
    }

    fn candidate(id: &str, snippet: &str) -> AnswerCandidate {
        AnswerCandidate {
            document_id: id.to_string(),
            snippet: snippet.to_string(),
        }
    }

    #[tokio::test]
    async fn composer_only_sees_filtered_candidates() {
        let ctx = TenantContext::new("user@example.com", Role::EndUser)
            .with_user_id("u-1")
            .with_projects(["proj-1"]);

        let response = boundary()
            .compose(
                &ctx,
                "when is launch?",
                vec![
                    candidate("a", "launch is in May"),
                    candidate("b", "budget is 2M"),
                    candidate("q", "quarantined text"),
                    candidate("missing", "ghost"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(response.answer, "launch is in May [a]");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].document_id, "a");
        assert_eq!(response.withheld, 3);
    }

    #[tokio::test]
    async fn minimal_context_cannot_chat() {
        let ctx = TenantContext::minimal("nobody@example.com");
        let err = boundary()
            .compose(&ctx, "anything?", vec![candidate("a", "x")])
            .await
            .unwrap_err();

        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn nothing_accessible_yields_fallback_answer() {
        let ctx = TenantContext::new("user@example.com", Role::EndUser)
            .with_user_id("u-1")
            .with_projects(["proj-9"]);

        let response = boundary()
            .compose(&ctx, "budget?", vec![candidate("b", "budget is 2M")])
            .await
            .unwrap();

        assert_eq!(response.answer, NO_ACCESSIBLE_CONTENT);
        assert!(response.citations.is_empty());
        assert_eq!(response.withheld, 1);
    }
}
