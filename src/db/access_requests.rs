use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::documents::insert_counted;
use crate::errors::{AppError, AppResult};
use crate::models::access_request::{
    AccessRequest, AccessRequestQuery, BulkAccessRequest, DbAccessRequest, Decision,
};
use crate::models::document::{AccessState, DocumentRef};
use crate::store::AccessRequestStore;

const REQUEST_COLUMNS: &str = "id, requester_email, owner_email, document_id, status, bulk_request_id, reason, requested_at, reviewed_at, reviewed_by, review_notes";
const BULK_COLUMNS: &str = "id, owner_email, requested_by, total_documents, pending_count, approved_count, denied_count, created_at, updated_at";

/// Access request workflow persistence. Each method runs in one transaction.
#[derive(Clone)]
pub struct SqliteAccessRequestStore {
    pool: SqlitePool,
}

impl SqliteAccessRequestStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessRequestStore for SqliteAccessRequestStore {
    async fn open_requests(
        &self,
        bulk: Option<&BulkAccessRequest>,
        requests: &[AccessRequest],
        from: AccessState,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(bulk) = bulk {
            sqlx::query(&format!(
                "INSERT INTO bulk_access_requests ({BULK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(&bulk.id)
            .bind(&bulk.owner_email)
            .bind(&bulk.requested_by)
            .bind(bulk.total_documents)
            .bind(bulk.pending_count)
            .bind(bulk.approved_count)
            .bind(bulk.denied_count)
            .bind(bulk.created_at)
            .bind(bulk.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for request in requests {
            let moved = sqlx::query(
                "UPDATE documents SET access_state = ?, owner_email = COALESCE(owner_email, ?), updated_at = ? \
                 WHERE id = ? AND access_state = ? AND (owner_email IS NULL OR owner_email = ?)",
            )
            .bind(AccessState::PendingAccess.as_str())
            .bind(&request.owner_email)
            .bind(request.requested_at)
            .bind(&request.document_id)
            .bind(from.as_str())
            .bind(&request.owner_email)
            .execute(&mut *tx)
            .await?;

            if moved.rows_affected() == 0 {
                // dropping the transaction rolls back everything written so far
                return Err(AppError::conflict(format!(
                    "document {} is no longer {from} or has another owner",
                    request.document_id
                )));
            }

            insert_request(&mut *tx, request).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn register_gated(&self, document: &DocumentRef, created_by: &str, request: &AccessRequest) -> AppResult<()> {
        if document.access_state != AccessState::PendingAccess || request.document_id != document.id {
            return Err(AppError::internal("gated registration needs a pending document and its request"));
        }

        let mut tx = self.pool.begin().await?;
        insert_counted(&mut *tx, document, created_by, request.requested_at).await?;
        insert_request(&mut *tx, request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_request(&self, id: &str) -> AppResult<Option<AccessRequest>> {
        let row = sqlx::query_as::<_, DbAccessRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccessRequest::try_from).transpose()
    }

    async fn list_requests(&self, query: &AccessRequestQuery) -> AppResult<Vec<AccessRequest>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.id AS id, r.requester_email AS requester_email, r.owner_email AS owner_email, \
             r.document_id AS document_id, r.status AS status, r.bulk_request_id AS bulk_request_id, \
             r.reason AS reason, r.requested_at AS requested_at, r.reviewed_at AS reviewed_at, \
             r.reviewed_by AS reviewed_by, r.review_notes AS review_notes \
             FROM access_requests r LEFT JOIN documents d ON d.id = r.document_id WHERE 1 = 1",
        );
        if let Some(status) = query.status {
            builder.push(" AND r.status = ").push_bind(status.as_str());
        }
        if let Some(scope) = query.involving.as_ref() {
            builder
                .push(" AND (r.requester_email = ")
                .push_bind(scope.email.clone())
                .push(" OR r.owner_email = ")
                .push_bind(scope.email.clone());
            push_in(&mut builder, "d.project_id", &scope.project_ids);
            push_in(&mut builder, "d.client_id", &scope.client_ids);
            builder.push(")");
        }
        builder
            .push(" ORDER BY r.requested_at DESC, r.id ASC LIMIT ")
            .push_bind(query.limit);

        let rows = builder
            .build_query_as::<DbAccessRequest>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AccessRequest::try_from).collect()
    }

    async fn complete_request(
        &self,
        id: &str,
        decision: Decision,
        reviewed_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<AccessRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DbAccessRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("access request not found"))?;

        let updated = sqlx::query(
            "UPDATE access_requests SET status = ?, reviewed_at = ?, reviewed_by = ?, review_notes = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(decision.status().as_str())
        .bind(at)
        .bind(reviewed_by)
        .bind(notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::conflict(format!("access request {id} is not pending")));
        }

        let moved = sqlx::query(
            "UPDATE documents SET access_state = ?, updated_at = ? WHERE id = ? AND access_state = ?",
        )
        .bind(decision.access_state().as_str())
        .bind(at)
        .bind(&row.document_id)
        .bind(AccessState::PendingAccess.as_str())
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Err(AppError::conflict(format!(
                "document {} is not pending access",
                row.document_id
            )));
        }

        if let Some(bulk_id) = row.bulk_request_id.as_deref() {
            let counter_update = match decision {
                Decision::Approve => {
                    "UPDATE bulk_access_requests SET pending_count = pending_count - 1, \
                     approved_count = approved_count + 1, updated_at = ? WHERE id = ? AND pending_count > 0"
                }
                Decision::Deny => {
                    "UPDATE bulk_access_requests SET pending_count = pending_count - 1, \
                     denied_count = denied_count + 1, updated_at = ? WHERE id = ? AND pending_count > 0"
                }
            };

            let counted = sqlx::query(counter_update)
                .bind(at)
                .bind(bulk_id)
                .execute(&mut *tx)
                .await?;

            if counted.rows_affected() == 0 {
                return Err(AppError::conflict(format!("bulk request {bulk_id} has no pending documents")));
            }
        }

        let completed = sqlx::query_as::<_, DbAccessRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        completed.try_into()
    }

    async fn get_bulk(&self, id: &str) -> AppResult<Option<BulkAccessRequest>> {
        let bulk = sqlx::query_as::<_, BulkAccessRequest>(&format!(
            "SELECT {BULK_COLUMNS} FROM bulk_access_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bulk)
    }
}

async fn insert_request(conn: &mut SqliteConnection, request: &AccessRequest) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO access_requests ({REQUEST_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&request.id)
    .bind(&request.requester_email)
    .bind(&request.owner_email)
    .bind(&request.document_id)
    .bind(request.status.as_str())
    .bind(&request.bulk_request_id)
    .bind(&request.reason)
    .bind(request.requested_at)
    .bind(request.reviewed_at)
    .bind(&request.reviewed_by)
    .bind(&request.review_notes)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Appends `OR column IN (...)`; an empty list adds nothing.
pub(crate) fn push_in(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    builder.push(format!(" OR {column} IN ("));
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}
