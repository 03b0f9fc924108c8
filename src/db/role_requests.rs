use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::access_requests::push_in;
use super::directory::conflict_on_duplicate;
use crate::errors::{AppError, AppResult};
use crate::models::access_request::{AccessRequestStatus, Decision, RequestScope};
use crate::models::role_request::{DbRoleRequest, RoleRequest};
use crate::store::RoleRequestStore;

const SELECT_ROLE_REQUEST: &str = "SELECT r.id AS id, r.user_id AS user_id, r.requester_email AS requester_email, \
     r.client_id AS client_id, r.project_id AS project_id, r.requested_role AS requested_role, \
     r.status AS status, r.reason AS reason, r.requested_at AS requested_at, r.reviewed_at AS reviewed_at, \
     r.reviewed_by AS reviewed_by, r.review_notes AS review_notes, p.client_id AS project_client_id \
     FROM role_requests r LEFT JOIN projects p ON p.id = r.project_id";

#[derive(Clone)]
pub struct SqliteRoleRequestStore {
    pool: SqlitePool,
}

impl SqliteRoleRequestStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRequestStore for SqliteRoleRequestStore {
    async fn create_role_request(&self, request: &RoleRequest) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO role_requests (id, user_id, requester_email, client_id, project_id, requested_role, status, reason, requested_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(&request.requester_email)
        .bind(&request.client_id)
        .bind(&request.project_id)
        .bind(request.requested_role.as_str())
        .bind(request.status.as_str())
        .bind(&request.reason)
        .bind(request.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_duplicate(err, "a pending role request for this scope already exists"))?;

        Ok(())
    }

    async fn get_role_request(&self, id: &str) -> AppResult<Option<RoleRequest>> {
        let row = sqlx::query_as::<_, DbRoleRequest>(&format!("{SELECT_ROLE_REQUEST} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RoleRequest::try_from).transpose()
    }

    async fn list_role_requests(
        &self,
        status: Option<AccessRequestStatus>,
        involving: Option<&RequestScope>,
        limit: i64,
    ) -> AppResult<Vec<RoleRequest>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("{SELECT_ROLE_REQUEST} WHERE 1 = 1"));
        if let Some(status) = status {
            builder.push(" AND r.status = ").push_bind(status.as_str());
        }
        if let Some(scope) = involving {
            builder
                .push(" AND (r.requester_email = ")
                .push_bind(scope.email.clone());
            push_in(&mut builder, "r.client_id", &scope.client_ids);
            push_in(&mut builder, "p.client_id", &scope.client_ids);
            push_in(&mut builder, "r.project_id", &scope.project_ids);
            builder.push(")");
        }
        builder
            .push(" ORDER BY r.requested_at DESC, r.id ASC LIMIT ")
            .push_bind(limit);

        let rows = builder
            .build_query_as::<DbRoleRequest>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RoleRequest::try_from).collect()
    }

    async fn complete_role_request(
        &self,
        id: &str,
        decision: Decision,
        reviewed_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<RoleRequest> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE role_requests SET status = ?, reviewed_at = ?, reviewed_by = ?, review_notes = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(decision.status().as_str())
        .bind(at)
        .bind(reviewed_by)
        .bind(notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, DbRoleRequest>(&format!("{SELECT_ROLE_REQUEST} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("role request not found"))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::conflict(format!("role request {id} is not pending")));
        }

        tx.commit().await?;
        row.try_into()
    }
}
