use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::directory::conflict_on_duplicate;
use crate::errors::{AppError, AppResult};
use crate::models::document::{AccessState, DbDocument, DocumentRef};
use crate::store::DocumentCatalog;
use crate::utils::utc_now;

const DOCUMENT_COLUMNS: &str =
    "id, title, client_id, project_id, visibility, owner_email, access_state, created_by, created_at, updated_at";

/// Document metadata kept next to the directory in SQLite.
#[derive(Clone)]
pub struct SqliteDocumentCatalog {
    pool: SqlitePool,
}

impl SqliteDocumentCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Inserts the row and bumps the project's `document_count` on `conn`.
pub(crate) async fn insert_counted(
    conn: &mut SqliteConnection,
    document: &DocumentRef,
    created_by: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO documents (id, title, client_id, project_id, visibility, owner_email, access_state, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id)
    .bind(&document.title)
    .bind(&document.client_id)
    .bind(&document.project_id)
    .bind(document.visibility.as_str())
    .bind(&document.owner_email)
    .bind(document.access_state.as_str())
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|err| conflict_on_duplicate(err, format!("document already exists: {}", document.id)))?;

    if let Some(project_id) = document.project() {
        count_on_project(conn, project_id, 1, now).await?;
    }
    Ok(())
}

async fn count_on_project(
    conn: &mut SqliteConnection,
    project_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE projects SET document_count = MAX(document_count + ?, 0), updated_at = ? WHERE id = ?")
        .bind(delta)
        .bind(now)
        .bind(project_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[async_trait]
impl DocumentCatalog for SqliteDocumentCatalog {
    async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentRef>> {
        let row = sqlx::query_as::<_, DbDocument>(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DocumentRef::try_from).transpose()
    }

    async fn query_documents_by_project(&self, project_id: &str) -> AppResult<Vec<DocumentRef>> {
        let rows = sqlx::query_as::<_, DbDocument>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE project_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DocumentRef::try_from).collect()
    }

    async fn insert_document(&self, document: &DocumentRef, created_by: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_counted(&mut *tx, document, created_by, utc_now()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, DbDocument>(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };
        let document = DocumentRef::try_from(row)?;

        if document.access_state == AccessState::PendingAccess {
            return Err(AppError::conflict(format!(
                "document {id} has an open access request and cannot be deleted"
            )));
        }

        sqlx::query("DELETE FROM access_requests WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // guarded on state so a request opened concurrently keeps the row
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ? AND access_state = ?")
            .bind(id)
            .bind(document.access_state.as_str())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::conflict(format!("document {id} changed while being deleted")));
        }

        if let Some(project_id) = document.project() {
            count_on_project(&mut *tx, project_id, -1, utc_now()).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
