use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::tenant::{Client, ClientStatus, DbClient, DbProject, Project, ProjectStatus};
use crate::models::user::{DbAssignment, DbUser, UserClientAssignment, UserProfile, UserProjectAssignment};
use crate::store::TenantDirectory;
use crate::utils::utc_now;

const CLIENT_COLUMNS: &str = "id, name, domain, status, created_by, contact_email, contact_name, industry, notes, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, client_id, name, code, status, description, document_index, document_count, created_by, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, role, status, department, title, created_at, updated_at";

/// Maps unique-constraint violations to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_on_duplicate(err: sqlx::Error, message: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::conflict(message),
        _ => AppError::Database(err),
    }
}

/// SQLite-backed tenant directory.
#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_profile(&self, row: DbUser) -> AppResult<UserProfile> {
        let client_ids: Vec<String> =
            sqlx::query_scalar("SELECT client_id FROM user_client_assignments WHERE user_id = ?")
                .bind(&row.id)
                .fetch_all(&self.pool)
                .await?;
        let project_ids: Vec<String> =
            sqlx::query_scalar("SELECT project_id FROM user_project_assignments WHERE user_id = ?")
                .bind(&row.id)
                .fetch_all(&self.pool)
                .await?;

        row.into_profile(
            client_ids.into_iter().collect::<BTreeSet<_>>(),
            project_ids.into_iter().collect::<BTreeSet<_>>(),
        )
    }
}

#[async_trait]
impl TenantDirectory for SqliteDirectory {
    async fn create_client(&self, client: &Client) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO clients (id, name, domain, status, created_by, contact_email, contact_name, industry, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.domain)
        .bind(client.status.as_str())
        .bind(&client.created_by)
        .bind(&client.contact_email)
        .bind(&client.contact_name)
        .bind(&client.industry)
        .bind(&client.notes)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_duplicate(err, format!("client already exists: {}", client.id)))?;

        Ok(())
    }

    async fn get_client(&self, id: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<_, DbClient>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Client::try_from).transpose()
    }

    async fn list_clients(&self, status: Option<ClientStatus>) -> AppResult<Vec<Client>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE 1 = 1"));
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY name ASC");

        let rows = builder.build_query_as::<DbClient>().fetch_all(&self.pool).await?;

        rows.into_iter().map(Client::try_from).collect()
    }

    async fn update_client_status(&self, id: &str, status: ClientStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE clients SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(utc_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_project(&self, project: &Project) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO projects (id, client_id, name, code, status, description, document_index, document_count, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.client_id)
        .bind(&project.name)
        .bind(&project.code)
        .bind(project.status.as_str())
        .bind(&project.description)
        .bind(&project.document_index)
        .bind(project.document_count)
        .bind(&project.created_by)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_duplicate(err, format!("project already exists: {}", project.id)))?;

        Ok(())
    }

    async fn get_project(&self, id: &str) -> AppResult<Option<Project>> {
        let row = sqlx::query_as::<_, DbProject>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    async fn list_projects(
        &self,
        client_id: Option<&str>,
        status: Option<ProjectStatus>,
    ) -> AppResult<Vec<Project>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE 1 = 1"));
        if let Some(client_id) = client_id {
            builder.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY name ASC");

        let rows = builder.build_query_as::<DbProject>().fetch_all(&self.pool).await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    async fn update_project_status(&self, id: &str, status: ProjectStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(utc_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_user(&self, user: &UserProfile) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, name, role, status, department, title, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.department)
        .bind(&user.title)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_duplicate(err, format!("user already exists: {}", user.email)))?;

        Ok(())
    }

    async fn get_user(&self, id: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_profile(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_profile(row).await?)),
            None => Ok(None),
        }
    }

    async fn upsert_client_assignment(&self, assignment: &UserClientAssignment) -> AppResult<()> {
        let permissions = serde_json::to_string(&assignment.permissions)
            .map_err(|err| AppError::internal(format!("failed to encode permissions: {err}")))?;

        sqlx::query(
            "INSERT INTO user_client_assignments (id, user_id, client_id, role, permissions, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, client_id) DO UPDATE SET role = excluded.role, permissions = excluded.permissions, \
             created_by = excluded.created_by, created_at = excluded.created_at",
        )
        .bind(&assignment.id)
        .bind(&assignment.user_id)
        .bind(&assignment.client_id)
        .bind(assignment.role.as_str())
        .bind(&permissions)
        .bind(&assignment.created_by)
        .bind(assignment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_project_assignment(&self, assignment: &UserProjectAssignment) -> AppResult<()> {
        let permissions = serde_json::to_string(&assignment.permissions)
            .map_err(|err| AppError::internal(format!("failed to encode permissions: {err}")))?;

        sqlx::query(
            "INSERT INTO user_project_assignments (id, user_id, project_id, role, permissions, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, project_id) DO UPDATE SET role = excluded.role, permissions = excluded.permissions, \
             created_by = excluded.created_by, created_at = excluded.created_at",
        )
        .bind(&assignment.id)
        .bind(&assignment.user_id)
        .bind(&assignment.project_id)
        .bind(assignment.role.as_str())
        .bind(&permissions)
        .bind(&assignment.created_by)
        .bind(assignment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_client_assignment(&self, user_id: &str, client_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM user_client_assignments WHERE user_id = ? AND client_id = ?")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_project_assignment(&self, user_id: &str, project_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM user_project_assignments WHERE user_id = ? AND project_id = ?")
            .bind(user_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn client_assignments(&self, user_id: &str) -> AppResult<Vec<UserClientAssignment>> {
        let rows = sqlx::query_as::<_, DbAssignment>(
            "SELECT id, user_id, client_id AS scope_id, role, permissions, created_by, created_at \
             FROM user_client_assignments WHERE user_id = ? ORDER BY client_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserClientAssignment::try_from).collect()
    }

    async fn project_assignments(&self, user_id: &str) -> AppResult<Vec<UserProjectAssignment>> {
        let rows = sqlx::query_as::<_, DbAssignment>(
            "SELECT id, user_id, project_id AS scope_id, role, permissions, created_by, created_at \
             FROM user_project_assignments WHERE user_id = ? ORDER BY project_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProjectAssignment::try_from).collect()
    }
}
