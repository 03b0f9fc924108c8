#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use docgate::app::{router, AppState};
use docgate::authz::Role;
use docgate::config::IdentityConfig;
use docgate::db::SqliteDirectory;
use docgate::jwt::JwtConfig;
use docgate::models::user::{UserProfile, UserStatus};
use docgate::store::TenantDirectory;

pub const SUPER_ADMIN: &str = "root@docgate.example";

/// Router over a fresh, migrated SQLite file.
pub struct TestApp {
    pub pool: SqlitePool,
    pub router: Router,
    pub jwt: JwtConfig,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_identity(IdentityConfig::default()).await
    }

    pub async fn with_identity(identity: IdentityConfig) -> Result<Self> {
        let dir = tempdir()?;
        let pool = migrated_pool(&dir).await?;

        let jwt = JwtConfig::new("test-secret", 1);
        let state = AppState::new(pool.clone(), jwt.clone(), identity);

        Ok(Self {
            pool,
            router: router(state),
            jwt,
            _dir: dir,
        })
    }

    /// Inserts a profile straight into the directory, bypassing the API.
    pub async fn seed_user(&self, id: &str, email: &str, role: Role, status: UserStatus) -> Result<()> {
        let now = Utc::now();
        let profile = UserProfile {
            id: id.to_string(),
            email: email.to_string(),
            name: id.to_string(),
            role,
            status,
            client_ids: Default::default(),
            project_ids: Default::default(),
            department: None,
            title: None,
            created_at: now,
            updated_at: now,
        };
        SqliteDirectory::new(self.pool.clone()).create_user(&profile).await?;
        Ok(())
    }

    pub async fn seed_super_admin(&self) -> Result<String> {
        self.seed_user("user-root", SUPER_ADMIN, Role::SuperAdmin, UserStatus::Active)
            .await?;
        self.token(SUPER_ADMIN)
    }

    /// client-a (proj-1, proj-2) and client-b (proj-3), created by the super admin.
    pub async fn seed_workspace(&self, root: &str) -> Result<()> {
        for (id, name) in [("client-a", "Acme"), ("client-b", "Globex")] {
            self.post_ok("/clients", root, json!({"id": id, "name": name}), StatusCode::CREATED)
                .await?;
        }
        for (id, client_id) in [("proj-1", "client-a"), ("proj-2", "client-a"), ("proj-3", "client-b")] {
            self.post_ok(
                "/projects",
                root,
                json!({"id": id, "client_id": client_id, "name": id}),
                StatusCode::CREATED,
            )
            .await?;
        }
        Ok(())
    }

    /// Creates an active user through the API, scoped to the given projects.
    pub async fn create_member(&self, root: &str, id: &str, email: &str, role: &str, projects: &[&str]) -> Result<String> {
        self.post_ok(
            "/users",
            root,
            json!({"id": id, "email": email, "name": id, "role": role, "project_ids": projects}),
            StatusCode::CREATED,
        )
        .await?;
        self.token(email)
    }

    pub async fn register_document(&self, token: &str, id: &str, project_id: &str, extra: Value) -> Result<Value> {
        let mut body = json!({"id": id, "title": format!("Document {id}"), "project_id": project_id});
        if let (Some(target), Some(fields)) = (body.as_object_mut(), extra.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        self.post_ok("/documents", token, body, StatusCode::CREATED).await
    }

    /// Number of audit entries for `resource_id` with the given action and outcome.
    pub async fn audit_count(&self, action_type: &str, resource_id: &str, success: bool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM audit_log WHERE action_type = ? AND resource_id = ? AND success = ?",
        )
        .bind(action_type)
        .bind(resource_id)
        .bind(success)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub fn token(&self, email: &str) -> Result<String> {
        Ok(self.jwt.encode(email, false)?)
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp: Response = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    /// POST that must succeed with `expected`; panics with the response body otherwise.
    pub async fn post_ok(&self, uri: &str, token: &str, body: Value, expected: StatusCode) -> Result<Value> {
        let (status, value) = self.post(uri, token, body).await?;
        if status != expected {
            panic!("POST {uri} failed: {status} - {value}");
        }
        Ok(value)
    }
}

pub async fn migrated_pool(dir: &TempDir) -> Result<SqlitePool> {
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok(pool)
}

pub fn ids(values: &Value, key: &str) -> Vec<String> {
    values
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(key).and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
