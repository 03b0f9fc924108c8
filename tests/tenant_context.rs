use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use docgate::authz::{Permission, Role, TenantContextResolver};
use docgate::config::IdentityConfig;
use docgate::db::SqliteDirectory;
use docgate::models::user::UserStatus;

mod common;
use common::TestApp;

fn resolver(app: &TestApp) -> TenantContextResolver {
    TenantContextResolver::new(Arc::new(SqliteDirectory::new(app.pool.clone())))
}

#[tokio::test]
async fn unknown_email_resolves_to_identical_minimal_contexts() -> Result<()> {
    let app = TestApp::new().await?;
    let resolver = resolver(&app);

    let first = resolver.resolve("stranger@elsewhere.example").await;
    let second = resolver.resolve("stranger@elsewhere.example").await;

    assert_eq!(first, second);
    assert_eq!(first.role(), Role::EndUser);
    assert!(first.permissions().is_empty());
    assert!(first.client_ids().is_empty());
    assert!(first.project_ids().is_empty());
    assert!(!first.is_unrestricted());
    assert!(!first.is_known());

    Ok(())
}

#[tokio::test]
async fn inactive_profile_resolves_to_minimal_context() -> Result<()> {
    let app = TestApp::new().await?;
    app.seed_user("user-gone", "gone@acme.example", Role::AccountAdmin, UserStatus::Suspended)
        .await?;

    let ctx = resolver(&app).resolve("gone@acme.example").await;

    assert!(!ctx.is_known());
    assert!(ctx.permissions().is_empty());
    assert!(!ctx.has_permission(Permission::ManageUsers));

    Ok(())
}

#[tokio::test]
async fn context_carries_assignments_and_scope_roles() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;

    app.post_ok("/clients", &root, json!({"id": "client-a", "name": "Acme"}), StatusCode::CREATED)
        .await?;
    app.post_ok(
        "/projects",
        &root,
        json!({"id": "proj-1", "client_id": "client-a", "name": "Launch"}),
        StatusCode::CREATED,
    )
    .await?;
    app.post_ok(
        "/users",
        &root,
        json!({
            "id": "user-pm",
            "email": "PM@Acme.example",
            "name": "Pat",
            "role": "end_user",
            "project_ids": ["proj-1"]
        }),
        StatusCode::CREATED,
    )
    .await?;
    app.post_ok(
        "/users/user-pm/projects",
        &root,
        json!({"project_id": "proj-1", "role": "project_admin"}),
        StatusCode::CREATED,
    )
    .await?;

    // lookups are case-insensitive
    let ctx = resolver(&app).resolve("pm@ACME.example").await;
    assert!(ctx.is_known());
    assert_eq!(ctx.role(), Role::EndUser);
    assert!(ctx.can_access_project("proj-1"));
    assert!(!ctx.can_access_client("client-a"));
    assert_eq!(ctx.effective_role(Some("client-a"), Some("proj-1")), Role::ProjectAdmin);
    assert!(ctx.has_permission_in(Permission::ManageDocuments, Some("client-a"), Some("proj-1")));
    assert!(!ctx.has_permission(Permission::ManageDocuments));

    let token = app.token("pm@acme.example")?;
    let (status, body) = app.get("/me/context", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "end_user");
    assert_eq!(body["project_ids"], json!(["proj-1"]));
    assert_eq!(body["is_unrestricted"], Value::Bool(false));

    Ok(())
}

#[tokio::test]
async fn super_admin_context_is_unrestricted() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;

    let (status, body) = app.get("/me/context", &root).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "super_admin");
    assert_eq!(body["is_unrestricted"], Value::Bool(true));
    assert_eq!(body["client_ids"], json!([]));

    Ok(())
}

#[tokio::test]
async fn domain_membership_is_enforced_when_required() -> Result<()> {
    let app = TestApp::with_identity(IdentityConfig {
        allowed_domain: Some("docgate.example".to_string()),
        require_domain_member: true,
    })
    .await?;
    app.seed_super_admin().await?;

    let outsider = app.jwt.encode(common::SUPER_ADMIN, false)?;
    let (status, body) = app.get("/me/context", &outsider).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let member = app.jwt.encode(common::SUPER_ADMIN, true)?;
    let (status, body) = app.get("/me/context", &member).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_domain_member"], Value::Bool(true));

    Ok(())
}
