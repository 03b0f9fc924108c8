use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use docgate::authz::Role;
use docgate::models::user::UserStatus;

mod common;
use common::TestApp;

const OWNER: &str = "owner@client.example";

async fn document_count(app: &TestApp, project_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT document_count FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_one(&app.pool)
        .await?;
    Ok(count)
}

async fn severity_of(app: &TestApp, action_type: &str, actor_email: &str) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT severity FROM audit_log WHERE action_type = ? AND actor_email = ? AND success = 1 ORDER BY seq",
    )
    .bind(action_type)
    .bind(actor_email)
    .fetch_all(&app.pool)
    .await?;
    Ok(rows)
}

#[tokio::test]
async fn project_admin_deletes_documents_in_scope() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let pam = app
        .create_member(&root, "user-pam", "pam@acme.example", "project_admin", &["proj-1"])
        .await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;
    app.register_document(&pam, "doc-a", "proj-1", json!({})).await?;
    app.register_document(&root, "doc-far", "proj-3", json!({})).await?;
    assert_eq!(document_count(&app, "proj-1").await?, 1);

    // members without delete_documents are told so
    let (status, body) = app.call("DELETE", "/documents/doc-a", Some(eve.as_str()), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "permission required: delete_documents");

    // out of scope and missing look the same
    let (far_status, far_body) = app.call("DELETE", "/documents/doc-far", Some(pam.as_str()), None).await?;
    let (ghost_status, ghost_body) = app.call("DELETE", "/documents/doc-ghost", Some(pam.as_str()), None).await?;
    assert_eq!(far_status, StatusCode::NOT_FOUND);
    assert_eq!(ghost_status, far_status);
    assert_eq!(far_body, ghost_body);
    assert_eq!(document_count(&app, "proj-3").await?, 1);

    let (status, _) = app.call("DELETE", "/documents/doc-a", Some(pam.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(document_count(&app, "proj-1").await?, 0);
    let (status, _) = app.get("/documents/doc-a", &pam).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.audit_count("document.deleted", "doc-a", true).await?, 1);
    assert_eq!(app.audit_count("document.deleted", "doc-a", false).await?, 1);
    assert_eq!(app.audit_count("document.deleted", "doc-far", false).await?, 1);
    assert_eq!(severity_of(&app, "document.deleted", "pam@acme.example").await?, vec!["critical"]);

    // a second delete finds nothing
    let (status, _) = app.call("DELETE", "/documents/doc-a", Some(pam.as_str()), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(document_count(&app, "proj-1").await?, 0);

    Ok(())
}

#[tokio::test]
async fn documents_waiting_on_their_owner_cannot_be_deleted() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let pam = app
        .create_member(&root, "user-pam", "pam@acme.example", "project_admin", &["proj-1"])
        .await?;
    app.seed_user("user-owner", OWNER, Role::EndUser, UserStatus::Active).await?;
    let owner = app.token(OWNER)?;

    let document = app
        .register_document(
            &pam,
            "doc-gated",
            "proj-1",
            json!({"owner_email": OWNER, "requires_owner_approval": true}),
        )
        .await?;
    assert_eq!(document["access_state"], "pending_access");

    let (status, _) = app.call("DELETE", "/documents/doc-gated", Some(pam.as_str()), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(document_count(&app, "proj-1").await?, 1);

    let request_id = sqlx::query_scalar::<_, String>("SELECT id FROM access_requests WHERE document_id = 'doc-gated'")
        .fetch_one(&app.pool)
        .await?;
    app.post_ok(
        &format!("/access-requests/{request_id}/approve"),
        &owner,
        json!({}),
        StatusCode::OK,
    )
    .await?;

    let (status, _) = app.call("DELETE", "/documents/doc-gated", Some(pam.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(document_count(&app, "proj-1").await?, 0);
    let leftovers = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_requests WHERE document_id = 'doc-gated'")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(leftovers, 0);

    Ok(())
}

#[tokio::test]
async fn successful_reads_are_logged_as_noise() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let pam = app
        .create_member(&root, "user-pam", "pam@acme.example", "project_admin", &["proj-1"])
        .await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;
    app.register_document(&pam, "doc-a", "proj-1", json!({})).await?;

    let (status, _) = app.get("/documents/doc-a", &eve).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.audit_count("document.viewed", "doc-a", true).await?, 1);
    assert_eq!(severity_of(&app, "document.viewed", "eve@acme.example").await?, vec!["noise"]);

    let (status, body) = app
        .post(
            "/answers",
            &eve,
            json!({
                "question": "When is the launch?",
                "candidates": [
                    {"document_id": "doc-a", "snippet": "Launch is planned for March."},
                    {"document_id": "doc-ghost", "snippet": "nothing"}
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(severity_of(&app, "answer.composed", "eve@acme.example").await?, vec!["noise"]);

    let description = sqlx::query_scalar::<_, String>(
        "SELECT description FROM audit_log WHERE action_type = 'answer.composed' AND actor_email = ?",
    )
    .bind("eve@acme.example")
    .fetch_one(&app.pool)
    .await?;
    assert!(description.contains("1 withheld"), "{description}");
    assert!(description.contains("doc-a"), "{description}");

    // rejected compositions stay visible as failures
    let stranger = app.token("stranger@elsewhere.example")?;
    let (status, _) = app
        .post(
            "/answers",
            &stranger,
            json!({"question": "Anything?", "candidates": [{"document_id": "doc-a", "snippet": "x"}]}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let failed = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM audit_log WHERE action_type = 'answer.composed' AND success = 0",
    )
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(failed, 1);

    Ok(())
}
