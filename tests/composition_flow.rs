use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{ids, TestApp};

#[tokio::test]
async fn answers_only_cite_documents_in_scope() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;

    app.register_document(&root, "doc-a", "proj-1", json!({})).await?;
    app.register_document(&root, "doc-b", "proj-2", json!({})).await?;

    let (status, body) = app
        .post(
            "/answers",
            &eve,
            json!({
                "question": "When is the launch?",
                "candidates": [
                    {"document_id": "doc-a", "snippet": "Launch is planned for March."},
                    {"document_id": "doc-b", "snippet": "Budget for proj-2 is confidential."}
                ]
            }),
        )
        .await?;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body["citations"], "document_id"), vec!["doc-a"]);
    assert_eq!(body["withheld"], 1);
    let answer = body["answer"].as_str().unwrap_or_default();
    assert!(answer.contains("Launch is planned for March. [doc-a]"));
    assert!(!answer.contains("confidential"));
    assert!(!answer.contains("doc-b"));

    Ok(())
}

#[tokio::test]
async fn out_of_scope_fetch_is_indistinguishable_from_missing() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;
    app.register_document(&root, "doc-b", "proj-2", json!({})).await?;

    let (hidden_status, hidden_body) = app.get("/documents/doc-b", &eve).await?;
    let (missing_status, missing_body) = app.get("/documents/doc-nope", &eve).await?;

    assert_eq!(hidden_status, StatusCode::NOT_FOUND);
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(hidden_body, missing_body);

    assert_eq!(app.audit_count("document.viewed", "doc-b", false).await?, 1);

    let (status, body) = app.get("/documents/doc-b", &root).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_id"], "proj-2");

    Ok(())
}

#[tokio::test]
async fn gated_documents_are_hidden_from_everyone() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;

    app.register_document(&root, "doc-open", "proj-1", json!({})).await?;
    let gated = app
        .register_document(
            &root,
            "doc-gated",
            "proj-1",
            json!({"owner_email": "owner@client.example", "requires_owner_approval": true}),
        )
        .await?;
    assert_eq!(gated["access_state"], "pending_access");

    let (status, listing) = app.get("/projects/proj-1/documents", &eve).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&listing, "id"), vec!["doc-open"]);

    // the owner gate binds super admins too
    let (status, _) = app.get("/documents/doc-gated", &root).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            "/answers",
            &root,
            json!({
                "question": "What does the gated document say?",
                "candidates": [{"document_id": "doc-gated", "snippet": "secret terms"}]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["withheld"], 1);
    assert_eq!(body["citations"], json!([]));
    assert!(!body["answer"].as_str().unwrap_or_default().contains("secret terms"));

    Ok(())
}

#[tokio::test]
async fn unknown_candidates_are_withheld_and_identities_without_profile_get_nothing() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    app.register_document(&root, "doc-a", "proj-1", json!({})).await?;

    let (status, body) = app
        .post(
            "/answers",
            &root,
            json!({
                "question": "Anything?",
                "candidates": [
                    {"document_id": "doc-a", "snippet": "first"},
                    {"document_id": "doc-ghost", "snippet": "ghost"}
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["withheld"], 1);
    assert_eq!(ids(&body["citations"], "document_id"), vec!["doc-a"]);

    // minimal context holds no chat permission
    let stranger = app.token("stranger@elsewhere.example")?;
    let (status, _) = app
        .post(
            "/answers",
            &stranger,
            json!({"question": "Anything?", "candidates": [{"document_id": "doc-a", "snippet": "first"}]}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn project_listing_outside_scope_is_forbidden_and_audited() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;

    let (status, _) = app.get("/projects/proj-3/documents", &eve).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.audit_count("project.documents_listed", "proj-3", false).await?, 1);

    let (status, project) = app.get("/projects/proj-1", &root).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["document_count"], 0);

    app.register_document(&root, "doc-a", "proj-1", json!({})).await?;
    let (_, project) = app.get("/projects/proj-1", &root).await?;
    assert_eq!(project["document_count"], 1);

    Ok(())
}
