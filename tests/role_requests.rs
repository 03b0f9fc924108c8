use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{ids, TestApp};

struct Directory {
    app: TestApp,
    root: String,
    acct: String,
    bob: String,
    eve: String,
    pat: String,
}

/// client-a with an account admin (acct), two end users on proj-1 (bob, eve)
/// and a project admin of proj-3 in client-b (pat).
async fn directory() -> Result<Directory> {
    let app = TestApp::new().await?;
    let root = app.seed_super_admin().await?;
    app.seed_workspace(&root).await?;
    app.post_ok(
        "/users",
        &root,
        json!({
            "id": "user-acct",
            "email": "acct@acme.example",
            "name": "Alex",
            "role": "account_admin",
            "client_ids": ["client-a"]
        }),
        StatusCode::CREATED,
    )
    .await?;
    let acct = app.token("acct@acme.example")?;
    let bob = app
        .create_member(&root, "user-bob", "bob@acme.example", "end_user", &["proj-1"])
        .await?;
    let eve = app
        .create_member(&root, "user-eve", "eve@acme.example", "end_user", &["proj-1"])
        .await?;
    let pat = app
        .create_member(&root, "user-pat", "pat@acme.example", "project_admin", &["proj-3"])
        .await?;

    Ok(Directory { app, root, acct, bob, eve, pat })
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn approved_request_becomes_an_assignment() -> Result<()> {
    let d = directory().await?;

    let request = d
        .app
        .post_ok(
            "/role-requests",
            &d.bob,
            json!({"project_id": "proj-2", "requested_role": "project_admin", "reason": "taking over launch"}),
            StatusCode::CREATED,
        )
        .await?;
    assert_eq!(request["status"], "pending");
    assert_eq!(request["user_id"], "user-bob");
    assert_eq!(request["requester_email"], "bob@acme.example");
    let id = id_of(&request);

    // one open request per scope
    let (status, _) = d
        .app
        .post("/role-requests", &d.bob, json!({"project_id": "proj-2", "requested_role": "end_user"}))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // requesters never decide for themselves
    let (status, _) = d
        .app
        .call("POST", &format!("/role-requests/{id}/approve"), Some(d.bob.as_str()), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // peers and admins of other clients do not see it
    let (status, _) = d.app.get(&format!("/role-requests/{id}"), &d.eve).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listing) = d.app.get("/role-requests", &d.eve).await?;
    assert_eq!(listing, json!([]));
    let (status, _) = d
        .app
        .call("POST", &format!("/role-requests/{id}/approve"), Some(d.pat.as_str()), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listing) = d.app.get("/role-requests", &d.pat).await?;
    assert_eq!(listing, json!([]));

    let (status, listing) = d.app.get("/role-requests?status=pending", &d.acct).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&listing, "id"), vec![id.clone()]);

    let approved = d
        .app
        .post_ok(
            &format!("/role-requests/{id}/approve"),
            &d.acct,
            json!({"notes": "welcome aboard"}),
            StatusCode::OK,
        )
        .await?;
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["reviewed_by"], "acct@acme.example");
    assert_eq!(approved["review_notes"], "welcome aboard");

    let (_, ctx) = d.app.get("/me/context", &d.bob).await?;
    assert_eq!(ctx["project_roles"]["proj-2"], "project_admin");
    assert_eq!(ctx["project_ids"], json!(["proj-1", "proj-2"]));
    assert_eq!(d.app.audit_count("project_assignment.assigned", "upa-user-bob-proj-2", true).await?, 1);
    assert_eq!(d.app.audit_count("role_request.approved", &id, true).await?, 1);

    // decided requests stay decided
    let (status, _) = d
        .app
        .call("POST", &format!("/role-requests/{id}/deny"), Some(d.root.as_str()), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // the requester can still read the outcome
    let (status, mine) = d.app.get(&format!("/role-requests/{id}"), &d.bob).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["status"], "approved");

    Ok(())
}

#[tokio::test]
async fn denied_request_grants_nothing() -> Result<()> {
    let d = directory().await?;

    let request = d
        .app
        .post_ok(
            "/role-requests",
            &d.bob,
            json!({"client_id": "client-a", "requested_role": "account_admin"}),
            StatusCode::CREATED,
        )
        .await?;
    let id = id_of(&request);

    let (status, _) = d
        .app
        .call("POST", &format!("/role-requests/{id}/deny"), Some(d.eve.as_str()), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let denied = d
        .app
        .post_ok(&format!("/role-requests/{id}/deny"), &d.acct, json!({}), StatusCode::OK)
        .await?;
    assert_eq!(denied["status"], "denied");

    let (_, ctx) = d.app.get("/me/context", &d.bob).await?;
    assert!(ctx["client_roles"].get("client-a").is_none(), "{ctx}");
    assert_eq!(ctx["role"], "end_user");

    let severity = sqlx::query_scalar::<_, String>(
        "SELECT severity FROM audit_log WHERE action_type = 'role_request.denied' AND resource_id = ? AND success = 1",
    )
    .bind(&id)
    .fetch_one(&d.app.pool)
    .await?;
    assert_eq!(severity, "critical");

    // a fresh request for the same scope may be opened again
    let (status, _) = d
        .app
        .post("/role-requests", &d.bob, json!({"client_id": "client-a", "requested_role": "end_user"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn malformed_role_requests_are_rejected() -> Result<()> {
    let d = directory().await?;

    for body in [
        json!({"client_id": "client-a", "requested_role": "super_admin"}),
        json!({"client_id": "client-a", "project_id": "proj-1", "requested_role": "end_user"}),
        json!({"requested_role": "end_user"}),
        json!({"project_id": "  ", "requested_role": "end_user"}),
    ] {
        let (status, response) = d.app.post("/role-requests", &d.bob, body.clone()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {response}");
    }

    // identities without a profile cannot ask
    let stranger = d.app.token("stranger@elsewhere.example")?;
    let (status, _) = d
        .app
        .post("/role-requests", &stranger, json!({"project_id": "proj-1", "requested_role": "end_user"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM role_requests")
        .fetch_one(&d.app.pool)
        .await?;
    assert_eq!(rows, 0);

    Ok(())
}
