use std::sync::OnceLock;

use axum::Json;
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::{audit, authz, models, routes, services};

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::context::me,
        routes::clients::list_clients,
        routes::clients::create_client,
        routes::clients::get_client,
        routes::clients::update_client_status,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project_status,
        routes::documents::list_project_documents,
        routes::documents::register_document,
        routes::documents::get_document,
        routes::documents::delete_document,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::assign_client,
        routes::users::revoke_client,
        routes::users::assign_project,
        routes::users::revoke_project,
        routes::access_requests::request_access,
        routes::access_requests::request_bulk_access,
        routes::access_requests::list_requests,
        routes::access_requests::get_request,
        routes::access_requests::approve_request,
        routes::access_requests::deny_request,
        routes::access_requests::get_bulk,
        routes::role_requests::create_role_request,
        routes::role_requests::list_role_requests,
        routes::role_requests::get_role_request,
        routes::role_requests::approve_role_request,
        routes::role_requests::deny_role_request,
        routes::answers::compose_answer,
        routes::audit::list_entries,
        routes::audit::verify_chain
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            authz::Role,
            authz::Permission,
            authz::TenantContext,
            models::tenant::Client,
            models::tenant::ClientStatus,
            models::tenant::ClientCreateRequest,
            models::tenant::ClientStatusUpdateRequest,
            models::tenant::Project,
            models::tenant::ProjectStatus,
            models::tenant::ProjectCreateRequest,
            models::tenant::ProjectStatusUpdateRequest,
            models::user::UserStatus,
            models::user::UserProfile,
            models::user::UserCreateRequest,
            models::user::UserClientAssignment,
            models::user::UserProjectAssignment,
            models::user::AssignClientRequest,
            models::user::AssignProjectRequest,
            models::document::Visibility,
            models::document::AccessState,
            models::document::DocumentRef,
            models::document::DocumentRegisterRequest,
            models::access_request::AccessRequestStatus,
            models::access_request::AccessRequest,
            models::access_request::BulkAccessRequest,
            models::access_request::AccessRequestCreateRequest,
            models::access_request::BulkAccessRequestCreateRequest,
            models::access_request::BulkAccessRequestResponse,
            models::access_request::ReviewRequest,
            models::role_request::RoleRequest,
            models::role_request::RoleRequestCreateRequest,
            models::audit::AuditLogEntry,
            audit::ChainReport,
            services::answers::AnswerCandidate,
            services::answers::AnswerRequest,
            services::answers::AnswerResponse,
            services::answers::Citation
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Context", description = "Resolved tenant context"),
        (name = "Clients", description = "Client administration"),
        (name = "Projects", description = "Project administration"),
        (name = "Users", description = "Users and scope assignments"),
        (name = "Documents", description = "Document registry and filtered reads"),
        (name = "Access Requests", description = "Owner approval workflow"),
        (name = "Role Requests", description = "Users asking for roles on clients and projects"),
        (name = "Answers", description = "Answer composition over access-checked documents"),
        (name = "Audit", description = "Audit log review")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI document as JSON with a local `servers` entry.
pub fn build_openapi(port: u16) -> anyhow::Result<Value> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;
    ensure_servers(&mut doc, port);
    Ok(doc)
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{port}");

    match doc.get_mut("servers") {
        Some(Value::Array(arr)) => {
            let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !has {
                arr.push(json!({ "url": server_url }));
            }
        }
        _ => {
            doc["servers"] = json!([{ "url": server_url }]);
        }
    }
}

static OPENAPI_JSON: OnceLock<Value> = OnceLock::new();

pub async fn openapi_json() -> Json<Value> {
    let doc = OPENAPI_JSON.get_or_init(|| {
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8000);
        build_openapi(port).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to build OpenAPI document");
            Value::Null
        })
    });
    Json(doc.clone())
}
